//! Constructors for transaction guards and branch actions.
//!
//! `Compare` and `RequestOp` are awkward to spell out by hand (nested oneofs,
//! enum fields stored as `i32`); these helpers cover the conditional-create /
//! conditional-update idiom without callers touching the raw encoding.

use crate::proto::etcdserverpb::compare::CompareResult;
use crate::proto::etcdserverpb::compare::CompareTarget;
use crate::proto::etcdserverpb::compare::TargetUnion;
use crate::proto::etcdserverpb::request_op::Request;
use crate::proto::etcdserverpb::Compare;
use crate::proto::etcdserverpb::DeleteRangeRequest;
use crate::proto::etcdserverpb::PutRequest;
use crate::proto::etcdserverpb::RangeRequest;
use crate::proto::etcdserverpb::RequestOp;

impl Compare {
    /// Guard that passes only if `key` currently exists.
    ///
    /// Every live key has a create revision greater than zero, so this
    /// compares CREATE > 0.
    pub fn key_exists(key: Vec<u8>) -> Self {
        Self {
            result: CompareResult::Greater.into(),
            target: CompareTarget::Create.into(),
            key,
            range_end: Vec::new(),
            target_union: Some(TargetUnion::CreateRevision(0)),
        }
    }

    /// Guard that passes only if `key` has never been created.
    ///
    /// The first creation revision the store assigns is 1, so CREATE < 1
    /// holds exactly for absent keys.
    pub fn key_not_exists(key: Vec<u8>) -> Self {
        Self {
            result: CompareResult::Less.into(),
            target: CompareTarget::Create.into(),
            key,
            range_end: Vec::new(),
            target_union: Some(TargetUnion::CreateRevision(1)),
        }
    }
}

impl RequestOp {
    /// Branch action writing `value` under `key`.
    pub fn put(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self {
            request: Some(Request::RequestPut(PutRequest {
                key,
                value,
                ..Default::default()
            })),
        }
    }

    /// Branch action reading the single key `key`.
    pub fn get(key: Vec<u8>) -> Self {
        Self {
            request: Some(Request::RequestRange(RangeRequest {
                key,
                ..Default::default()
            })),
        }
    }

    /// Branch action reading the range `[key, range_end)`.
    pub fn range(key: Vec<u8>, range_end: Vec<u8>) -> Self {
        Self {
            request: Some(Request::RequestRange(RangeRequest {
                key,
                range_end,
                ..Default::default()
            })),
        }
    }

    /// Branch action deleting the single key `key`.
    pub fn delete(key: Vec<u8>) -> Self {
        Self {
            request: Some(Request::RequestDeleteRange(DeleteRangeRequest {
                key,
                ..Default::default()
            })),
        }
    }
}
