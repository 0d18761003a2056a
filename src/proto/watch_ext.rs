//! Constructors for messages on the watch request stream.

use crate::proto::etcdserverpb::watch_request::RequestUnion;
use crate::proto::etcdserverpb::WatchCancelRequest;
use crate::proto::etcdserverpb::WatchCreateRequest;
use crate::proto::etcdserverpb::WatchProgressRequest;
use crate::proto::etcdserverpb::WatchRequest;

impl WatchRequest {
    /// Register a new watcher on the stream.
    pub fn create(create: WatchCreateRequest) -> Self {
        Self {
            request_union: Some(RequestUnion::CreateRequest(create)),
        }
    }

    /// Cancel the watcher identified by `watch_id`.
    ///
    /// Watch ids are scoped to the stream that created them, so this only
    /// addresses watchers registered on the stream it is sent over.
    pub fn cancel(watch_id: i64) -> Self {
        Self {
            request_union: Some(RequestUnion::CancelRequest(WatchCancelRequest {
                watch_id,
            })),
        }
    }

    /// Ask the server for an immediate progress notification.
    pub fn progress() -> Self {
        Self {
            request_union: Some(RequestUnion::ProgressRequest(WatchProgressRequest {})),
        }
    }
}
