//! # etcd3
//!
//! Thin asynchronous client for the etcd v3 API: key-value access,
//! transactions, leases, watches, and named locks over gRPC.
//!
//! Every method maps to exactly one RPC and one awaited round trip. The
//! client adds no retry loops, caches, or background tasks; composing
//! those (see [`exponential_backoff`]) stays in the caller's hands.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use etcd3::Client;
//! use etcd3::pb::PutRequest;
//! use etcd3::pb::RangeRequest;
//!
//! let client = Client::builder("127.0.0.1:2379").build().await?;
//!
//! client
//!     .put(PutRequest {
//!         key: b"greeting".to_vec(),
//!         value: b"hello".to_vec(),
//!         ..Default::default()
//!     })
//!     .await?;
//!
//! let response = client
//!     .range(RangeRequest {
//!         key: b"greeting".to_vec(),
//!         ..Default::default()
//!     })
//!     .await?;
//! ```

mod backoff;
mod builder;
mod client;
mod config;
mod error;
mod proto;
mod scoped_timer;
mod util;
mod watch;

pub use backoff::*;
pub use builder::*;
pub use client::*;
pub use config::*;
pub use error::*;
pub use util::*;
pub use watch::*;

/// Wire-level protocol types
///
/// Auto-generated protobuf/gRPC definitions for the etcd v3 surface this
/// crate speaks: the `etcdserverpb` request and response messages at the
/// root, with the `mvccpb` key-value/event types and the `v3lockpb` lock
/// messages as submodules. Field names and numbers match upstream, so
/// payloads interoperate with any etcd v3 server.
pub mod pb {
    pub use crate::proto::etcdserverpb::*;
    pub use crate::proto::mvccpb;
    pub use crate::proto::v3lockpb;
}

#[cfg(test)]
mod client_test;
#[cfg(test)]
mod mock_rpc;
#[cfg(test)]
mod mock_rpc_service;
