//! Vendored protobuf/gRPC bindings for the etcd v3 API surface this crate
//! speaks.
//!
//! The files under `generated/` are committed `prost-build`/`tonic-build`
//! output for the schemas in the repository's `proto/` directory. Package
//! names, field numbers and method paths are identical to upstream etcd, so
//! the stubs stay wire-compatible with a real cluster and the build needs no
//! protoc. Server codegen is included as well; the test suite implements it
//! for its in-process stand-in.

pub mod etcdserverpb {
    include!("generated/etcdserverpb.rs");
}

pub mod mvccpb {
    include!("generated/mvccpb.rs");
}

pub mod v3lockpb {
    include!("generated/v3lockpb.rs");
}

pub mod txn_ext;
pub mod watch_ext;
