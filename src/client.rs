use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::codec::CompressionEncoding;
use tonic::transport::Channel;
use tracing::debug;
use tracing::error;

use crate::builder::ClientBuilder;
use crate::config::ClientConfig;
use crate::error::Error;
use crate::error::Result;
use crate::proto::etcdserverpb::kv_client::KvClient;
use crate::proto::etcdserverpb::lease_client::LeaseClient;
use crate::proto::etcdserverpb::watch_client::WatchClient;
use crate::proto::etcdserverpb::DeleteRangeRequest;
use crate::proto::etcdserverpb::DeleteRangeResponse;
use crate::proto::etcdserverpb::LeaseGrantRequest;
use crate::proto::etcdserverpb::LeaseGrantResponse;
use crate::proto::etcdserverpb::LeaseKeepAliveRequest;
use crate::proto::etcdserverpb::LeaseKeepAliveResponse;
use crate::proto::etcdserverpb::LeaseRevokeRequest;
use crate::proto::etcdserverpb::LeaseRevokeResponse;
use crate::proto::etcdserverpb::PutRequest;
use crate::proto::etcdserverpb::PutResponse;
use crate::proto::etcdserverpb::RangeRequest;
use crate::proto::etcdserverpb::RangeResponse;
use crate::proto::etcdserverpb::TxnRequest;
use crate::proto::etcdserverpb::TxnResponse;
use crate::proto::etcdserverpb::WatchCreateRequest;
use crate::proto::etcdserverpb::WatchRequest;
use crate::proto::v3lockpb::lock_client::LockClient;
use crate::proto::v3lockpb::LockRequest;
use crate::proto::v3lockpb::LockResponse;
use crate::proto::v3lockpb::UnlockRequest;
use crate::proto::v3lockpb::UnlockResponse;
use crate::scoped_timer::ScopedTimer;
use crate::watch::WatchStream;

/// gRPC-based etcd v3 client
///
/// One method per RPC, one round trip per call. The client never retries,
/// never caches, and holds no mutable state: every call clones its stub,
/// and all stubs multiplex over the one shared channel, so a single
/// instance is safe to use from concurrent tasks.
///
/// Created through the [`builder()`](Client::builder) method, or from an
/// existing channel via [`with_channel()`](Client::with_channel).
#[derive(Clone)]
pub struct Client {
    kv: KvClient<Channel>,
    watch: WatchClient<Channel>,
    lease: LeaseClient<Channel>,
    lock: LockClient<Channel>,
    config: ClientConfig,
}

impl Client {
    /// Create a configured client builder
    ///
    /// Starts client construction with the given endpoint. Chain
    /// configuration methods before calling
    /// [`build()`](ClientBuilder::build).
    ///
    /// # Arguments
    /// * `endpoint` - Service address, either bare `host:port` or a full
    ///   `http(s)://` URL
    pub fn builder(endpoint: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(endpoint)
    }

    /// Wrap an already-connected channel.
    ///
    /// The channel is used as-is; only `config.enable_compression` still
    /// applies, per call. Useful when the caller manages TLS or connection
    /// setup itself.
    pub fn with_channel(channel: Channel, config: ClientConfig) -> Self {
        Self {
            kv: KvClient::new(channel.clone()),
            watch: WatchClient::new(channel.clone()),
            lease: LeaseClient::new(channel.clone()),
            lock: LockClient::new(channel),
            config,
        }
    }

    /// Assemble a client from four pre-built service stubs.
    ///
    /// The stubs are used exactly as configured by the caller; no channel
    /// tuning or compression is layered on top. This is the seam for
    /// substituting test doubles.
    pub fn from_parts(
        kv: KvClient<Channel>,
        watch: WatchClient<Channel>,
        lease: LeaseClient<Channel>,
        lock: LockClient<Channel>,
    ) -> Self {
        Self {
            kv,
            watch,
            lease,
            lock,
            config: ClientConfig {
                enable_compression: false,
                ..ClientConfig::default()
            },
        }
    }

    /// The configuration this client was constructed with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn make_kv(&self) -> KvClient<Channel> {
        let mut client = self.kv.clone();
        if self.config.enable_compression {
            client = client
                .send_compressed(CompressionEncoding::Gzip)
                .accept_compressed(CompressionEncoding::Gzip);
        }
        client
    }

    fn make_watch(&self) -> WatchClient<Channel> {
        let mut client = self.watch.clone();
        if self.config.enable_compression {
            client = client
                .send_compressed(CompressionEncoding::Gzip)
                .accept_compressed(CompressionEncoding::Gzip);
        }
        client
    }

    fn make_lease(&self) -> LeaseClient<Channel> {
        let mut client = self.lease.clone();
        if self.config.enable_compression {
            client = client
                .send_compressed(CompressionEncoding::Gzip)
                .accept_compressed(CompressionEncoding::Gzip);
        }
        client
    }

    fn make_lock(&self) -> LockClient<Channel> {
        let mut client = self.lock.clone();
        if self.config.enable_compression {
            client = client
                .send_compressed(CompressionEncoding::Gzip)
                .accept_compressed(CompressionEncoding::Gzip);
        }
        client
    }

    /// Write a key, optionally attaching a lease or echoing the previous
    /// value.
    pub async fn put(&self, request: PutRequest) -> Result<PutResponse> {
        let _timer = ScopedTimer::new("client::put");

        match self.make_kv().put(request).await {
            Ok(response) => {
                debug!("put response: {:?}", response.get_ref());
                Ok(response.into_inner())
            }
            Err(status) => {
                error!("put failed: {:?}", status);
                Err(status.into())
            }
        }
    }

    /// Read a key, a range, or a prefix (pair `key` with
    /// [`prefix_range_end`](crate::prefix_range_end)).
    pub async fn range(&self, request: RangeRequest) -> Result<RangeResponse> {
        let _timer = ScopedTimer::new("client::range");

        match self.make_kv().range(request).await {
            Ok(response) => {
                debug!("range response: {:?}", response.get_ref());
                Ok(response.into_inner())
            }
            Err(status) => {
                error!("range failed: {:?}", status);
                Err(status.into())
            }
        }
    }

    /// Delete a key or range of keys.
    pub async fn delete_range(
        &self,
        request: DeleteRangeRequest,
    ) -> Result<DeleteRangeResponse> {
        let _timer = ScopedTimer::new("client::delete_range");

        match self.make_kv().delete_range(request).await {
            Ok(response) => {
                debug!("delete_range response: {:?}", response.get_ref());
                Ok(response.into_inner())
            }
            Err(status) => {
                error!("delete_range failed: {:?}", status);
                Err(status.into())
            }
        }
    }

    /// Execute a transaction: all `compare` guards are evaluated
    /// atomically, then exactly one of the `success` / `failure` branches
    /// runs, in one round trip.
    ///
    /// Guard and branch construction helpers live on
    /// [`Compare`](crate::pb::Compare) and
    /// [`RequestOp`](crate::pb::RequestOp).
    pub async fn txn(&self, request: TxnRequest) -> Result<TxnResponse> {
        let _timer = ScopedTimer::new("client::txn");

        match self.make_kv().txn(request).await {
            Ok(response) => {
                debug!("txn response: {:?}", response.get_ref());
                Ok(response.into_inner())
            }
            Err(status) => {
                error!("txn failed: {:?}", status);
                Err(status.into())
            }
        }
    }

    /// Create a lease with the given time-to-live.
    ///
    /// Keys put with the returned lease id are deleted by the service when
    /// the lease expires.
    pub async fn lease_grant(
        &self,
        request: LeaseGrantRequest,
    ) -> Result<LeaseGrantResponse> {
        let _timer = ScopedTimer::new("client::lease_grant");

        match self.make_lease().lease_grant(request).await {
            Ok(response) => {
                debug!("lease_grant response: {:?}", response.get_ref());
                Ok(response.into_inner())
            }
            Err(status) => {
                error!("lease_grant failed: {:?}", status);
                Err(status.into())
            }
        }
    }

    /// Revoke a lease, deleting every key attached to it.
    pub async fn lease_revoke(
        &self,
        request: LeaseRevokeRequest,
    ) -> Result<LeaseRevokeResponse> {
        let _timer = ScopedTimer::new("client::lease_revoke");

        match self.make_lease().lease_revoke(request).await {
            Ok(response) => {
                debug!("lease_revoke response: {:?}", response.get_ref());
                Ok(response.into_inner())
            }
            Err(status) => {
                error!("lease_revoke failed: {:?}", status);
                Err(status.into())
            }
        }
    }

    /// Send a single keep-alive ping for a lease and wait for the refreshed
    /// TTL.
    ///
    /// The native RPC is a bidirectional stream; this method performs the
    /// one-shot exchange: write one request, signal end-of-writes, read one
    /// response. Callers keep a lease alive by invoking it on a timer with
    /// a period below the lease TTL; the client schedules nothing itself.
    /// A stream that ends before the response arrives surfaces as
    /// [`Error::StreamClosed`].
    pub async fn lease_keep_alive(
        &self,
        request: LeaseKeepAliveRequest,
    ) -> Result<LeaseKeepAliveResponse> {
        let _timer = ScopedTimer::new("client::lease_keep_alive");

        let outbound = tokio_stream::once(request);
        let mut inbound = match self.make_lease().lease_keep_alive(outbound).await {
            Ok(response) => response.into_inner(),
            Err(status) => {
                error!("lease_keep_alive failed: {:?}", status);
                return Err(status.into());
            }
        };

        match inbound.message().await {
            Ok(Some(response)) => {
                debug!("lease_keep_alive response: {:?}", response);
                Ok(response)
            }
            Ok(None) => {
                error!("lease_keep_alive stream closed without a response");
                Err(Error::StreamClosed)
            }
            Err(status) => {
                error!("lease_keep_alive failed: {:?}", status);
                Err(status.into())
            }
        }
    }

    /// Acquire a named distributed lock.
    ///
    /// Blocks server-side until the lock is granted or the request fails;
    /// the returned key exists for exactly as long as the caller holds the
    /// lock. A configured `request_timeout` bounds the wait.
    pub async fn lock(&self, request: LockRequest) -> Result<LockResponse> {
        let _timer = ScopedTimer::new("client::lock");

        match self.make_lock().lock(request).await {
            Ok(response) => {
                debug!("lock response: {:?}", response.get_ref());
                Ok(response.into_inner())
            }
            Err(status) => {
                error!("lock failed: {:?}", status);
                Err(status.into())
            }
        }
    }

    /// Release a lock by the ownership key returned from
    /// [`lock()`](Client::lock).
    pub async fn unlock(&self, request: UnlockRequest) -> Result<UnlockResponse> {
        let _timer = ScopedTimer::new("client::unlock");

        match self.make_lock().unlock(request).await {
            Ok(response) => {
                debug!("unlock response: {:?}", response.get_ref());
                Ok(response.into_inner())
            }
            Err(status) => {
                error!("unlock failed: {:?}", status);
                Err(status.into())
            }
        }
    }

    /// Open a watch stream and register the given watcher on it.
    ///
    /// The first message the server sends on the returned stream confirms
    /// registration (`created == true` plus the assigned watch id) before
    /// any change events. Further watchers and cancellations go through the
    /// returned [`WatchStream`]; watch ids are scoped to the stream that
    /// created them, so cancelling elsewhere addresses nothing.
    pub async fn watch(&self, create: WatchCreateRequest) -> Result<WatchStream> {
        let _timer = ScopedTimer::new("client::watch");

        let (sender, receiver) = mpsc::channel(16);
        // The receiver is still local here, so this send cannot fail.
        sender
            .send(WatchRequest::create(create))
            .await
            .map_err(|_| Error::StreamClosed)?;

        match self.make_watch().watch(ReceiverStream::new(receiver)).await {
            Ok(response) => {
                debug!("watch stream established");
                Ok(WatchStream::new(sender, response.into_inner()))
            }
            Err(status) => {
                error!("watch failed: {:?}", status);
                Err(status.into())
            }
        }
    }
}
