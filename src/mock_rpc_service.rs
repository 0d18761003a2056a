//! Serves [`MockEtcd`] over real gRPC on an ephemeral loopback port.
//!
//! Needs the `tokio-stream` dev-dependency with the `net` feature enabled
//! for [`TcpListenerStream`].

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::codec::CompressionEncoding;
use tonic::transport::Channel;
use tonic::transport::Server;
use tonic::Status;

use crate::client::Client;
use crate::mock_rpc::MockEtcd;
use crate::proto::etcdserverpb::kv_server::KvServer;
use crate::proto::etcdserverpb::lease_server::LeaseServer;
use crate::proto::etcdserverpb::watch_server::WatchServer;
use crate::proto::v3lockpb::lock_server::LockServer;

pub struct MockNode;

impl MockNode {
    /// Bind `127.0.0.1:0`, serve all four services until `shutdown` fires,
    /// and return the bound address.
    ///
    /// The services negotiate gzip in both directions, matching the
    /// client-side default.
    pub async fn mock_listener(
        mock: MockEtcd,
        shutdown: oneshot::Receiver<()>,
    ) -> Result<SocketAddr, Status> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| Status::internal(format!("Failed to bind: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| Status::internal(format!("Failed to read local addr: {e}")))?;

        let service = Arc::new(mock);
        let _server = tokio::spawn(async move {
            Server::builder()
                .add_service(
                    KvServer::from_arc(Arc::clone(&service))
                        .accept_compressed(CompressionEncoding::Gzip)
                        .send_compressed(CompressionEncoding::Gzip),
                )
                .add_service(
                    WatchServer::from_arc(Arc::clone(&service))
                        .accept_compressed(CompressionEncoding::Gzip)
                        .send_compressed(CompressionEncoding::Gzip),
                )
                .add_service(
                    LeaseServer::from_arc(Arc::clone(&service))
                        .accept_compressed(CompressionEncoding::Gzip)
                        .send_compressed(CompressionEncoding::Gzip),
                )
                .add_service(
                    LockServer::from_arc(service)
                        .accept_compressed(CompressionEncoding::Gzip)
                        .send_compressed(CompressionEncoding::Gzip),
                )
                .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async {
                    shutdown.await.ok();
                })
                .await
                .unwrap();
        });

        Ok(addr)
    }

    /// Spin up the fake and hand back a [`Client`] connected to it.
    pub async fn mock_client(mock: MockEtcd, shutdown: oneshot::Receiver<()>) -> Client {
        let addr = Self::mock_listener(mock, shutdown)
            .await
            .expect("mock listener failed to start");
        Client::builder(addr.to_string())
            .build()
            .await
            .expect("connection failed")
    }

    /// Raw channel to an already-running listener.
    pub async fn mock_channel(addr: SocketAddr) -> Channel {
        Channel::from_shared(format!("http://{addr}"))
            .expect("valid address")
            .connect()
            .await
            .expect("connection failed")
    }
}
