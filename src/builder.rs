use std::time::Duration;

use tonic::transport::Endpoint;
use tracing::debug;

use crate::client::Client;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::util::endpoint_str;

/// Configurable builder for [`Client`] instances
///
/// Collects the endpoint and connection parameters, then establishes the
/// shared channel in [`build()`](ClientBuilder::build).
///
/// # Typical Usage Flow
/// 1. Start from [`Client::builder()`] with the service address
/// 2. Chain the configuration methods you need
/// 3. Call `build()` to connect and obtain the client
///
/// # Default Configuration
/// Unset fields keep the [`ClientConfig`] defaults: 1s connect timeout, no
/// request timeout, compression enabled.
pub struct ClientBuilder {
    endpoint: String,
    config: ClientConfig,
}

impl ClientBuilder {
    /// Create a builder for the given endpoint.
    ///
    /// Accepts bare `host:port` as well as full `http(s)://` URLs; a bare
    /// address is dialed as `http`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            config: ClientConfig::default(),
        }
    }

    /// Set the timeout for establishing the underlying connection.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set a deadline applied to every RPC issued through the client.
    ///
    /// This also bounds calls that block server-side, such as
    /// [`lock()`](Client::lock) under contention.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    /// Enable or disable gzip compression of request and response bodies.
    pub fn enable_compression(mut self, enable: bool) -> Self {
        self.config.enable_compression = enable;
        self
    }

    /// Replace the entire configuration in one step.
    ///
    /// # Warning: Configuration Override
    /// Any values set through the individual builder methods are discarded;
    /// call this first if you want to adjust single fields afterwards.
    ///
    /// ```no_run
    /// use std::time::Duration;
    ///
    /// use etcd3::Client;
    /// use etcd3::ClientConfig;
    ///
    /// # async fn example() -> Result<(), etcd3::Error> {
    /// let client = Client::builder("127.0.0.1:2379")
    ///     .set_config(ClientConfig {
    ///         request_timeout: Some(Duration::from_secs(3)),
    ///         ..ClientConfig::default()
    ///     })
    ///     .build()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn set_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Connect and construct the [`Client`].
    ///
    /// Performs the only eager connection attempt the client ever makes; a
    /// dead endpoint fails here with [`Error::Transport`](crate::Error),
    /// not on the first RPC.
    pub async fn build(self) -> Result<Client> {
        let addr = endpoint_str(&self.endpoint);
        debug!("create_channel, addr = {:?}", &addr);

        let mut endpoint = Endpoint::try_from(addr)?
            .connect_timeout(self.config.connect_timeout)
            .tcp_keepalive(Some(self.config.tcp_keepalive))
            .http2_keep_alive_interval(self.config.http2_keepalive_interval)
            .keep_alive_timeout(self.config.http2_keepalive_timeout);
        if let Some(timeout) = self.config.request_timeout {
            endpoint = endpoint.timeout(timeout);
        }
        let channel = endpoint.connect().await?;

        Ok(Client::with_channel(channel, self.config))
    }
}
