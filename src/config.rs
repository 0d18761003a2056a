use std::time::Duration;

/// Client configuration parameters for channel construction
///
/// Encapsulates the tunable settings for establishing and maintaining the
/// underlying HTTP/2 channel: connection timeouts, keepalive policies, and
/// compression.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Maximum time to wait for establishing a TCP connection
    /// Default: 1 second
    pub connect_timeout: Duration,

    /// Maximum time to wait for a complete RPC response, applied to every
    /// call on the channel. Unset means calls wait indefinitely; note that
    /// a server-side `lock` wait holds its RPC open until acquisition, so a
    /// deadline here also bounds lock acquisition.
    /// Default: none
    pub request_timeout: Option<Duration>,

    /// TCP keepalive duration for idle connections
    /// Default: 5 minutes (300s)
    pub tcp_keepalive: Duration,

    /// Interval for HTTP/2 keepalive pings
    /// Default: 1 minute (60s)
    pub http2_keepalive_interval: Duration,

    /// Timeout for HTTP/2 keepalive pings
    /// Default: 20 seconds
    pub http2_keepalive_timeout: Duration,

    /// Enable Gzip compression for network traffic
    /// Tradeoff: Reduces bandwidth usage at the cost of CPU
    /// Default: true (enabled)
    pub enable_compression: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(1000),
            request_timeout: None,
            tcp_keepalive: Duration::from_secs(300),
            http2_keepalive_interval: Duration::from_secs(60),
            http2_keepalive_timeout: Duration::from_secs(20),
            enable_compression: true,
        }
    }
}
