//! Client error hierarchy.
//!
//! Failures fall into two layers: transport problems while establishing the
//! channel, and RPC statuses returned by the service. Statuses pass through
//! verbatim; the crate never rewrites codes or messages and never retries on
//! the caller's behalf.

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Channel construction or connection establishment failures
    #[error(transparent)]
    Transport(#[from] tonic::transport::Error),

    /// RPC failure; carries the service's status code and message verbatim
    #[error(transparent)]
    Rpc(#[from] tonic::Status),

    /// A streaming call ended before the required response arrived
    #[error("stream closed before a response was received")]
    StreamClosed,
}

impl Error {
    /// The RPC status code, when the failure was an RPC failure.
    pub fn code(&self) -> Option<tonic::Code> {
        match self {
            Error::Rpc(status) => Some(status.code()),
            _ => None,
        }
    }
}
