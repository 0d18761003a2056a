use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use futures::Stream;
use tokio::sync::mpsc;
use tonic::Streaming;

use crate::error::Error;
use crate::error::Result;
use crate::proto::etcdserverpb::WatchRequest;
use crate::proto::etcdserverpb::WatchResponse;

/// Handle to one open watch stream
///
/// Returned by [`Client::watch()`](crate::Client::watch) once the stream is
/// established. The write half accepts further [`WatchRequest`]s (additional
/// watchers, cancellations, progress probes); the read half yields every
/// [`WatchResponse`] the server sends, multiplexed across all watchers
/// registered on this stream.
///
/// Dropping the handle closes the write half, which tells the service to
/// tear down the stream and every watcher on it. There is no separate
/// shutdown call.
///
/// The handle also implements [`Stream`], yielding the same items
/// [`message()`](WatchStream::message) would return.
pub struct WatchStream {
    sender: mpsc::Sender<WatchRequest>,
    inbound: Streaming<WatchResponse>,
}

impl WatchStream {
    pub(crate) fn new(
        sender: mpsc::Sender<WatchRequest>,
        inbound: Streaming<WatchResponse>,
    ) -> Self {
        Self { sender, inbound }
    }

    /// Wait for the next message from the server.
    ///
    /// Resolves to `Ok(None)` once the server has closed its half of the
    /// stream; after that every further call returns `Ok(None)` as well.
    /// Responses are delivered in server send order. Note that a response
    /// with `canceled == true` or an empty event list is still a message,
    /// not an error.
    pub async fn message(&mut self) -> Result<Option<WatchResponse>> {
        self.inbound.message().await.map_err(Error::from)
    }

    /// Queue a request on the stream's write half.
    ///
    /// Fails with [`Error::StreamClosed`] if the outbound side is already
    /// gone, which happens after the transport drops the stream.
    pub async fn send(&mut self, request: WatchRequest) -> Result<()> {
        self.sender
            .send(request)
            .await
            .map_err(|_| Error::StreamClosed)
    }

    /// Ask the server to cancel one watcher on this stream.
    ///
    /// `watch_id` must have been assigned on this stream; ids are not
    /// portable across streams. The server acknowledges with a response
    /// carrying `canceled == true`, after which no more events for that
    /// watcher arrive.
    pub async fn cancel(&mut self, watch_id: i64) -> Result<()> {
        self.send(WatchRequest::cancel(watch_id)).await
    }
}

impl Stream for WatchStream {
    type Item = Result<WatchResponse>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.inbound)
            .poll_next(cx)
            .map(|next| next.map(|result| result.map_err(Error::from)))
    }
}
