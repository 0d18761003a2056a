use tokio::time::Instant;
use tracing::trace;

/// Drop guard emitting a trace-level latency record for the enclosing call.
pub(crate) struct ScopedTimer {
    start: Instant,
    op: &'static str,
}

impl ScopedTimer {
    pub(crate) fn new(op: &'static str) -> Self {
        Self {
            start: Instant::now(),
            op,
        }
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        trace!(
            target: "timing",
            op = self.op,
            elapsed_ms = elapsed.as_millis() as u64,
            "call finished"
        );
    }
}
