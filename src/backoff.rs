use std::future::Future;
use std::time::Duration;

use tonic::Status;
use tracing::debug;

/// Retry pacing for [`exponential_backoff`].
#[derive(Debug, Clone)]
pub struct BackoffOpts {
    /// Pause after the first attempt.
    /// Default: 500 milliseconds
    pub interval: Duration,
    /// Retry budget. Once the summed pauses exceed it, the current outcome
    /// is returned as-is.
    /// Default: 30 seconds
    pub timeout: Duration,
    /// Growth factor applied to the pause after every attempt.
    /// Default: 2.0
    pub multiplier: f64,
}

impl Default for BackoffOpts {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            timeout: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Drives `op` until it succeeds or the retry budget runs out, pausing an
/// exponentially growing interval after every attempt.
///
/// The pause happens after each attempt, including the last one, before the
/// outcome is examined. Budget accounting sums the intended pauses rather
/// than sampling a clock, so wall time can exceed `opts.timeout` under
/// scheduler delay (and by up to one final interval in any case). Callers
/// that need a hard deadline should wrap the call in `tokio::time::timeout`.
///
/// The final attempt's outcome is returned verbatim; no error is rewritten
/// or swallowed.
pub async fn exponential_backoff<F, Fut, T>(
    mut op: F,
    opts: BackoffOpts,
) -> std::result::Result<T, Status>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, Status>>,
{
    let mut interval = opts.interval;
    let mut elapsed = Duration::ZERO;

    loop {
        let outcome = op().await;

        if let Err(status) = &outcome {
            debug!(
                error = %status,
                pause_ms = interval.as_millis() as u64,
                "attempt failed"
            );
        }

        tokio::time::sleep(interval).await;
        elapsed += interval;
        interval = interval.mul_f64(opts.multiplier);

        if elapsed > opts.timeout || outcome.is_ok() {
            return outcome;
        }
    }
}
