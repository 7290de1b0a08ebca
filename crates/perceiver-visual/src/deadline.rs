//! Bounded execution helpers.
//!
//! Every perception sub-call runs against a deadline. CPU-bound work goes to
//! the blocking pool; if the deadline passes first the join handle is dropped,
//! the worker keeps running detached and its eventual result is discarded.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Run a blocking closure on the blocking pool, returning `default` when it
/// overruns `limit`, panics, or returns an error.
pub async fn blocking_with_deadline<T, E, F>(label: &str, limit: Duration, default: T, work: F) -> T
where
    T: Send + 'static,
    E: std::fmt::Display + Send + 'static,
    F: FnOnce() -> Result<T, E> + Send + 'static,
{
    let handle = tokio::task::spawn_blocking(work);
    match tokio::time::timeout(limit, handle).await {
        Ok(Ok(Ok(value))) => value,
        Ok(Ok(Err(err))) => {
            warn!(task = label, error = %err, "blocking task failed, using default");
            default
        }
        Ok(Err(join_err)) => {
            warn!(task = label, error = %join_err, "blocking task panicked, using default");
            default
        }
        Err(_) => {
            warn!(task = label, limit_ms = limit.as_millis() as u64, "blocking task timed out, abandoning");
            default
        }
    }
}

/// Await a future for at most `limit`, substituting `default` on expiry.
pub async fn with_deadline<T, Fut>(label: &str, limit: Duration, default: T, fut: Fut) -> T
where
    Fut: Future<Output = T>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(value) => value,
        Err(_) => {
            warn!(task = label, limit_ms = limit.as_millis() as u64, "call timed out, using default");
            default
        }
    }
}
