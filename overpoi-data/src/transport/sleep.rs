//! Clock abstraction for backoff and pacing delays.

use std::time::Duration;

use async_trait::async_trait;

/// Waits for a duration.
///
/// Production code uses [`TokioSleeper`]; tests substitute a recorder so
/// that retries and pacing run instantly while the requested delays remain
/// observable.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspend the caller for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the Tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
