//! Delivery of Overpass queries.
//!
//! [`OverpassTransport`] is the single wire call; [`RetryingTransport`]
//! layers the retry policy on top of any implementation of it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

mod error;
mod http;
mod retry;
mod sleep;

pub use error::{DeliveryError, TransportError, UpstreamUnavailable};
pub use http::{
    DEFAULT_ENDPOINT, DEFAULT_USER_AGENT, HttpOverpassTransport, HttpTransportConfig,
    TransportBuildError,
};
pub use retry::{
    AttemptOutcome, BACKOFF_BASE, Delivery, MAX_ATTEMPTS, RetryPolicy, RetryState,
    RetryingTransport,
};
pub use sleep::{Sleeper, TokioSleeper};

/// Sends one query and returns the raw response body.
///
/// Implementations make exactly one attempt; retrying is the caller's job.
#[async_trait]
pub trait OverpassTransport: Send + Sync {
    /// Post `query` and wait at most `timeout` for the full response.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when no successful response is received.
    async fn post(&self, query: &str, timeout: Duration) -> Result<String, TransportError>;
}

#[async_trait]
impl<T> OverpassTransport for Arc<T>
where
    T: OverpassTransport + ?Sized,
{
    async fn post(&self, query: &str, timeout: Duration) -> Result<String, TransportError> {
        (**self).post(query, timeout).await
    }
}
