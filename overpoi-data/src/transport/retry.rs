//! Bounded retries with exponential backoff.
//!
//! The retry decision is a pure state transition so it can be tested without
//! any I/O. [`RetryingTransport`] drives that state machine against an
//! [`OverpassTransport`] and a [`Sleeper`].

use std::time::Duration;

use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use crate::parse::overload_remark;

use super::{DeliveryError, OverpassTransport, Sleeper, TransportError, UpstreamUnavailable};

/// Attempts made before giving up, including the first.
pub const MAX_ATTEMPTS: u32 = 3;

/// Delay before the second attempt; doubled for every further attempt.
pub const BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Where a delivery stands after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// Attempt number `n` (1-based) is due.
    Attempting(u32),
    /// A response was received.
    Succeeded,
    /// No further attempts will be made.
    FailedPermanently,
}

/// Classification of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The endpoint answered successfully.
    Success,
    /// The failure is transient.
    Retryable,
    /// The failure will not go away by retrying.
    Fatal,
}

impl AttemptOutcome {
    /// Classify the result of [`OverpassTransport::post`].
    #[must_use]
    pub const fn classify(result: &Result<String, TransportError>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(error) if error.is_retryable() => Self::Retryable,
            Err(_) => Self::Fatal,
        }
    }
}

/// Attempt limit and backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(MAX_ATTEMPTS, BACKOFF_BASE)
    }
}

impl RetryPolicy {
    /// A policy allowing `max_attempts` attempts (at least one).
    #[must_use]
    pub const fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            max_attempts: if max_attempts == 0 { 1 } else { max_attempts },
            backoff_base,
        }
    }

    /// Attempts allowed in total.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to wait after failed attempt number `attempt`.
    ///
    /// # Examples
    /// ```
    /// use std::time::Duration;
    /// use overpoi_data::RetryPolicy;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.backoff_delay(1), Duration::from_secs(1));
    /// assert_eq!(policy.backoff_delay(2), Duration::from_secs(2));
    /// assert_eq!(policy.backoff_delay(3), Duration::from_secs(4));
    /// ```
    #[must_use]
    pub const fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = match 1_u32.checked_shl(attempt.saturating_sub(1)) {
            Some(factor) => factor,
            None => u32::MAX,
        };
        self.backoff_base.saturating_mul(factor)
    }

    /// Transition after attempt number `attempt` finished with `outcome`.
    ///
    /// # Examples
    /// ```
    /// use overpoi_data::{RetryPolicy, RetryState};
    /// use overpoi_data::transport::AttemptOutcome;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.next_state(1, AttemptOutcome::Retryable), RetryState::Attempting(2));
    /// assert_eq!(policy.next_state(3, AttemptOutcome::Retryable), RetryState::FailedPermanently);
    /// assert_eq!(policy.next_state(1, AttemptOutcome::Fatal), RetryState::FailedPermanently);
    /// ```
    #[must_use]
    pub const fn next_state(&self, attempt: u32, outcome: AttemptOutcome) -> RetryState {
        match outcome {
            AttemptOutcome::Success => RetryState::Succeeded,
            AttemptOutcome::Fatal => RetryState::FailedPermanently,
            AttemptOutcome::Retryable if attempt < self.max_attempts => {
                RetryState::Attempting(attempt + 1)
            }
            AttemptOutcome::Retryable => RetryState::FailedPermanently,
        }
    }
}

/// A response body and the attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Raw response body.
    pub body: String,
    /// Attempts made, including the successful one.
    pub attempts: u32,
}

impl Delivery {
    /// Attempts beyond the first.
    #[must_use]
    pub const fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Sends queries with retries according to a [`RetryPolicy`].
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use overpoi_data::RetryingTransport;
/// use overpoi_data::test_support::{RecordingSleeper, StubTransport, block_on_for_tests};
///
/// let transport = StubTransport::always(Ok(r#"{"elements":[]}"#.to_owned()));
/// let retrying = RetryingTransport::new(transport, RecordingSleeper::default());
/// let delivery = block_on_for_tests(retrying.send("[out:json];", Duration::from_secs(25)))
///     .expect("stub always succeeds");
/// assert_eq!(delivery.attempts, 1);
/// ```
#[derive(Debug, Clone)]
pub struct RetryingTransport<T, S> {
    transport: T,
    sleeper: S,
    policy: RetryPolicy,
}

impl<T, S> RetryingTransport<T, S>
where
    T: OverpassTransport,
    S: Sleeper,
{
    /// Wrap `transport` with the default policy.
    pub fn new(transport: T, sleeper: S) -> Self {
        Self {
            transport,
            sleeper,
            policy: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Active policy.
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Clock used for backoff delays.
    pub const fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// Deliver `query`, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Unavailable`] when attempts are exhausted or
    /// the endpoint rejects the query outright.
    pub async fn send(&self, query: &str, timeout: Duration) -> Result<Delivery, DeliveryError> {
        self.send_until(query, timeout, &CancellationToken::new())
            .await
    }

    /// Deliver `query` unless `cancel` fires first.
    ///
    /// No attempt starts once the token is cancelled; a pending backoff is
    /// cut short. An attempt already in flight runs to completion.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Unavailable`] as for [`Self::send`] and
    /// [`DeliveryError::Cancelled`] when the token fires.
    pub async fn send_until(
        &self,
        query: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Delivery, DeliveryError> {
        let mut attempt = 1;
        loop {
            if cancel.is_cancelled() {
                return Err(DeliveryError::Cancelled {
                    attempts: attempt - 1,
                });
            }
            debug!("sending Overpass query, attempt {attempt}");
            let result = self
                .transport
                .post(query, timeout)
                .await
                .and_then(reject_overloaded);
            let outcome = AttemptOutcome::classify(&result);
            match (self.policy.next_state(attempt, outcome), result) {
                (_, Ok(body)) => {
                    return Ok(Delivery {
                        body,
                        attempts: attempt,
                    });
                }
                (RetryState::Attempting(next), Err(error)) => {
                    let delay = self.policy.backoff_delay(attempt);
                    warn!("attempt {attempt} failed: {error}; retrying in {delay:?}");
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            return Err(DeliveryError::Cancelled { attempts: attempt });
                        }
                        () = self.sleeper.sleep(delay) => {}
                    }
                    attempt = next;
                }
                (_, Err(last)) => {
                    warn!("giving up after {attempt} attempt(s): {last}");
                    return Err(UpstreamUnavailable {
                        attempts: attempt,
                        last,
                    }
                    .into());
                }
            }
        }
    }
}

/// Turn a 200 response reporting an upstream overload into a retryable error.
fn reject_overloaded(body: String) -> Result<String, TransportError> {
    match overload_remark(&body) {
        Some(remark) => Err(TransportError::Overloaded { remark }),
        None => Ok(body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        RecordingSleeper, StubTransport, Timeline, TimelineEntry, block_on_for_tests,
    };
    use rstest::rstest;

    const QUERY: &str = "[out:json][timeout:25];";
    const TIMEOUT: Duration = Duration::from_secs(25);

    fn server_error() -> TransportError {
        TransportError::Http {
            url: "https://overpass.test".to_owned(),
            status: 504,
            message: "gateway timeout".to_owned(),
        }
    }

    fn bad_request() -> TransportError {
        TransportError::Http {
            url: "https://overpass.test".to_owned(),
            status: 400,
            message: "parse error".to_owned(),
        }
    }

    #[rstest]
    #[case(0, Duration::from_secs(1))]
    #[case(1, Duration::from_secs(1))]
    #[case(2, Duration::from_secs(2))]
    #[case(3, Duration::from_secs(4))]
    #[case(5, Duration::from_secs(16))]
    fn backoff_doubles(#[case] attempt: u32, #[case] expected: Duration) {
        assert_eq!(RetryPolicy::default().backoff_delay(attempt), expected);
    }

    #[rstest]
    fn backoff_saturates_for_absurd_attempts() {
        let delay = RetryPolicy::default().backoff_delay(200);
        assert_eq!(delay, BACKOFF_BASE.saturating_mul(u32::MAX));
    }

    #[rstest]
    #[case(1, AttemptOutcome::Success, RetryState::Succeeded)]
    #[case(1, AttemptOutcome::Retryable, RetryState::Attempting(2))]
    #[case(2, AttemptOutcome::Retryable, RetryState::Attempting(3))]
    #[case(3, AttemptOutcome::Retryable, RetryState::FailedPermanently)]
    #[case(1, AttemptOutcome::Fatal, RetryState::FailedPermanently)]
    fn state_transitions(
        #[case] attempt: u32,
        #[case] outcome: AttemptOutcome,
        #[case] expected: RetryState,
    ) {
        assert_eq!(RetryPolicy::default().next_state(attempt, outcome), expected);
    }

    #[rstest]
    fn zero_attempt_policy_still_tries_once() {
        let policy = RetryPolicy::new(0, BACKOFF_BASE);
        assert_eq!(policy.max_attempts(), 1);
    }

    #[rstest]
    fn recovers_after_transient_failures() {
        let timeline = Timeline::default();
        let transport = StubTransport::scripted([
            Err(server_error()),
            Err(server_error()),
            Ok("{}".to_owned()),
        ])
        .with_timeline(timeline.clone());
        let sleeper = RecordingSleeper::default().with_timeline(timeline.clone());
        let retrying = RetryingTransport::new(transport.clone(), sleeper);

        let delivery = block_on_for_tests(retrying.send(QUERY, TIMEOUT)).expect("third attempt");

        assert_eq!(delivery.attempts, 3);
        assert_eq!(delivery.retries(), 2);
        assert_eq!(transport.calls(), 3);
        assert_eq!(
            timeline.sleeps(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
        assert!(matches!(
            timeline.entries().first(),
            Some(TimelineEntry::Request { .. })
        ));
    }

    fn overloaded_body() -> String {
        serde_json::json!({
            "elements": [],
            "remark": "runtime error: Query timed out in \"query\" at line 3 after 26 seconds."
        })
        .to_string()
    }

    #[rstest]
    fn overload_remarks_are_retried() {
        let transport = StubTransport::scripted([
            Ok(overloaded_body()),
            Ok(r#"{"elements": []}"#.to_owned()),
        ]);
        let sleeper = RecordingSleeper::default();
        let retrying = RetryingTransport::new(transport.clone(), sleeper.clone());

        let delivery = block_on_for_tests(retrying.send(QUERY, TIMEOUT)).expect("second attempt");

        assert_eq!(delivery.attempts, 2);
        assert_eq!(delivery.body, r#"{"elements": []}"#);
        assert_eq!(sleeper.timeline().sleeps(), vec![Duration::from_secs(1)]);
    }

    #[rstest]
    fn persistent_overload_exhausts_attempts() {
        let transport = StubTransport::always(Ok(overloaded_body()));
        let retrying = RetryingTransport::new(transport.clone(), RecordingSleeper::default());

        let err = block_on_for_tests(retrying.send(QUERY, TIMEOUT)).expect_err("always busy");

        let DeliveryError::Unavailable(unavailable) = err else {
            panic!("expected unavailable, found {err:?}");
        };
        assert_eq!(unavailable.attempts, MAX_ATTEMPTS);
        assert!(matches!(unavailable.last, TransportError::Overloaded { .. }));
        assert_eq!(transport.calls(), MAX_ATTEMPTS);
    }

    #[rstest]
    fn other_runtime_errors_are_delivered() {
        let body = serde_json::json!({
            "elements": [],
            "remark": "runtime error: Unknown type \"amenity\""
        })
        .to_string();
        let transport = StubTransport::always(Ok(body.clone()));
        let retrying = RetryingTransport::new(transport.clone(), RecordingSleeper::default());

        let delivery = block_on_for_tests(retrying.send(QUERY, TIMEOUT)).expect("delivered");

        assert_eq!(delivery.body, body);
        assert_eq!(transport.calls(), 1);
    }

    #[rstest]
    fn gives_up_after_max_attempts() {
        let transport = StubTransport::always(Err(server_error()));
        let sleeper = RecordingSleeper::default();
        let retrying = RetryingTransport::new(transport.clone(), sleeper.clone());

        let err = block_on_for_tests(retrying.send(QUERY, TIMEOUT)).expect_err("always fails");

        assert_eq!(
            err,
            DeliveryError::Unavailable(UpstreamUnavailable {
                attempts: MAX_ATTEMPTS,
                last: server_error(),
            })
        );
        assert_eq!(transport.calls(), 3);
        assert_eq!(sleeper.timeline().sleeps().len(), 2);
    }

    #[rstest]
    fn client_errors_are_not_retried() {
        let transport = StubTransport::scripted([Err(bad_request()), Ok("{}".to_owned())]);
        let retrying = RetryingTransport::new(transport.clone(), RecordingSleeper::default());

        let err = block_on_for_tests(retrying.send(QUERY, TIMEOUT)).expect_err("fatal");

        assert_eq!(
            err,
            DeliveryError::Unavailable(UpstreamUnavailable {
                attempts: 1,
                last: bad_request(),
            })
        );
        assert_eq!(transport.calls(), 1);
    }

    #[rstest]
    fn cancelled_token_prevents_any_attempt() {
        let transport = StubTransport::always(Ok("{}".to_owned()));
        let retrying = RetryingTransport::new(transport.clone(), RecordingSleeper::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = block_on_for_tests(retrying.send_until(QUERY, TIMEOUT, &cancel))
            .expect_err("cancelled");

        assert_eq!(err, DeliveryError::Cancelled { attempts: 0 });
        assert_eq!(transport.calls(), 0);
    }

    #[rstest]
    fn cancellation_during_backoff_stops_retries() {
        let cancel = CancellationToken::new();
        let transport = StubTransport::always(Err(server_error()));
        let sleeper = RecordingSleeper::default().cancelling(cancel.clone());
        let retrying = RetryingTransport::new(transport.clone(), sleeper);

        let err = block_on_for_tests(retrying.send_until(QUERY, TIMEOUT, &cancel))
            .expect_err("cancelled");

        assert_eq!(err, DeliveryError::Cancelled { attempts: 1 });
        assert_eq!(transport.calls(), 1);
    }
}
