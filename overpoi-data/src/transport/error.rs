//! Failure types for a single delivery attempt and for a whole delivery.

use thiserror::Error;

/// Failure of one attempt to reach the Overpass endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The endpoint answered with a non-success status.
    #[error("request to {url} failed with status {status}: {message}")]
    Http {
        /// Endpoint URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body excerpt or client message.
        message: String,
    },
    /// The request never produced a response.
    #[error("network error talking to {url}: {message}")]
    Network {
        /// Endpoint URL.
        url: String,
        /// Underlying client message.
        message: String,
    },
    /// No response arrived before the deadline.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout {
        /// Endpoint URL.
        url: String,
        /// Timeout that elapsed.
        timeout_secs: u64,
    },
    /// The server answered but ran out of time or memory running the query.
    #[error("Overpass could not finish the query: {remark}")]
    Overloaded {
        /// Server remark.
        remark: String,
    },
}

impl TransportError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Network failures, timeouts, `429 Too Many Requests`, server errors and
    /// overload remarks are transient. Other client errors mean the query itself is wrong.
    ///
    /// # Examples
    /// ```
    /// use overpoi_data::TransportError;
    ///
    /// let busy = TransportError::Http { url: "u".into(), status: 429, message: String::new() };
    /// let bad = TransportError::Http { url: "u".into(), status: 400, message: String::new() };
    /// assert!(busy.is_retryable());
    /// assert!(!bad.is_retryable());
    /// ```
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::Network { .. } | Self::Timeout { .. } | Self::Overloaded { .. } => true,
        }
    }
}

/// Delivery gave up: retries were exhausted or the failure was permanent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("upstream unavailable after {attempts} attempt(s): {last}")]
pub struct UpstreamUnavailable {
    /// Attempts made, including the first.
    pub attempts: u32,
    /// Diagnostic from the final attempt.
    #[source]
    pub last: TransportError,
}

/// Why [`RetryingTransport::send_until`](super::RetryingTransport::send_until)
/// returned without a body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The endpoint could not serve the query.
    #[error(transparent)]
    Unavailable(#[from] UpstreamUnavailable),
    /// The caller cancelled before a response arrived.
    #[error("delivery cancelled after {attempts} attempt(s)")]
    Cancelled {
        /// Attempts completed before cancellation.
        attempts: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn http(status: u16) -> TransportError {
        TransportError::Http {
            url: "https://overpass.test/api/interpreter".to_owned(),
            status,
            message: String::new(),
        }
    }

    #[rstest]
    #[case(429, true)]
    #[case(500, true)]
    #[case(502, true)]
    #[case(504, true)]
    #[case(400, false)]
    #[case(404, false)]
    fn http_statuses_classify(#[case] status: u16, #[case] expected: bool) {
        assert_eq!(http(status).is_retryable(), expected);
    }

    #[rstest]
    fn connection_problems_are_transient() {
        let network = TransportError::Network {
            url: "u".to_owned(),
            message: "connection reset".to_owned(),
        };
        let timeout = TransportError::Timeout {
            url: "u".to_owned(),
            timeout_secs: 25,
        };
        let overloaded = TransportError::Overloaded {
            remark: "runtime error: Query timed out".to_owned(),
        };
        assert!(network.is_retryable());
        assert!(timeout.is_retryable());
        assert!(overloaded.is_retryable());
    }

    #[rstest]
    fn unavailable_reports_last_diagnostic() {
        let err = UpstreamUnavailable {
            attempts: 3,
            last: http(503),
        };
        let message = err.to_string();
        assert!(message.contains("3 attempt(s)"));
        assert!(message.contains("status 503"));
    }
}
