//! reqwest-backed [`OverpassTransport`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use url::Url;

use super::{OverpassTransport, TransportError};

/// Public Overpass instance used when no endpoint is configured.
pub const DEFAULT_ENDPOINT: &str = "https://overpass-api.de/api/interpreter";

/// User agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = "overpoi/0.1";

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Longest error body excerpt kept in diagnostics.
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Errors raised while constructing an [`HttpOverpassTransport`].
#[derive(Debug, Error)]
pub enum TransportBuildError {
    /// The endpoint is not an absolute HTTP(S) URL.
    #[error("invalid Overpass endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        /// Rejected value.
        endpoint: String,
        /// Why it was rejected.
        reason: String,
    },
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Configuration for [`HttpOverpassTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Interpreter URL queries are posted to.
    pub endpoint: String,
    /// User agent string for requests.
    pub user_agent: String,
    /// Time allowed to establish a connection.
    pub connect_timeout: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

impl HttpTransportConfig {
    /// Create a configuration for `endpoint`.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

/// Posts queries to an Overpass interpreter over HTTP.
///
/// The query is sent as the `data` form field, which is what public
/// Overpass instances expect for POST requests.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use overpoi_data::{HttpOverpassTransport, OverpassTransport};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = HttpOverpassTransport::new("https://overpass-api.de/api/interpreter")?;
/// let body = transport
///     .post("[out:json];node(1);out;", Duration::from_secs(25))
///     .await?;
/// # let _ = body;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpOverpassTransport {
    client: Client,
    endpoint: Url,
}

impl HttpOverpassTransport {
    /// Create a transport with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is invalid or the HTTP client fails
    /// to build.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, TransportBuildError> {
        Self::with_config(HttpTransportConfig::new(endpoint))
    }

    /// Create a transport with explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is invalid or the HTTP client fails
    /// to build.
    pub fn with_config(config: HttpTransportConfig) -> Result<Self, TransportBuildError> {
        let endpoint = parse_endpoint(&config.endpoint)?;
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(TransportBuildError::HttpClient)?;
        Ok(Self { client, endpoint })
    }

    /// Endpoint queries are posted to.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn convert_reqwest_error(&self, error: &reqwest::Error, timeout: Duration) -> TransportError {
        let url = self.endpoint.to_string();
        if error.is_timeout() {
            return TransportError::Timeout {
                url,
                timeout_secs: timeout.as_secs(),
            };
        }

        if let Some(status) = error.status() {
            return TransportError::Http {
                url,
                status: status.as_u16(),
                message: error.to_string(),
            };
        }

        TransportError::Network {
            url,
            message: error.to_string(),
        }
    }
}

#[async_trait]
impl OverpassTransport for HttpOverpassTransport {
    async fn post(&self, query: &str, timeout: Duration) -> Result<String, TransportError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .timeout(timeout)
            .form(&[("data", query)])
            .send()
            .await
            .map_err(|err| self.convert_reqwest_error(&err, timeout))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| self.convert_reqwest_error(&err, timeout))?;

        if !status.is_success() {
            return Err(TransportError::Http {
                url: self.endpoint.to_string(),
                status: status.as_u16(),
                message: excerpt(&body),
            });
        }
        Ok(body)
    }
}

fn parse_endpoint(raw: &str) -> Result<Url, TransportBuildError> {
    let invalid = |reason: String| TransportBuildError::InvalidEndpoint {
        endpoint: raw.to_owned(),
        reason,
    };
    let url = Url::parse(raw).map_err(|err| invalid(err.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme '{other}'"))),
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => trimmed.get(..cut).unwrap_or(trimmed).to_owned() + "…",
        None => trimmed.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://overpass-api.de/api/interpreter")]
    #[case("http://localhost:12345/api/interpreter")]
    fn accepts_http_endpoints(#[case] endpoint: &str) {
        let transport = HttpOverpassTransport::new(endpoint).expect("valid endpoint");
        assert_eq!(transport.endpoint().as_str(), endpoint);
    }

    #[rstest]
    #[case("not a url")]
    #[case("ftp://overpass.test/api")]
    #[case("")]
    fn rejects_invalid_endpoints(#[case] endpoint: &str) {
        let err = HttpOverpassTransport::new(endpoint).expect_err("invalid endpoint");
        assert!(matches!(err, TransportBuildError::InvalidEndpoint { .. }));
    }

    #[rstest]
    fn config_builders_apply() {
        let config = HttpTransportConfig::new("https://overpass.test/api/interpreter")
            .with_user_agent("tests/1.0")
            .with_connect_timeout(Duration::from_secs(3));
        assert_eq!(config.user_agent, "tests/1.0");
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(HttpTransportConfig::default().endpoint, DEFAULT_ENDPOINT);
    }

    #[rstest]
    fn long_error_bodies_are_truncated() {
        let body = "x".repeat(MAX_ERROR_BODY_CHARS + 50);
        let short = excerpt(&body);
        assert_eq!(short.chars().count(), MAX_ERROR_BODY_CHARS + 1);
        assert!(short.ends_with('…'));
        assert_eq!(excerpt("  busy \n"), "busy");
    }
}
