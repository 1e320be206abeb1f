//! HTTP client for the accrual processor

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode, Url};
use thiserror::Error;
use tracing::{debug, warn};

use super::outcome::{classify, PollOutcome};
use crate::core::traits::AccrualSource;

/// Failure to build an [`AccrualClient`]
#[derive(Debug, Error)]
pub enum AccrualClientError {
    /// The base address cannot have path segments appended to it
    #[error("Invalid accrual system address '{url}'")]
    InvalidBaseUrl {
        /// The rejected address
        url: String,
    },

    /// The underlying HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Polls `GET {base}/api/orders/{number}` on the accrual processor
///
/// Each poll is a single request bounded by the client timeout; retries
/// are left to the reconciliation worker's next cycle.
#[derive(Debug, Clone)]
pub struct AccrualClient {
    http: Client,
    base_url: Url,
    default_retry_after: Duration,
}

impl AccrualClient {
    /// Create a client for the processor at `base_url`
    ///
    /// # Arguments
    ///
    /// * `base_url` - Processor root, e.g. `http://localhost:8080`
    /// * `timeout` - Upper bound for one request, connect included
    /// * `default_retry_after` - Backoff applied when a `429` carries no usable `Retry-After`
    ///
    /// # Errors
    ///
    /// Returns `InvalidBaseUrl` for addresses such as `mailto:` that cannot
    /// carry a path, and `Http` if the TLS backend fails to initialise.
    pub fn new(
        base_url: Url,
        timeout: Duration,
        default_retry_after: Duration,
    ) -> Result<Self, AccrualClientError> {
        if base_url.cannot_be_a_base() {
            return Err(AccrualClientError::InvalidBaseUrl {
                url: base_url.to_string(),
            });
        }

        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url,
            default_retry_after,
        })
    }

    /// Address polled for `number`
    ///
    /// The number is appended as a single percent-encoded path segment, so
    /// it can never escape `/api/orders/`.
    pub fn order_url(&self, number: &str) -> Option<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .extend(["api", "orders", number]);
        Some(url)
    }
}

#[async_trait]
impl AccrualSource for AccrualClient {
    async fn poll(&self, number: &str) -> PollOutcome {
        let Some(url) = self.order_url(number) else {
            return PollOutcome::transient(format!("cannot build url for order {number}"));
        };

        let response = match self.http.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(order = number, error = %e, "accrual request failed");
                return PollOutcome::transient(format!("request failed: {e}"));
            }
        };

        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let body = if status == StatusCode::OK {
            match response.bytes().await {
                Ok(bytes) => bytes.to_vec(),
                Err(e) => {
                    warn!(order = number, error = %e, "failed to read accrual response");
                    return PollOutcome::transient(format!("failed to read body: {e}"));
                }
            }
        } else {
            Vec::new()
        };

        let outcome = classify(
            number,
            status,
            retry_after.as_deref(),
            &body,
            self.default_retry_after,
        );

        match &outcome {
            PollOutcome::Accepted { status, accrual } => {
                debug!(order = number, %status, %accrual, "accrual result received");
            }
            PollOutcome::Unknown => debug!(order = number, "order unknown to accrual system"),
            PollOutcome::Throttled { retry_after } => warn!(
                order = number,
                retry_after_secs = retry_after.as_secs(),
                "accrual system throttled polling"
            ),
            PollOutcome::TransientError { reason } => {
                warn!(order = number, %reason, "accrual poll failed");
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AccrualStatus;
    use rust_decimal::Decimal;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer, timeout: Duration) -> AccrualClient {
        let base = Url::parse(&server.uri()).unwrap();
        AccrualClient::new(base, timeout, Duration::from_secs(30)).unwrap()
    }

    #[tokio::test]
    async fn test_poll_processed_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/orders/12345678903"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "order": "12345678903",
                "status": "PROCESSED",
                "accrual": 500
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(5)).await;
        let outcome = client.poll("12345678903").await;

        assert_eq!(
            outcome,
            PollOutcome::Accepted {
                status: AccrualStatus::Processed,
                accrual: Decimal::new(500, 0),
            }
        );
    }

    #[tokio::test]
    async fn test_poll_no_content_is_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/orders/42"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(5)).await;

        assert_eq!(client.poll("42").await, PollOutcome::Unknown);
    }

    #[tokio::test]
    async fn test_poll_throttled_reads_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/orders/42"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "60"))
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(5)).await;

        assert_eq!(
            client.poll("42").await,
            PollOutcome::Throttled {
                retry_after: Duration::from_secs(60)
            }
        );
    }

    #[tokio::test]
    async fn test_poll_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(5)).await;

        assert!(matches!(
            client.poll("42").await,
            PollOutcome::TransientError { .. }
        ));
    }

    #[tokio::test]
    async fn test_poll_timeout_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"order": "42", "status": "PROCESSED"}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_millis(50)).await;

        assert!(matches!(
            client.poll("42").await,
            PollOutcome::TransientError { .. }
        ));
    }

    #[tokio::test]
    async fn test_poll_unreachable_is_transient() {
        let server = MockServer::start().await;
        let client = client_for(&server, Duration::from_secs(1)).await;
        drop(server);

        assert!(matches!(
            client.poll("42").await,
            PollOutcome::TransientError { .. }
        ));
    }

    #[test]
    fn test_order_url_handles_trailing_slash_and_encoding() {
        let with_slash = AccrualClient::new(
            Url::parse("http://accrual.local:8080/").unwrap(),
            Duration::from_secs(1),
            Duration::from_secs(30),
        )
        .unwrap();
        let prefixed = AccrualClient::new(
            Url::parse("http://accrual.local/v1").unwrap(),
            Duration::from_secs(1),
            Duration::from_secs(30),
        )
        .unwrap();

        assert_eq!(
            with_slash.order_url("123").unwrap().as_str(),
            "http://accrual.local:8080/api/orders/123"
        );
        assert_eq!(
            prefixed.order_url("1/2").unwrap().as_str(),
            "http://accrual.local/v1/api/orders/1%2F2"
        );
    }

    #[test]
    fn test_rejects_address_without_path() {
        let result = AccrualClient::new(
            Url::parse("mailto:ops@example.com").unwrap(),
            Duration::from_secs(1),
            Duration::from_secs(30),
        );

        assert!(matches!(
            result,
            Err(AccrualClientError::InvalidBaseUrl { .. })
        ));
    }
}
