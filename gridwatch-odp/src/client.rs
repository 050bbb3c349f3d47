//! Client for the portal's records endpoint.
//!
//! ## Example
//!
//! ```rust,no_run
//! use gridwatch_odp::{FetchQuery, OdpClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = OdpClient::builder()
//!         .api_key(std::env::var("ODP_API_KEY")?)
//!         .build()?;
//!
//!     let batch = client
//!         .fetch_with_retry(&FetchQuery::new().der_name("Wissington"))
//!         .await?;
//!
//!     for record in &batch.records {
//!         println!("{} {}", record.timestamp, record.label());
//!     }
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::retry::BackoffPolicy;
use crate::{decode_response, Batch, FetchError, FetchQuery, RetryPolicy};

/// Records endpoint of the real-time constraint meter readings dataset.
pub const DEFAULT_ENDPOINT: &str = "https://ukpowernetworks.opendatasoft.com/api/explore/v2.1/catalog/datasets/ukpn-constraints-real-time-meter-readings/records";

/// Largest page the records endpoint serves.
pub const DEFAULT_LIMIT: u32 = 100;

/// Authenticated client for constraint records.
#[derive(Clone)]
pub struct OdpClient {
    client: Client,
    endpoint: String,
    api_key: String,
    limit: u32,
    retry: RetryPolicy,
}

impl fmt::Debug for OdpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OdpClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("limit", &self.limit)
            .field("retry", &self.retry)
            .finish()
    }
}

impl OdpClient {
    /// Create a new builder for configuring the client.
    pub fn builder() -> OdpClientBuilder {
        OdpClientBuilder::default()
    }

    /// The endpoint requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetch one batch of records with a single request.
    pub async fn fetch(&self, query: &FetchQuery) -> Result<Batch, FetchError> {
        let mut params = vec![("apikey", self.api_key.clone())];
        params.extend(query.params(self.limit));

        debug!(endpoint = %self.endpoint, ?query, "fetching constraint records");

        let response = self.client.get(&self.endpoint).query(&params).send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Authentication(format!(
                "API key rejected ({})",
                status
            )));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Http {
                status: status.as_u16(),
                message: truncate(&body, 200),
            });
        }

        let body = response.bytes().await?;
        decode_response(&body)
    }

    /// Fetch a batch, retrying transient failures per the retry policy.
    ///
    /// Authentication, schema and non-retryable HTTP errors are returned
    /// immediately.
    pub async fn fetch_with_retry(&self, query: &FetchQuery) -> Result<Batch, FetchError> {
        let attempts = self.retry.attempts();
        let mut attempt = 1;

        loop {
            match self.fetch(query).await {
                Ok(batch) => return Ok(batch),
                Err(error) if error.is_transient() && attempt < attempts => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "transient fetch failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

/// Builder for OdpClient.
#[derive(Debug, Default)]
pub struct OdpClientBuilder {
    endpoint: Option<String>,
    api_key: Option<String>,
    timeout: Option<Duration>,
    limit: Option<u32>,
    retry: Option<RetryPolicy>,
}

impl OdpClientBuilder {
    /// Set the records endpoint (default: the real-time meter readings dataset).
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the portal API key.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the default page size (default: 100).
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the retry policy used by `fetch_with_retry`.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Build the client.
    ///
    /// Fails with [`FetchError::Configuration`] if no API key was given or
    /// the HTTP client cannot be created.
    pub fn build(self) -> Result<OdpClient, FetchError> {
        let api_key = self
            .api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| FetchError::Configuration("API key is required".to_string()))?;

        let timeout = self.timeout.unwrap_or(Duration::from_secs(10));

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| FetchError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(OdpClient {
            client,
            endpoint: self.endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            api_key,
            limit: self.limit.unwrap_or(DEFAULT_LIMIT),
            retry: self.retry.unwrap_or_default(),
        })
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockResponse, MockServer};

    const SCENARIO: &str = r#"[{"id":1,"ts":"2024-01-01T00:00:00Z","type":"thermal","value":12.5}]"#;

    fn client_for(server: &MockServer) -> OdpClient {
        OdpClient::builder()
            .endpoint(server.url())
            .api_key("abc123")
            .timeout(Duration::from_millis(500))
            .retry(RetryPolicy {
                max_attempts: 3,
                base_backoff: Duration::from_millis(10),
            })
            .build()
            .unwrap()
    }

    fn records_json(n: usize) -> String {
        let records: Vec<String> = (0..n)
            .map(|i| {
                format!(
                    r#"{{"id":{},"ts":"2024-01-01T00:{:02}:00Z","type":"thermal","value":{}}}"#,
                    i,
                    i,
                    i as f64 * 0.5
                )
            })
            .collect();
        format!("[{}]", records.join(","))
    }

    #[test]
    fn test_builder_defaults() {
        let client = OdpClient::builder().api_key("key").build().unwrap();
        assert_eq!(client.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(client.limit, DEFAULT_LIMIT);
        assert_eq!(client.retry, RetryPolicy::default());
    }

    #[test]
    fn test_builder_requires_key() {
        let err = OdpClient::builder().build().unwrap_err();
        assert!(matches!(err, FetchError::Configuration(_)));

        let err = OdpClient::builder().api_key("   ").build().unwrap_err();
        assert!(matches!(err, FetchError::Configuration(_)));
    }

    #[test]
    fn test_debug_redacts_key() {
        let client = OdpClient::builder().api_key("abc123").build().unwrap();
        let debug = format!("{:?}", client);
        assert!(!debug.contains("abc123"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc…");
    }

    #[tokio::test]
    async fn test_fetch_scenario() {
        let server = MockServer::start(vec![MockResponse::ok(SCENARIO)]).await.unwrap();
        let batch = client_for(&server).fetch(&FetchQuery::new()).await.unwrap();

        assert_eq!(batch.len(), 1);
        assert_eq!(batch.records[0].label(), "thermal, 12.5");

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].starts_with("GET /records?"));
        assert!(requests[0].contains("apikey=abc123"));
        assert!(requests[0].contains("limit=100"));
    }

    #[tokio::test]
    async fn test_fetch_preserves_order() {
        let server = MockServer::start(vec![MockResponse::ok(records_json(25))]).await.unwrap();
        let batch = client_for(&server).fetch(&FetchQuery::new()).await.unwrap();

        assert_eq!(batch.len(), 25);
        for (i, record) in batch.records.iter().enumerate() {
            assert_eq!(record.id, i.to_string());
        }
    }

    #[tokio::test]
    async fn test_fetch_empty() {
        let server = MockServer::start(vec![MockResponse::ok(r#"{"total_count":0,"results":[]}"#)])
            .await
            .unwrap();
        let batch = client_for(&server).fetch(&FetchQuery::new()).await.unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_sends_filters() {
        let server = MockServer::start(vec![MockResponse::ok("[]")]).await.unwrap();
        let query = FetchQuery::new().der_name("Wissington").limit(5);
        client_for(&server).fetch(&query).await.unwrap();

        let request = &server.requests()[0];
        assert!(request.contains("limit=5"));
        assert!(request.contains("refine=der_name%3AWissington"));
    }

    #[tokio::test]
    async fn test_rejected_key_is_authentication_error() {
        let server = MockServer::start(vec![MockResponse::status(401)]).await.unwrap();
        let err = client_for(&server).fetch_with_retry(&FetchQuery::new()).await.unwrap_err();

        assert!(matches!(err, FetchError::Authentication(_)));
        // Never retried
        assert_eq!(server.request_count(), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_transient() {
        let server = MockServer::start(vec![MockResponse::Hang(Duration::from_secs(5))])
            .await
            .unwrap();
        let err = client_for(&server).fetch(&FetchQuery::new()).await.unwrap_err();

        assert!(matches!(err, FetchError::Timeout));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_retry_recovers_from_server_error() {
        let server = MockServer::start(vec![
            MockResponse::status(503),
            MockResponse::status(503),
            MockResponse::ok(SCENARIO),
        ])
        .await
        .unwrap();

        let batch = client_for(&server).fetch_with_retry(&FetchQuery::new()).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(server.request_count(), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let server = MockServer::start(vec![MockResponse::status(500)]).await.unwrap();
        let err = client_for(&server).fetch_with_retry(&FetchQuery::new()).await.unwrap_err();

        assert!(matches!(err, FetchError::Http { status: 500, .. }));
        assert_eq!(server.request_count(), 3);
    }

    #[tokio::test]
    async fn test_bad_request_not_retried() {
        let server = MockServer::start(vec![MockResponse::status(400)]).await.unwrap();
        let err = client_for(&server).fetch_with_retry(&FetchQuery::new()).await.unwrap_err();

        assert!(matches!(err, FetchError::Http { status: 400, .. }));
        assert_eq!(server.request_count(), 1);
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = OdpClient::builder()
            .endpoint(format!("http://{}/records", addr))
            .api_key("abc123")
            .retry(RetryPolicy::none())
            .build()
            .unwrap();

        let err = client.fetch_with_retry(&FetchQuery::new()).await.unwrap_err();
        assert!(matches!(err, FetchError::Connection(_)));
    }

    #[tokio::test]
    async fn test_unparseable_body_is_schema_error() {
        let server = MockServer::start(vec![MockResponse::ok("not json")]).await.unwrap();
        let err = client_for(&server).fetch(&FetchQuery::new()).await.unwrap_err();
        assert!(matches!(err, FetchError::Schema(_)));
    }
}
