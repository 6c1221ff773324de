//! Collector client for HTTP delivery.

use crate::{ClientMetadata, Event, OutboxError, OutboxResult, UNKNOWN};
use async_trait::async_trait;
use beacon_config_and_utils::{Config, DEFAULT_COLLECTOR_URL};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;
use uuid::Uuid;

/// Sender configuration.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Base URL of the collector.
    pub collector_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            collector_url: DEFAULT_COLLECTOR_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

impl SenderConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            collector_url: config.collector_url.clone(),
            timeout_secs: config.request_timeout_secs,
        }
    }
}

/// One delivery attempt: a batch plus everything needed to authorize it.
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    pub batch_id: Uuid,
    pub events: Vec<Event>,
    pub api_key: String,
    pub user_id: Option<String>,
    pub metadata: ClientMetadata,
}

/// Collector answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryResponse {
    pub status: u16,
}

impl DeliveryResponse {
    pub fn new(status: u16) -> Self {
        Self { status }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Network sink for batches.
///
/// `Err` means the exchange never produced a status (transport failure or an
/// unbuildable request). Any status, successful or not, is returned as `Ok`.
#[async_trait]
pub trait CollectorClient: Send + Sync {
    async fn deliver(&self, request: &DeliveryRequest) -> OutboxResult<DeliveryResponse>;
}

/// Collector client posting JSON arrays over HTTPS.
pub struct HttpCollectorClient {
    endpoint: Url,
    client: Client,
}

impl HttpCollectorClient {
    /// Create a new client.
    pub fn new(config: SenderConfig) -> OutboxResult<Self> {
        let endpoint = events_endpoint(&config.collector_url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl CollectorClient for HttpCollectorClient {
    async fn deliver(&self, request: &DeliveryRequest) -> OutboxResult<DeliveryResponse> {
        debug!(
            url = %self.endpoint,
            batch_id = %request.batch_id,
            events = request.events.len(),
            "Sending batch"
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .header("Authorization", &request.api_key)
            .header("X-User-Id", request.user_id.as_deref().unwrap_or(UNKNOWN))
            .header("X-Client-Metadata", request.metadata.to_header_value())
            .header("X-Batch-Id", request.batch_id.to_string())
            .header("Content-Type", "application/json")
            .json(&request.events)
            .send()
            .await?;

        Ok(DeliveryResponse::new(response.status().as_u16()))
    }
}

/// `{base}/events`, tolerating a trailing slash on the base.
fn events_endpoint(base: &str) -> OutboxResult<Url> {
    let joined = format!("{}/events", base.trim().trim_end_matches('/'));
    let url = Url::parse(&joined)
        .map_err(|e| OutboxError::Request(format!("invalid collector URL {:?}: {}", base, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(OutboxError::Request(format!(
            "unsupported collector URL scheme: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_config_default() {
        let config = SenderConfig::default();
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.collector_url, DEFAULT_COLLECTOR_URL);
    }

    #[test]
    fn test_sender_config_from_config() {
        let mut config = Config::default();
        config.collector_url = "http://localhost:8080".into();
        config.request_timeout_secs = 5;

        let sender = SenderConfig::from_config(&config);
        assert_eq!(sender.collector_url, "http://localhost:8080");
        assert_eq!(sender.timeout_secs, 5);
    }

    #[test]
    fn test_events_endpoint() {
        assert_eq!(
            events_endpoint("https://collector.example.com").unwrap().as_str(),
            "https://collector.example.com/events"
        );
        assert_eq!(
            events_endpoint("https://collector.example.com/v1/").unwrap().as_str(),
            "https://collector.example.com/v1/events"
        );
        assert!(matches!(events_endpoint("not a url"), Err(OutboxError::Request(_))));
        assert!(matches!(
            events_endpoint("ftp://collector.example.com"),
            Err(OutboxError::Request(_))
        ));
    }

    #[test]
    fn test_response_success_range() {
        assert!(DeliveryResponse::new(200).is_success());
        assert!(DeliveryResponse::new(204).is_success());
        assert!(!DeliveryResponse::new(199).is_success());
        assert!(!DeliveryResponse::new(301).is_success());
        assert!(!DeliveryResponse::new(500).is_success());
    }

    #[test]
    fn test_http_client_rejects_bad_url() {
        let config = SenderConfig {
            collector_url: "::::".into(),
            timeout_secs: 1,
        };
        assert!(HttpCollectorClient::new(config).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_collector_is_transport_error() {
        let client = HttpCollectorClient::new(SenderConfig {
            collector_url: "http://127.0.0.1:9".into(),
            timeout_secs: 2,
        })
        .unwrap();
        assert_eq!(client.endpoint().as_str(), "http://127.0.0.1:9/events");

        let request = DeliveryRequest {
            batch_id: Uuid::new_v4(),
            events: vec![],
            api_key: "key".into(),
            user_id: None,
            metadata: ClientMetadata::default(),
        };
        assert!(matches!(client.deliver(&request).await, Err(OutboxError::Http(_))));
    }
}
