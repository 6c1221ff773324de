//! Client metadata attached to every delivery.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Placeholder for metadata fields that could not be determined.
pub const UNKNOWN: &str = "unknown";

/// Geographic coordinates. Both are `None` when the lookup was denied or timed out.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
        }
    }

    /// Null coordinates.
    pub fn unknown() -> Self {
        Self::default()
    }
}

/// Best-effort description of the client runtime.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClientMetadata {
    pub user_agent: Option<String>,
    pub platform: Option<String>,
    pub device_class: Option<String>,
    pub timezone: Option<String>,
    pub location: Option<Location>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HeaderPayload<'a> {
    user_agent: &'a str,
    platform: &'a str,
    device_class: &'a str,
    timezone: &'a str,
    location: Location,
}

impl ClientMetadata {
    /// JSON value of the `X-Client-Metadata` header.
    ///
    /// Missing fields are sent as `"unknown"`, a missing location as null
    /// coordinates. Non-ASCII characters are escaped as `\uXXXX` so the value
    /// is always a legal header.
    pub fn to_header_value(&self) -> String {
        let payload = HeaderPayload {
            user_agent: self.user_agent.as_deref().unwrap_or(UNKNOWN),
            platform: self.platform.as_deref().unwrap_or(UNKNOWN),
            device_class: self.device_class.as_deref().unwrap_or(UNKNOWN),
            timezone: self.timezone.as_deref().unwrap_or(UNKNOWN),
            location: self.location.unwrap_or_default(),
        };
        // Serializing plain strings and options cannot fail.
        let json = serde_json::to_string(&payload).unwrap_or_else(|_| "{}".to_string());
        escape_non_ascii(&json)
    }
}

fn escape_non_ascii(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for ch in json.chars() {
        if ch.is_ascii() {
            out.push(ch);
        } else {
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}

/// Gathers metadata for a delivery. Must not fail; unknown fields stay `None`.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn collect(&self) -> ClientMetadata;
}

/// Geolocation lookup. `None` means denied or unavailable.
#[async_trait]
pub trait LocationSource: Send + Sync {
    async fn locate(&self) -> Option<Location>;
}

/// Location source for hosts without geolocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

#[async_trait]
impl LocationSource for NoLocation {
    async fn locate(&self) -> Option<Location> {
        None
    }
}

/// Metadata derived from the running process.
pub struct SystemMetadataProvider {
    user_agent: String,
    location: Arc<dyn LocationSource>,
    location_timeout: Duration,
}

impl SystemMetadataProvider {
    pub fn new(location: Arc<dyn LocationSource>, location_timeout: Duration) -> Self {
        Self {
            user_agent: format!("beacon/{}", env!("CARGO_PKG_VERSION")),
            location,
            location_timeout,
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl Default for SystemMetadataProvider {
    fn default() -> Self {
        Self::new(Arc::new(NoLocation), Duration::from_millis(3_000))
    }
}

#[async_trait]
impl MetadataProvider for SystemMetadataProvider {
    async fn collect(&self) -> ClientMetadata {
        let location = match tokio::time::timeout(self.location_timeout, self.location.locate()).await {
            Ok(Some(location)) => location,
            Ok(None) => Location::unknown(),
            Err(_) => {
                debug!(timeout_ms = self.location_timeout.as_millis() as u64, "Location lookup timed out");
                Location::unknown()
            }
        };

        ClientMetadata {
            user_agent: Some(self.user_agent.clone()),
            platform: platform_name(std::env::consts::OS).map(str::to_string),
            device_class: Some(device_class(std::env::consts::OS).to_string()),
            timezone: Some(chrono::Local::now().format("%:z").to_string()),
            location: Some(location),
        }
    }
}

fn platform_name(os: &str) -> Option<&'static str> {
    match os {
        "windows" => Some("Windows"),
        "macos" => Some("macOS"),
        "linux" => Some("Linux"),
        "android" => Some("Android"),
        "ios" => Some("iOS"),
        _ => None,
    }
}

fn device_class(os: &str) -> &'static str {
    match os {
        "android" | "ios" => "mobile",
        _ => "desktop",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    struct SlowLocation;

    #[async_trait]
    impl LocationSource for SlowLocation {
        async fn locate(&self) -> Option<Location> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Some(Location::new(1.0, 2.0))
        }
    }

    struct FixedLocation;

    #[async_trait]
    impl LocationSource for FixedLocation {
        async fn locate(&self) -> Option<Location> {
            Some(Location::new(52.52, 13.4))
        }
    }

    #[test]
    fn header_fills_unknown_fields() {
        let header = ClientMetadata::default().to_header_value();
        let value: Value = serde_json::from_str(&header).unwrap();
        assert_eq!(
            value,
            json!({
                "userAgent": "unknown",
                "platform": "unknown",
                "deviceClass": "unknown",
                "timezone": "unknown",
                "location": {"latitude": null, "longitude": null}
            })
        );
    }

    #[test]
    fn header_is_ascii() {
        let metadata = ClientMetadata {
            user_agent: Some("Navigateur Déjà 🚀".into()),
            ..Default::default()
        };
        let header = metadata.to_header_value();
        assert!(header.is_ascii());

        let value: Value = serde_json::from_str(&header).unwrap();
        assert_eq!(value["userAgent"], json!("Navigateur Déjà 🚀"));
    }

    #[test]
    fn classifies_platforms() {
        assert_eq!(platform_name("macos"), Some("macOS"));
        assert_eq!(platform_name("plan9"), None);
        assert_eq!(device_class("ios"), "mobile");
        assert_eq!(device_class("linux"), "desktop");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_location_yields_null_coordinates() {
        let provider = SystemMetadataProvider::new(Arc::new(SlowLocation), Duration::from_millis(3_000));
        let metadata = provider.collect().await;
        assert_eq!(metadata.location, Some(Location::unknown()));
        assert!(metadata.user_agent.unwrap().starts_with("beacon/"));
    }

    #[tokio::test]
    async fn location_is_collected() {
        let provider = SystemMetadataProvider::new(Arc::new(FixedLocation), Duration::from_millis(3_000))
            .with_user_agent("test-agent");
        let metadata = provider.collect().await;
        assert_eq!(metadata.location, Some(Location::new(52.52, 13.4)));
        assert_eq!(metadata.user_agent.as_deref(), Some("test-agent"));
        assert!(metadata.timezone.is_some());
    }
}
