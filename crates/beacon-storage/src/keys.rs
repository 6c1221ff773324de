//! Storage key constants.

/// Storage keys used by Beacon.
pub struct StorageKeys;

impl StorageKeys {
    /// Collector API key
    pub const API_KEY: &'static str = "api_key";

    /// Session identifier sent as the user id header
    pub const SESSION_ID: &'static str = "session_id";

    /// User identifier sent as the user id header (optional)
    pub const USER_ID: &'static str = "user_id";

    /// Default key for the unsent events array (JSON)
    pub const UNSENT_EVENTS: &'static str = "unsent_events";
}
