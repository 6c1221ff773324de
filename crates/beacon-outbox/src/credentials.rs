//! Credential collaborators.

use beacon_storage::{CredentialStore, StorageResult};
use tracing::warn;

/// API key and session identifier attached to a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub session_id: Option<String>,
}

/// Source of the credentials gating `track` and authorizing deliveries.
pub trait CredentialProvider: Send + Sync {
    fn api_key(&self) -> Option<String>;

    fn session_id(&self) -> Option<String>;

    /// Optional user identifier, preferred over the session id in the
    /// `X-User-Id` header when present.
    fn user_id(&self) -> Option<String> {
        None
    }

    /// Current credentials, if an API key is available.
    fn credentials(&self) -> Option<Credentials> {
        let api_key = self.api_key()?;
        Some(Credentials {
            api_key,
            session_id: self.session_id(),
        })
    }

    /// Both an API key and a session identifier are present.
    fn is_authorized(&self) -> bool {
        self.api_key().is_some() && self.session_id().is_some()
    }
}

/// Fixed credentials, for hosts that inject them at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    api_key: Option<String>,
    session_id: Option<String>,
    user_id: Option<String>,
}

impl StaticCredentials {
    pub fn new(api_key: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            session_id: Some(session_id.into()),
            user_id: None,
        }
    }

    /// Credentials that never authorize anything.
    pub fn unauthorized() -> Self {
        Self::default()
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

impl CredentialProvider for StaticCredentials {
    fn api_key(&self) -> Option<String> {
        self.api_key.clone()
    }

    fn session_id(&self) -> Option<String> {
        self.session_id.clone()
    }

    fn user_id(&self) -> Option<String> {
        self.user_id.clone()
    }
}

impl CredentialProvider for CredentialStore {
    fn api_key(&self) -> Option<String> {
        absorb("api_key", self.get_api_key())
    }

    fn session_id(&self) -> Option<String> {
        absorb("session_id", self.get_session_id())
    }

    fn user_id(&self) -> Option<String> {
        absorb("user_id", self.get_user_id())
    }
}

fn absorb(field: &'static str, result: StorageResult<Option<String>>) -> Option<String> {
    match result {
        Ok(value) => value,
        Err(err) => {
            warn!(field, error = %err, "Failed to read credential, treating as absent");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_storage::MemoryStore;
    use std::sync::Arc;

    #[test]
    fn static_credentials_authorize() {
        let creds = StaticCredentials::new("key", "session");
        assert!(creds.is_authorized());
        assert_eq!(
            creds.credentials(),
            Some(Credentials {
                api_key: "key".into(),
                session_id: Some("session".into()),
            })
        );
        assert!(!StaticCredentials::unauthorized().is_authorized());
        assert_eq!(StaticCredentials::unauthorized().credentials(), None);
    }

    #[test]
    fn credential_store_requires_both_values() {
        let backend = Arc::new(MemoryStore::new());
        let store = CredentialStore::new(backend.clone());
        assert!(!store.is_authorized());

        store.set_api_key("key").unwrap();
        assert!(!store.is_authorized());

        store.set_session_id("session").unwrap();
        assert!(store.is_authorized());
        assert_eq!(CredentialProvider::user_id(&store), None);
    }

    #[test]
    fn credential_store_outage_is_unauthorized() {
        let backend = Arc::new(MemoryStore::new());
        let store = CredentialStore::new(backend.clone());
        store.set_api_key("key").unwrap();
        store.set_session_id("session").unwrap();

        backend.set_unavailable(true);
        assert!(!store.is_authorized());
        assert_eq!(store.credentials(), None);
    }
}
