//! File system paths used by Beacon.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Name of the base directory under the user's home.
const BASE_DIR_NAME: &str = ".beacon";

/// Manages file system paths for Beacon.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for runtime files (~/.beacon)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.beacon`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir().ok_or(CoreError::NoHomeDir)?;

        Ok(Self {
            base_dir: home.join(BASE_DIR_NAME),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.beacon).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.beacon/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the durable storage directory (~/.beacon/storage).
    ///
    /// Each storage key is one file inside this directory.
    pub fn storage_dir(&self) -> PathBuf {
        self.base_dir.join("storage")
    }

    /// Get the logs directory (~/.beacon/logs).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Get the JSONL log file path (~/.beacon/logs/beacon.jsonl).
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("beacon.jsonl")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.storage_dir())?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_paths_with_base_dir() {
        let base = PathBuf::from("/tmp/test-beacon");
        let paths = Paths::with_base_dir(base.clone());

        assert_eq!(paths.base_dir(), &base);
        assert_eq!(paths.config_file(), base.join("config.json"));
        assert_eq!(paths.storage_dir(), base.join("storage"));
        assert_eq!(paths.logs_dir(), base.join("logs"));
        assert_eq!(paths.log_file(), base.join("logs/beacon.jsonl"));
    }

    #[test]
    fn test_paths_default_under_home() {
        let paths = Paths::new().unwrap();
        let home = dirs::home_dir().unwrap();

        assert_eq!(paths.base_dir(), &home.join(".beacon"));
    }

    #[test]
    fn test_ensure_dirs_creates_directories() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("beacon");
        let paths = Paths::with_base_dir(base.clone());

        assert!(!base.exists());

        paths.ensure_dirs().unwrap();
        // Idempotent
        paths.ensure_dirs().unwrap();

        assert!(base.is_dir());
        assert!(paths.storage_dir().is_dir());
        assert!(paths.logs_dir().is_dir());
    }
}
