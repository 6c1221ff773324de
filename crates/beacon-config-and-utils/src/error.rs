//! Errors raised while locating and loading Beacon's settings.

use thiserror::Error;

/// Failure to resolve `~/.beacon`, read `config.json`, or accept its values.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A setting is out of the range the pipeline accepts
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    /// Reading or writing under the base directory failed
    #[error("Filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid collector URL: {0}")]
    CollectorUrl(#[from] url::ParseError),

    /// `config.json` exists but does not parse
    #[error("Malformed config file: {0}")]
    ConfigFile(#[from] serde_json::Error),

    /// No home directory to place `~/.beacon` under; pass a base directory instead
    #[error("Could not determine home directory")]
    NoHomeDir,
}

/// Result type alias using CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_url_error_names_the_setting() {
        let err: CoreError = url::Url::parse("::not a url").unwrap_err().into();
        assert!(matches!(err, CoreError::CollectorUrl(_)));
        assert!(err.to_string().starts_with("Invalid collector URL:"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: CoreError = io.into();
        assert_eq!(err.to_string(), "Filesystem error: read-only");
    }
}
