//! Error types shared by the query, session and request layers

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, CrmError>;

/// Everything that can go wrong between building a query and reading the reply
#[derive(Debug, Error)]
pub enum CrmError {
    /// Required environment variables are missing (all of them are listed)
    #[error("Missing environment variables: {}", .missing.join(", "))]
    Config { missing: Vec<String> },

    /// An environment variable is present but cannot be used
    #[error("Invalid value for {key}: {message}")]
    InvalidConfig { key: String, message: String },

    /// No usable session could be produced; the caller needs an interactive login
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Network level failure
    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The request did not complete within the configured timeout
    #[error("Request timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    /// The server answered with a status the caller does not accept
    #[error("Request failed with status {status}: {body}")]
    StatusPolicy { status: u16, body: String },

    /// The response body did not have the expected shape
    #[error("Unexpected response shape: {message}")]
    Validation { message: String, payload: String },

    /// The query tree was misused (programmer error)
    #[error("Invalid query: {0}")]
    Query(String),

    /// Reading or writing a local file failed
    #[error("Failed to access {}: {source}", .path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// The subject label is not present in the lookup table
    #[error("Unknown subject '{0}'")]
    UnknownSubject(String),
}

impl CrmError {
    /// Classify a reqwest failure, keeping timeouts distinct from other transport errors
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err)
        } else {
            Self::Transport(err)
        }
    }

    /// True when the failure means an interactive login is needed
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// HTTP status carried by a status policy violation
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::StatusPolicy { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_lists_every_key() {
        let err = CrmError::Config {
            missing: vec!["BASE_URL".into(), "COOPCRM_PASSWORD".into()],
        };
        assert_eq!(
            err.to_string(),
            "Missing environment variables: BASE_URL, COOPCRM_PASSWORD"
        );
    }

    #[test]
    fn test_status_policy_carries_status_and_body() {
        let err = CrmError::StatusPolicy {
            status: 409,
            body: "duplicate".into(),
        };
        assert_eq!(err.status(), Some(409));
        assert!(err.to_string().contains("409"));
        assert!(err.to_string().contains("duplicate"));
        assert!(!err.is_auth());
    }
}
