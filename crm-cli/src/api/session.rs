//! Session cookie storage
//!
//! The cookies captured after an interactive sign-in are kept in a
//! [`SessionStore`] and persisted as JSON so later runs can reuse them until
//! the primary auth cookie is about to expire.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CrmError, Result};

/// Cookie that carries the authenticated session
pub const PRIMARY_TOKEN: &str = "CrmOwinAuth";

/// Cookies worth keeping after sign-in
pub const SESSION_COOKIES: [&str; 4] = ["orgId", "ReqClientId", PRIMARY_TOKEN, "ARRAffinity"];

/// A session is only used while the primary token outlives this many seconds
pub const EXPIRY_BUFFER_SECS: f64 = 300.0;

/// One cookie
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionToken {
    pub name: String,
    pub value: String,
    /// Unix timestamp in seconds
    #[serde(default)]
    pub expires: Option<f64>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default = "default_path")]
    pub path: Option<String>,
}

fn default_path() -> Option<String> {
    Some("/".to_string())
}

impl SessionToken {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            expires: None,
            domain: None,
            path: default_path(),
        }
    }

    pub fn expires(mut self, expires: f64) -> Self {
        self.expires = Some(expires);
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }
}

/// Cookies by name
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionStore {
    tokens: HashMap<String, SessionToken>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tokens(tokens: impl IntoIterator<Item = SessionToken>) -> Self {
        Self {
            tokens: tokens
                .into_iter()
                .map(|token| (token.name.clone(), token))
                .collect(),
        }
    }

    pub fn insert(&mut self, token: SessionToken) {
        self.tokens.insert(token.name.clone(), token);
    }

    pub fn get(&self, name: &str) -> Option<&SessionToken> {
        self.tokens.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Valid when the primary token exists and expires more than the buffer from now
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(now_epoch_secs())
    }

    pub fn is_valid_at(&self, now: f64) -> bool {
        let Some(token) = self.tokens.get(PRIMARY_TOKEN) else {
            return false;
        };
        match token.expires {
            Some(expires) => expires - now > EXPIRY_BUFFER_SECS,
            None => false,
        }
    }

    /// Seconds until the primary token expires (negative when already expired)
    pub fn remaining_secs(&self) -> Option<f64> {
        self.tokens
            .get(PRIMARY_TOKEN)
            .and_then(|token| token.expires)
            .map(|expires| expires - now_epoch_secs())
    }

    /// `(name, value)` pairs, sorted by name
    pub fn cookies_as_tuples(&self) -> Vec<(String, String)> {
        let mut tuples: Vec<_> = self
            .tokens
            .values()
            .map(|token| (token.name.clone(), token.value.clone()))
            .collect();
        tuples.sort();
        tuples
    }

    /// Value for a `Cookie` request header
    pub fn cookie_header(&self) -> Option<String> {
        if self.tokens.is_empty() {
            return None;
        }
        Some(
            self.cookies_as_tuples()
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Load from disk; a missing or unreadable file yields an empty store
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No session file at {}", path.display());
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path).map_err(|source| CrmError::Storage {
            path: path.to_path_buf(),
            source,
        })?;
        let store: Self = match serde_json::from_str(&content) {
            Ok(store) => store,
            Err(e) => {
                log::warn!(
                    "Ignoring corrupt session file {} ({}); a new login is required",
                    path.display(),
                    e
                );
                return Ok(Self::new());
            }
        };
        log::debug!("Loaded {} cookies from {}", store.len(), path.display());
        Ok(store)
    }

    /// Replace the session file, creating parent directories as needed
    ///
    /// The content goes to a sibling temp file first and is renamed into
    /// place, so readers never see a half-written file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| CrmError::Storage {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let content = serde_json::to_string_pretty(self)?;
        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);

        std::fs::write(&tmp_path, content).map_err(|source| CrmError::Storage {
            path: tmp_path.clone(),
            source,
        })?;
        std::fs::rename(&tmp_path, path).map_err(|source| {
            let _ = std::fs::remove_file(&tmp_path);
            CrmError::Storage {
                path: path.to_path_buf(),
                source,
            }
        })?;
        log::debug!("Saved {} cookies to {}", self.len(), path.display());
        Ok(())
    }
}

/// Current time as fractional Unix seconds
pub fn now_epoch_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}
