//! Runtime configuration from environment variables
//!
//! Values are read once at startup (after loading an optional `.env` file)
//! and passed by reference to whatever needs them.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::api::auth::Credentials;
use crate::api::batch::DEFAULT_MAX_CONCURRENT;
use crate::crm::customer::CustomerActions;
use crate::error::{CrmError, Result};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SESSION_LIFETIME_SECS: u64 = 3600;
const APP_DIR: &str = "crm-cli";

/// Connection and runtime settings
#[derive(Clone)]
pub struct Config {
    pub base_url: String,
    /// Path segment of the Web API, e.g. `api/data/v9.0`
    pub api_data_endpoint: String,
    pub username: String,
    pub password: String,
    pub session_file: PathBuf,
    pub subjects_file: PathBuf,
    pub request_timeout: Duration,
    pub max_concurrent_requests: usize,
    /// Lifetime stamped on cookies entered at the login prompt
    pub session_lifetime: Duration,
    /// Custom action names, overridable per organization
    pub customer_actions: CustomerActions,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("api_data_endpoint", &self.api_data_endpoint)
            .field("username", &self.username)
            .field("session_file", &self.session_file)
            .field("subjects_file", &self.subjects_file)
            .field("request_timeout", &self.request_timeout)
            .field("max_concurrent_requests", &self.max_concurrent_requests)
            .field("customer_actions", &self.customer_actions)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load `.env` (if present) and read the process environment
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            log::debug!("Loaded environment from {}", path.display());
        }
        Self::from_vars(std::env::vars().collect())
    }

    /// Build from an explicit variable map
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let required = ["BASE_URL", "API_DATA_ENDPOINT", "COOPCRM_USERNAME", "COOPCRM_PASSWORD"];
        let missing: Vec<String> = required
            .into_iter()
            .filter(|&key| get(key).is_none())
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(CrmError::Config { missing });
        }

        let required_value = |key: &str| get(key).unwrap_or_default().to_string();

        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);

        let session_file = get("SESSION_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("cookies.json"));
        let subjects_file = get("SUBJECTS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("subjects_converted.json"));

        let request_timeout = Duration::from_secs(parse_number(
            "REQUEST_TIMEOUT_SECS",
            get("REQUEST_TIMEOUT_SECS"),
            DEFAULT_TIMEOUT_SECS,
        )?);
        let max_concurrent_requests = parse_number(
            "MAX_CONCURRENT_REQUESTS",
            get("MAX_CONCURRENT_REQUESTS"),
            DEFAULT_MAX_CONCURRENT as u64,
        )? as usize;
        let session_lifetime = Duration::from_secs(parse_number(
            "SESSION_LIFETIME_SECS",
            get("SESSION_LIFETIME_SECS"),
            DEFAULT_SESSION_LIFETIME_SECS,
        )?);

        let defaults = CustomerActions::default();
        let customer_actions = CustomerActions {
            lookup: get("CUSTOMER_LOOKUP_ACTION").map_or(defaults.lookup, str::to_string),
            create_member: get("CREATE_MEMBER_ACTION").map_or(defaults.create_member, str::to_string),
        };

        Ok(Self {
            base_url: required_value("BASE_URL").trim_end_matches('/').to_string(),
            api_data_endpoint: required_value("API_DATA_ENDPOINT").trim_matches('/').to_string(),
            username: required_value("COOPCRM_USERNAME"),
            password: required_value("COOPCRM_PASSWORD"),
            session_file,
            subjects_file,
            request_timeout,
            max_concurrent_requests,
            session_lifetime,
            customer_actions,
        })
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }
}

fn parse_number(key: &str, raw: Option<&str>, default: u64) -> Result<u64> {
    match raw {
        None => Ok(default),
        Some(raw) => match raw.parse::<u64>() {
            Ok(0) => Err(CrmError::InvalidConfig {
                key: key.to_string(),
                message: "must be greater than zero".into(),
            }),
            Ok(value) => Ok(value),
            Err(e) => Err(CrmError::InvalidConfig {
                key: key.to_string(),
                message: format!("'{}' is not a number ({})", raw, e),
            }),
        },
    }
}
