//! Authenticated Web API client
//!
//! Every request first asks the [`AuthSession`] for a valid cookie set
//! (which may trigger an interactive sign-in), then attaches those cookies
//! and the OData headers. GET hands back whatever status the server sent;
//! PATCH and POST only succeed on 200, 201 or 204.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, COOKIE, HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::auth::AuthSession;
use super::normalize::{NormalizedResponse, normalize_response};
use super::odata::ODataQuery;
use super::pluralization::Pluralization;
use super::query::BuiltFetchXml;
use crate::config::Config;
use crate::error::{CrmError, Result};

pub const USER_AGENT: &str = concat!("crm-cli/", env!("CARGO_PKG_VERSION"));

/// Ask the server to include formatted values next to raw values
const PREFER_ANNOTATIONS: &str =
    r#"odata.include-annotations="OData.Community.Display.V1.FormattedValue""#;

/// Statuses PATCH and POST accept
pub const WRITE_SUCCESS_STATUSES: [u16; 3] = [200, 201, 204];

/// Fully read HTTP response
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl ApiResponse {
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Turn a non-2xx response into a status policy error
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(CrmError::StatusPolicy {
                status: self.status_code(),
                body: self.body,
            })
        }
    }

    /// Decode the body; an empty body (204) decodes to `null`
    pub fn json(&self) -> Result<Value> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&self.body).map_err(|e| self.validation_error(e))
    }

    /// Decode the body into a typed model
    pub fn json_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|e| self.validation_error(e))
    }

    fn validation_error(&self, e: serde_json::Error) -> CrmError {
        log::error!("Response validation error: {} (payload: {})", e, self.body);
        CrmError::Validation {
            message: e.to_string(),
            payload: self.body.clone(),
        }
    }
}

/// Client for one organization's Web API
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    api_data_endpoint: String,
    session: Arc<AuthSession>,
    pluralization: Pluralization,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_data_endpoint: impl Into<String>,
        session: Arc<AuthSession>,
        timeout: Duration,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert("OData-MaxVersion", HeaderValue::from_static("4.0"));
        headers.insert("OData-Version", HeaderValue::from_static("4.0"));
        headers.insert("Prefer", HeaderValue::from_static(PREFER_ANNOTATIONS));

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(CrmError::from_reqwest)?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_data_endpoint: api_data_endpoint.into().trim_matches('/').to_string(),
            session,
            pluralization: Pluralization::default(),
        })
    }

    pub fn from_config(config: &Config, session: Arc<AuthSession>) -> Result<Self> {
        Self::new(
            config.base_url.clone(),
            config.api_data_endpoint.clone(),
            session,
            config.request_timeout,
        )
    }

    pub fn with_pluralization(mut self, pluralization: Pluralization) -> Self {
        self.pluralization = pluralization;
        self
    }

    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    pub fn pluralization(&self) -> Pluralization {
        self.pluralization
    }

    /// Absolute URL for a path relative to the base URL
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn data_path(&self, endpoint: &str) -> String {
        format!("{}/{}", self.api_data_endpoint, endpoint.trim_start_matches('/'))
    }

    /// Send a request after making sure the session is valid
    pub async fn request(
        &self,
        path: &str,
        method: Method,
        query: &[(String, String)],
        headers: Option<HeaderMap>,
        body: Option<&Value>,
    ) -> Result<ApiResponse> {
        let store = self.session.ensure_valid().await?;

        let url = self.url(path);
        let mut request = self.http.request(method.clone(), &url).query(query);

        if let Some(cookie) = store.cookie_header() {
            let value = HeaderValue::from_str(&cookie)
                .map_err(|e| CrmError::Auth(format!("Session cookie is not a valid header: {}", e)))?;
            request = request.header(COOKIE, value);
        }
        if let Some(headers) = headers {
            request = request.headers(headers);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        log::debug!("{} {} {:?}", method, url, query);

        let response = request.send().await.map_err(|e| {
            log::error!("API request failed: {} {}: {}", method, url, e);
            CrmError::from_reqwest(e)
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(|e| {
            log::error!("Failed to read response body: {} {}: {}", method, url, e);
            CrmError::from_reqwest(e)
        })?;

        if !status.is_success() {
            log::warn!("{} {} returned {}", method, url, status);
        }

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }

    /// GET below the API data endpoint; any status is returned to the caller
    pub async fn get(&self, endpoint: &str, params: &[(String, String)]) -> Result<ApiResponse> {
        self.request(&self.data_path(endpoint), Method::GET, params, None, None)
            .await
    }

    /// PATCH below the API data endpoint
    pub async fn patch(&self, endpoint: &str, data: &Value) -> Result<ApiResponse> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("mscrm.suppressduplicatedetection"),
            HeaderValue::from_static("false"),
        );

        let response = self
            .request(
                &self.data_path(endpoint),
                Method::PATCH,
                &[],
                Some(headers),
                Some(data),
            )
            .await?;
        enforce_write_success("Patch", endpoint, response)
    }

    /// POST below the API data endpoint
    pub async fn post(
        &self,
        endpoint: &str,
        data: &Value,
        headers: Option<HeaderMap>,
    ) -> Result<ApiResponse> {
        let response = self
            .request(&self.data_path(endpoint), Method::POST, &[], headers, Some(data))
            .await?;
        enforce_write_success("Post", endpoint, response)
    }

    /// Run an OData query against `{entity}s` or `{entity}s({id})`
    pub async fn odata_request(&self, query: &ODataQuery) -> Result<ApiResponse> {
        let endpoint = query.endpoint(self.pluralization);
        let params = query.compile();
        self.get(&endpoint, &params).await.inspect_err(|e| {
            log::error!("OData request failed: {}", e);
        })
    }

    /// Run a FetchXML query and normalize the records
    ///
    /// `Ok(None)` means the body could not be read as a record listing.
    pub async fn fetch_xml_request(&self, query: &BuiltFetchXml) -> Result<Option<NormalizedResponse>> {
        let endpoint = self.pluralization.entity_set_name(query.entity_name());
        let params = [("fetchXml".to_string(), query.xml().to_string())];

        let response = self.get(&endpoint, &params).await?.error_for_status().inspect_err(|e| {
            log::error!("FetchXML request failed: {}", e);
        })?;

        Ok(normalize_response(&response.json()?))
    }
}

fn enforce_write_success(kind: &str, endpoint: &str, response: ApiResponse) -> Result<ApiResponse> {
    if WRITE_SUCCESS_STATUSES.contains(&response.status_code()) {
        return Ok(response);
    }

    log::error!(
        "{} request to {} failed: {} {}",
        kind,
        endpoint,
        response.status_code(),
        response.body
    );
    Err(CrmError::StatusPolicy {
        status: response.status_code(),
        body: response.body,
    })
}
