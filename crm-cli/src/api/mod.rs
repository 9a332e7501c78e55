//! Dynamics 365 Web API access
//!
//! Query building (FetchXML and OData), the cookie-authenticated client,
//! response normalization and batch fan-out.

pub mod auth;
pub mod batch;
pub mod client;
pub mod normalize;
pub mod odata;
pub mod pluralization;
pub mod query;
pub mod session;

pub use auth::{AuthSession, Authenticator, Credentials, PromptAuthenticator};
pub use batch::{BatchOutcome, ConcurrencyLimiter, gather, log_outcomes};
pub use client::{ApiClient, ApiResponse};
pub use normalize::{NormalizedResponse, normalize_record, normalize_response};
pub use odata::{ODataQuery, compile_params};
pub use pluralization::Pluralization;
pub use query::{
    BuiltFetchXml, Entity, FetchXml, Filter, FilterCondition, FilterType, LinkType, LinkedEntity,
    Order,
};
pub use session::{SessionStore, SessionToken};
