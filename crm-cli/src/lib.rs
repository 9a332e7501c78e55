//! Automation client for a Dynamics 365 customer service organization
//!
//! Builds FetchXML and OData queries, keeps an interactively obtained
//! session alive, and drives incident, notification and customer workflows.

pub mod api;
pub mod config;
pub mod crm;
pub mod error;

pub use config::Config;
pub use error::{CrmError, Result};
