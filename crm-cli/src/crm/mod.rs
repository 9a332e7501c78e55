//! Incident workflow on top of the Web API client

pub mod actions;
pub mod customer;
pub mod models;
pub mod queries;
pub mod subjects;

pub use actions::{Action, close_incident, close_notification, update_incident, update_record};
pub use customer::{Customer, CustomerActions, CustomerError, CustomerLookup};
pub use models::{Contact, Incident, IncidentPatch, Notification, ODataResponse, UserQuery};
pub use subjects::{SubjectEntry, SubjectTable};
