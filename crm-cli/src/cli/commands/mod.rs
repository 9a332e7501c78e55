//! Subcommand arguments and handlers

pub mod auth;
pub mod customers;
pub mod fetch;
pub mod incidents;
pub mod notifications;
pub mod subjects;
pub mod user_query;
