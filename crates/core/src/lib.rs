//! Building blocks for running GraphQL query files against a live endpoint.
pub mod auth;
pub mod config;
pub mod error;
pub mod executor;
pub mod loader;
pub mod report;
pub mod schema;
pub mod suite;
pub mod validator;

pub use crate::error::ProbeError;
