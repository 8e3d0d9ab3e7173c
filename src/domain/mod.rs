//! Domain layer for the Aegis execution engine
//!
//! Core models, errors, and the ports collaborators plug into.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{ApprovalError, DomainError, DomainResult, PlanError};
