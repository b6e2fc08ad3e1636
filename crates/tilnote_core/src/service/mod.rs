//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repositories, credentials and tokens into use cases.
//! - Keep the HTTP layer decoupled from storage details.
//!
//! # Invariants
//! - Services never map errors to transport codes; `CoreError` propagates
//!   unchanged to the boundary.
//! - Every call takes an explicit `RequestContext` for its log lines.

pub mod note_service;
pub mod user_service;
