//! Caller-facing services.
//!
//! # Responsibility
//! - Wrap repository calls into use-case level APIs.
//! - Keep CLI and other callers decoupled from storage details.

pub mod query_store;
