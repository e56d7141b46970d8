//! Domain model for persisted query definitions.
//!
//! # Responsibility
//! - Define the record shape shared by every backend and the store façade.
//!
//! # Invariants
//! - Every saved record is identified by a backend-assigned `QueryId`.
//! - Deletion is a hard delete; ids are never handed out twice.

pub mod stored_query;
