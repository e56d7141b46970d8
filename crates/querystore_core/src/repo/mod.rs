//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the narrow backend contract for stored queries.
//! - Isolate SQLite details from the store façade.
//!
//! # Invariants
//! - Repository writes must enforce `StoredQuery::validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`) in addition to
//!   transport errors.

pub mod memory;
pub mod query_repo;
