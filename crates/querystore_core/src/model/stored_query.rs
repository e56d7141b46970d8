//! Stored query domain model.
//!
//! # Responsibility
//! - Define the single persisted record handled by the store.
//! - Validate identity and label fields before they reach a backend.
//!
//! # Invariants
//! - `id` is `None` until a backend assigns it, and positive afterwards.
//! - `definition` is opaque: it is stored and returned byte-for-byte and is
//!   never parsed or validated.
//! - `created_at`/`updated_at` are owned by the backend; caller values are
//!   ignored on write.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Surrogate identifier assigned by the storage backend.
pub type QueryId = i64;

/// Maximum length of `StoredQuery::name`, counted in chars.
pub const MAX_NAME_CHARS: usize = 256;

/// Field-level validation failure for a stored query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryValidationError {
    #[error("query id must be positive, got {0}")]
    NonPositiveId(QueryId),
    #[error("query name must not be blank")]
    BlankName,
    #[error("query name is {actual} chars, limit is {max}")]
    NameTooLong { actual: usize, max: usize },
}

/// Persisted query definition record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredQuery {
    /// Backend-assigned id; `None` for records that were never saved.
    pub id: Option<QueryId>,
    /// Optional human-readable label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Opaque query payload.
    pub definition: String,
    /// Unix epoch milliseconds of first insert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    /// Unix epoch milliseconds of the most recent write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl StoredQuery {
    /// Creates an unsaved record. The backend assigns `id` on save.
    pub fn new(definition: impl Into<String>) -> Self {
        Self {
            id: None,
            name: None,
            definition: definition.into(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Creates a record addressed at an existing id, for in-place updates.
    pub fn with_id(id: QueryId, definition: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            ..Self::new(definition)
        }
    }

    /// Sets the optional label.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns whether a backend has already assigned an id.
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Checks identity and label fields. The definition is never inspected.
    pub fn validate(&self) -> Result<(), QueryValidationError> {
        if let Some(id) = self.id {
            if id <= 0 {
                return Err(QueryValidationError::NonPositiveId(id));
            }
        }

        if let Some(name) = self.name.as_deref() {
            if name.trim().is_empty() {
                return Err(QueryValidationError::BlankName);
            }
            let actual = name.chars().count();
            if actual > MAX_NAME_CHARS {
                return Err(QueryValidationError::NameTooLong {
                    actual,
                    max: MAX_NAME_CHARS,
                });
            }
        }

        Ok(())
    }
}
