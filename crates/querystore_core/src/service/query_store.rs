//! Stored query façade.
//!
//! # Responsibility
//! - Expose find/save/delete/list over any `QueryRepository`.
//! - Translate backend outcomes into caller-facing results.
//!
//! # Invariants
//! - Absence is `Ok(None)`, never an error.
//! - Saving a record whose id does not exist fails with `InvalidIdentifier`
//!   and writes nothing.
//! - Backend failures are returned once, unchanged, with no retry.
//! - The façade holds no cache and no mutable state.

use crate::model::stored_query::{QueryId, QueryValidationError, StoredQuery};
use crate::repo::query_repo::{QueryListQuery, QueryRepository, RepoError};
use log::{debug, warn};
use std::error::Error as _;
use std::time::Instant;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Caller-facing error for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("persistence failure")]
    Persistence(#[source] RepoError),
    #[error("no stored query with id {0}; save without an id to create one")]
    InvalidIdentifier(QueryId),
    #[error("invalid stored query")]
    InvalidRecord(#[source] QueryValidationError),
}

impl StoreError {
    /// Stable code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Persistence(_) => "persistence",
            Self::InvalidIdentifier(_) => "invalid_identifier",
            Self::InvalidRecord(_) => "invalid_record",
        }
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::InvalidIdentifier(id),
            RepoError::Validation(err) => Self::InvalidRecord(err),
            other => Self::Persistence(other),
        }
    }
}

/// Lookup-and-persistence layer for stored query definitions.
pub struct QueryDefinitionStore<R: QueryRepository> {
    repo: R,
}

impl<R: QueryRepository> QueryDefinitionStore<R> {
    /// Creates a store over the provided backend.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Borrows the backend, e.g. to inspect a test double.
    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Returns the record with `id`, or `None` when there is none.
    ///
    /// Non-positive ids can never be assigned and return `None` without a
    /// backend round trip.
    pub fn find_by_id(&self, id: QueryId) -> StoreResult<Option<StoredQuery>> {
        let started_at = Instant::now();
        let result = if id <= 0 {
            Ok(None)
        } else {
            self.repo.get(id).map_err(StoreError::from)
        };

        match &result {
            Ok(found) => debug!(
                "{}",
                find_event(id, found.is_some(), started_at.elapsed().as_millis())
            ),
            Err(err) => log_failure("find", Some(id), started_at, err),
        }
        result
    }

    /// Inserts an unsaved record or replaces an existing one.
    ///
    /// # Contract
    /// - `id == None`: the backend assigns a fresh id.
    /// - `id == Some(i)` with record `i` present: name and definition are
    ///   replaced; `created_at` is kept.
    /// - `id == Some(i)` with no record `i`: `StoreError::InvalidIdentifier`.
    /// - Returns the record exactly as a later `find_by_id` returns it.
    pub fn save(&self, query: &StoredQuery) -> StoreResult<StoredQuery> {
        let started_at = Instant::now();
        if let Err(err) = query.validate() {
            let err = StoreError::InvalidRecord(err);
            log_failure("save", query.id, started_at, &err);
            return Err(err);
        }

        let (mode, result) = match query.id {
            None => ("insert", self.repo.insert(query)),
            Some(_) => ("update", self.repo.update(query)),
        };
        let result = result.map_err(StoreError::from);

        match &result {
            Ok(stored) => debug!(
                "event=query_store_save module=store status=ok mode={} id={} definition_bytes={} duration_ms={}",
                mode,
                stored.id.unwrap_or_default(),
                stored.definition.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("save", query.id, started_at, err),
        }
        result
    }

    /// Removes the record with `id`. Absent ids are not an error.
    pub fn delete_by_id(&self, id: QueryId) -> StoreResult<()> {
        let started_at = Instant::now();
        match self.repo.delete(id) {
            Ok(existed) => {
                debug!(
                    "event=query_store_delete module=store status=ok id={} existed={} duration_ms={}",
                    id,
                    existed,
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                let err = StoreError::from(err);
                log_failure("delete", Some(id), started_at, &err);
                Err(err)
            }
        }
    }

    /// Returns every stored record in ascending id order.
    pub fn find_all(&self) -> StoreResult<Vec<StoredQuery>> {
        self.list(&QueryListQuery::default())
    }

    /// Returns records matching `query`, in ascending id order.
    pub fn list(&self, query: &QueryListQuery) -> StoreResult<Vec<StoredQuery>> {
        let started_at = Instant::now();
        let result = self.repo.list(query).map_err(StoreError::from);
        match &result {
            Ok(rows) => debug!(
                "event=query_store_list module=store status=ok count={} filtered={} duration_ms={}",
                rows.len(),
                query.name.is_some(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("list", None, started_at, err),
        }
        result
    }
}

fn find_event(id: QueryId, found: bool, duration_ms: u128) -> String {
    format!(
        "event=query_store_find module=store status=ok id={id} found={found} duration_ms={duration_ms}"
    )
}

fn log_failure(operation: &str, id: Option<QueryId>, started_at: Instant, err: &StoreError) {
    let id = id.map_or_else(|| "none".to_string(), |id| id.to_string());
    warn!(
        "event=query_store_{} module=store status=error id={} duration_ms={} error_code={} error={}",
        operation,
        id,
        started_at.elapsed().as_millis(),
        err.code(),
        error_chain(err)
    );
}

/// Joins an error and its sources into one log-safe line.
fn error_chain(err: &StoreError) -> String {
    let mut line = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        line.push_str(": ");
        line.push_str(&cause.to_string());
        source = cause.source();
    }
    line
}
