//! In-process stored query repository.
//!
//! # Responsibility
//! - Provide a dependency-free backend for tests and throwaway stores.
//! - Simulate backend outages so callers can exercise failure paths.
//!
//! # Invariants
//! - Ids are assigned from a monotonic counter and never reused.
//! - Listing order is ascending id, same as the SQLite adapter.
//! - Every trait call counts as one backend operation, even when it fails.

use crate::model::stored_query::{QueryId, StoredQuery};
use crate::repo::query_repo::{
    now_epoch_ms, QueryListQuery, QueryRepository, RepoError, RepoResult,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Debug)]
struct MemoryState {
    rows: BTreeMap<QueryId, StoredQuery>,
    next_id: QueryId,
}

/// `BTreeMap`-backed implementation of [`QueryRepository`].
#[derive(Debug)]
pub struct InMemoryQueryRepository {
    state: Mutex<MemoryState>,
    available: AtomicBool,
    operations: AtomicU64,
}

impl Default for InMemoryQueryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryQueryRepository {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                rows: BTreeMap::new(),
                next_id: 1,
            }),
            available: AtomicBool::new(true),
            operations: AtomicU64::new(0),
        }
    }

    /// Toggles simulated availability. While unavailable every call fails
    /// with `RepoError::Unavailable` and leaves stored rows untouched.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of backend calls received so far.
    pub fn operation_count(&self) -> u64 {
        self.operations.load(Ordering::SeqCst)
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.state.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn begin(&self, operation: &str) -> RepoResult<()> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RepoError::Unavailable(format!(
                "in-memory backend is offline during {operation}"
            )))
        }
    }
}

impl QueryRepository for InMemoryQueryRepository {
    fn insert(&self, query: &StoredQuery) -> RepoResult<StoredQuery> {
        self.begin("insert")?;
        query.validate()?;
        if let Some(id) = query.id {
            return Err(RepoError::UnexpectedId(id));
        }

        let now = now_epoch_ms();
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;

        let stored = StoredQuery {
            id: Some(id),
            name: query.name.clone(),
            definition: query.definition.clone(),
            created_at: Some(now),
            updated_at: Some(now),
        };
        state.rows.insert(id, stored.clone());
        Ok(stored)
    }

    fn get(&self, id: QueryId) -> RepoResult<Option<StoredQuery>> {
        self.begin("get")?;
        Ok(self.state.lock().rows.get(&id).cloned())
    }

    fn update(&self, query: &StoredQuery) -> RepoResult<StoredQuery> {
        self.begin("update")?;
        query.validate()?;
        let id = query.id.ok_or(RepoError::MissingId)?;

        let mut state = self.state.lock();
        let existing = state.rows.get_mut(&id).ok_or(RepoError::NotFound(id))?;
        existing.name = query.name.clone();
        existing.definition = query.definition.clone();
        existing.updated_at = Some(now_epoch_ms());
        Ok(existing.clone())
    }

    fn delete(&self, id: QueryId) -> RepoResult<bool> {
        self.begin("delete")?;
        Ok(self.state.lock().rows.remove(&id).is_some())
    }

    fn list(&self, query: &QueryListQuery) -> RepoResult<Vec<StoredQuery>> {
        self.begin("list")?;
        let state = self.state.lock();
        let limit = query.limit.map_or(usize::MAX, |limit| limit as usize);

        Ok(state
            .rows
            .values()
            .filter(|row| match query.name.as_deref() {
                Some(name) => row.name.as_deref() == Some(name),
                None => true,
            })
            .skip(query.offset as usize)
            .take(limit)
            .cloned()
            .collect())
    }
}
