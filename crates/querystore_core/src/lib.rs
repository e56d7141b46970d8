//! Core persistence layer for stored query definitions.
//! This crate owns the record model, backend contract and store façade.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, DatabaseConfig, LoggingConfig, StoreConfig};
pub use logging::{default_log_level, init_logging, logging_status, LogTarget, LoggingError};
pub use model::stored_query::{QueryId, QueryValidationError, StoredQuery, MAX_NAME_CHARS};
pub use repo::memory::InMemoryQueryRepository;
pub use repo::query_repo::{
    QueryListQuery, QueryRepository, RepoError, RepoResult, SqliteQueryRepository,
};
pub use service::query_store::{QueryDefinitionStore, StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
