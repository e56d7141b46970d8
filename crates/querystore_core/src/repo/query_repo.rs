//! Stored query repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Define the narrow backend contract used by `QueryDefinitionStore`.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths call `StoredQuery::validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Ids come from `AUTOINCREMENT`, so deleted ids are never handed out again.
//! - The connection is locked for exactly one statement or transaction.

use crate::config::DatabaseConfig;
use crate::db::migrations::{current_user_version, latest_version};
use crate::db::{open_configured, open_db, open_db_in_memory, DbError};
use crate::model::stored_query::{QueryId, QueryValidationError, StoredQuery};
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

const QUERY_SELECT_SQL: &str = "SELECT
    id,
    name,
    definition,
    created_at,
    updated_at
FROM stored_queries";

const STORED_QUERIES_TABLE: &str = "stored_queries";
const REQUIRED_COLUMNS: &[&str] = &["id", "name", "definition", "created_at", "updated_at"];

pub type RepoResult<T> = Result<T, RepoError>;

/// Backend error for stored query persistence and query operations.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Validation(#[from] QueryValidationError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("stored query not found: {0}")]
    NotFound(QueryId),
    #[error("insert expects an unsaved record, got id {0}")]
    UnexpectedId(QueryId),
    #[error("update expects a record with an id")]
    MissingId,
    #[error("invalid persisted query data: {0}")]
    InvalidData(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error(
        "connection schema version {actual_version} is behind required {expected_version}; open it through `db::open_db`"
    )]
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    #[error("required table `{0}` is missing")]
    MissingRequiredTable(&'static str),
    #[error("required column `{table}.{column}` is missing")]
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Filter and pagination options for listing stored queries.
///
/// Results are always ordered by ascending id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryListQuery {
    /// Exact match on `name`.
    pub name: Option<String>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Storage backend contract for stored queries.
pub trait QueryRepository {
    /// Inserts an unsaved record and returns it with its new id and timestamps.
    fn insert(&self, query: &StoredQuery) -> RepoResult<StoredQuery>;
    /// Returns `None` for unknown or deleted ids.
    fn get(&self, id: QueryId) -> RepoResult<Option<StoredQuery>>;
    /// Replaces name and definition of an existing record.
    ///
    /// Returns `RepoError::NotFound` when no record has the given id.
    fn update(&self, query: &StoredQuery) -> RepoResult<StoredQuery>;
    /// Removes a record. Returns whether a row existed.
    fn delete(&self, id: QueryId) -> RepoResult<bool>;
    fn list(&self, query: &QueryListQuery) -> RepoResult<Vec<StoredQuery>>;
}

/// SQLite-backed stored query repository.
pub struct SqliteQueryRepository {
    conn: Mutex<Connection>,
}

impl SqliteQueryRepository {
    /// Wraps a migrated connection after checking its schema.
    ///
    /// # Errors
    /// - `UninitializedConnection` when migrations were not applied.
    /// - `MissingRequiredTable` / `MissingRequiredColumn` on schema drift.
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        verify_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens (and migrates) a database file.
    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        Self::try_new(open_db(path)?)
    }

    /// Opens a fresh in-memory database.
    pub fn open_in_memory() -> RepoResult<Self> {
        Self::try_new(open_db_in_memory()?)
    }

    pub fn open_configured(config: &DatabaseConfig) -> RepoResult<Self> {
        Self::try_new(open_configured(config)?)
    }

    /// Releases the underlying connection.
    pub fn into_inner(self) -> Connection {
        self.conn.into_inner()
    }
}

impl QueryRepository for SqliteQueryRepository {
    fn insert(&self, query: &StoredQuery) -> RepoResult<StoredQuery> {
        query.validate()?;
        if let Some(id) = query.id {
            return Err(RepoError::UnexpectedId(id));
        }

        let now = now_epoch_ms();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO stored_queries (
                name,
                definition,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?3);",
            params![query.name.as_deref(), query.definition.as_str(), now],
        )?;
        let id = tx.last_insert_rowid();
        let stored = select_by_id(&tx, id)?.ok_or_else(|| {
            RepoError::InvalidData(format!("inserted row {id} could not be read back"))
        })?;
        tx.commit()?;

        Ok(stored)
    }

    fn get(&self, id: QueryId) -> RepoResult<Option<StoredQuery>> {
        let conn = self.conn.lock();
        select_by_id(&conn, id)
    }

    fn update(&self, query: &StoredQuery) -> RepoResult<StoredQuery> {
        query.validate()?;
        let id = query.id.ok_or(RepoError::MissingId)?;

        let now = now_epoch_ms();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE stored_queries
             SET
                name = ?1,
                definition = ?2,
                updated_at = ?3
             WHERE id = ?4;",
            params![query.name.as_deref(), query.definition.as_str(), now, id],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        let stored = select_by_id(&tx, id)?.ok_or(RepoError::NotFound(id))?;
        tx.commit()?;

        Ok(stored)
    }

    fn delete(&self, id: QueryId) -> RepoResult<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute("DELETE FROM stored_queries WHERE id = ?1;", [id])?;
        Ok(changed > 0)
    }

    fn list(&self, query: &QueryListQuery) -> RepoResult<Vec<StoredQuery>> {
        let mut sql = format!("{QUERY_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(name) = query.name.as_deref() {
            sql.push_str(" AND name = ?");
            bind_values.push(Value::Text(name.to_string()));
        }

        sql.push_str(" ORDER BY id ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut queries = Vec::new();

        while let Some(row) = rows.next()? {
            queries.push(parse_query_row(row)?);
        }

        Ok(queries)
    }
}

/// Unix epoch milliseconds used for backend-owned timestamps.
pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

fn select_by_id(conn: &Connection, id: QueryId) -> RepoResult<Option<StoredQuery>> {
    let mut stmt = conn.prepare_cached(&format!("{QUERY_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_query_row(row)?));
    }

    Ok(None)
}

fn parse_query_row(row: &Row<'_>) -> RepoResult<StoredQuery> {
    let query = StoredQuery {
        id: Some(row.get("id")?),
        name: row.get("name")?,
        definition: row.get("definition")?,
        created_at: Some(row.get("created_at")?),
        updated_at: Some(row.get("updated_at")?),
    };
    query.validate().map_err(|err| {
        RepoError::InvalidData(format!(
            "row {} in stored_queries failed validation: {err}",
            query.id.unwrap_or_default()
        ))
    })?;
    Ok(query)
}

fn verify_schema(conn: &Connection) -> RepoResult<()> {
    let actual_version = current_user_version(conn)?;
    let expected_version = latest_version();
    if actual_version < expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    if actual_version > expected_version {
        return Err(RepoError::Db(DbError::UnsupportedSchemaVersion {
            db_version: actual_version,
            latest_supported: expected_version,
        }));
    }

    let table_exists: bool = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1
        );",
        [STORED_QUERIES_TABLE],
        |row| row.get(0),
    )?;
    if !table_exists {
        return Err(RepoError::MissingRequiredTable(STORED_QUERIES_TABLE));
    }

    let mut stmt = conn.prepare(&format!("PRAGMA table_info({STORED_QUERIES_TABLE});"))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>("name"))?
        .collect::<Result<Vec<_>, _>>()?;

    for &column in REQUIRED_COLUMNS {
        if !columns.iter().any(|existing| existing == column) {
            return Err(RepoError::MissingRequiredColumn {
                table: STORED_QUERIES_TABLE,
                column,
            });
        }
    }

    Ok(())
}
