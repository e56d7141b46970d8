use querystore_core::db::migrations::latest_version;
use querystore_core::db::open_db;
use querystore_core::{
    DatabaseConfig, QueryDefinitionStore, QueryRepository, RepoError, SqliteQueryRepository,
    StoreError, StoredQuery,
};
use rusqlite::Connection;
use std::error::Error;
use std::sync::Arc;
use std::thread;

#[test]
fn records_survive_reopening_the_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queries.db");

    let saved = {
        let store = QueryDefinitionStore::new(SqliteQueryRepository::open(&path).unwrap());
        store
            .save(&StoredQuery::new("SELECT * FROM a").named("a"))
            .unwrap()
    };

    let store = QueryDefinitionStore::new(SqliteQueryRepository::open(&path).unwrap());
    let loaded = store.find_by_id(saved.id.unwrap()).unwrap().unwrap();
    assert_eq!(loaded, saved);
}

#[test]
fn ids_are_not_reused_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queries.db");

    let last_id = {
        let repo = SqliteQueryRepository::open(&path).unwrap();
        repo.insert(&StoredQuery::new("a")).unwrap();
        let last = repo.insert(&StoredQuery::new("b")).unwrap().id.unwrap();
        assert!(repo.delete(last).unwrap());
        last
    };

    let repo = SqliteQueryRepository::open(&path).unwrap();
    let next = repo.insert(&StoredQuery::new("c")).unwrap().id.unwrap();
    assert!(next > last_id);
}

#[test]
fn open_configured_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("deeper").join("queries.db");
    let config = DatabaseConfig {
        path: Some(path.clone()),
        busy_timeout_ms: 1_000,
    };

    let repo = SqliteQueryRepository::open_configured(&config).unwrap();
    repo.insert(&StoredQuery::new("SELECT 1")).unwrap();
    assert!(path.exists());
}

#[test]
fn open_configured_without_path_is_in_memory() {
    let repo = SqliteQueryRepository::open_configured(&DatabaseConfig::default()).unwrap();
    assert_eq!(repo.insert(&StoredQuery::new("x")).unwrap().id, Some(1));
}

#[test]
fn delete_reports_whether_a_row_existed() {
    let repo = SqliteQueryRepository::open_in_memory().unwrap();
    let id = repo.insert(&StoredQuery::new("x")).unwrap().id.unwrap();
    assert!(repo.delete(id).unwrap());
    assert!(!repo.delete(id).unwrap());
}

#[test]
fn insert_and_update_enforce_id_shape() {
    let repo = SqliteQueryRepository::open_in_memory().unwrap();
    assert!(matches!(
        repo.insert(&StoredQuery::with_id(3, "x")),
        Err(RepoError::UnexpectedId(3))
    ));
    assert!(matches!(
        repo.update(&StoredQuery::new("x")),
        Err(RepoError::MissingId)
    ));
    assert!(matches!(
        repo.update(&StoredQuery::with_id(3, "x")),
        Err(RepoError::NotFound(3))
    ));
}

#[test]
fn corrupt_rows_are_reported_not_masked() {
    let repo = SqliteQueryRepository::open_in_memory().unwrap();
    let id = repo
        .insert(&StoredQuery::new("x").named("ok"))
        .unwrap()
        .id
        .unwrap();

    let conn = repo.into_inner();
    conn.execute("UPDATE stored_queries SET name = '   ' WHERE id = ?1;", [id])
        .unwrap();
    let repo = SqliteQueryRepository::try_new(conn).unwrap();

    assert!(matches!(repo.get(id), Err(RepoError::InvalidData(_))));

    let store = QueryDefinitionStore::new(repo);
    assert!(matches!(
        store.find_all(),
        Err(StoreError::Persistence(RepoError::InvalidData(_)))
    ));
}

#[test]
fn constraint_violations_surface_as_persistence_errors() {
    let conn = open_db(":memory:").unwrap();
    conn.execute_batch(
        "CREATE TRIGGER reject_inserts BEFORE INSERT ON stored_queries
         BEGIN
             SELECT RAISE(ABORT, 'writes disabled');
         END;",
    )
    .unwrap();
    let store = QueryDefinitionStore::new(SqliteQueryRepository::try_new(conn).unwrap());

    let err = store.save(&StoredQuery::new("SELECT 1")).unwrap_err();
    assert!(matches!(err, StoreError::Persistence(RepoError::Db(_))));
    assert_eq!(err.to_string(), "persistence failure");
    let cause = err.source().expect("persistence errors keep their cause");
    assert!(cause.to_string().contains("writes disabled"));
}

#[test]
fn concurrent_saves_receive_distinct_ids() {
    let store = Arc::new(QueryDefinitionStore::new(
        SqliteQueryRepository::open_in_memory().unwrap(),
    ));

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                (0..25)
                    .map(|n| {
                        store
                            .save(&StoredQuery::new(format!("SELECT {worker}, {n}")))
                            .unwrap()
                            .id
                            .unwrap()
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ids: Vec<_> = handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 100);
    assert_eq!(store.find_all().unwrap().len(), 100);
}

#[test]
fn repository_rejects_uninitialized_connection() {
    let conn = Connection::open_in_memory().unwrap();

    match SqliteQueryRepository::try_new(conn) {
        Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version: 0,
        }) => assert_eq!(expected_version, latest_version()),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}

#[test]
fn repository_rejects_connection_without_stored_queries_table() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    assert!(matches!(
        SqliteQueryRepository::try_new(conn),
        Err(RepoError::MissingRequiredTable("stored_queries"))
    ));
}

#[test]
fn repository_rejects_connection_missing_required_column() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE stored_queries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT,
            definition TEXT NOT NULL
        );",
    )
    .unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    assert!(matches!(
        SqliteQueryRepository::try_new(conn),
        Err(RepoError::MissingRequiredColumn {
            table: "stored_queries",
            column: "created_at"
        })
    ));
}
