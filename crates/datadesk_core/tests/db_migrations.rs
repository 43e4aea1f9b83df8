use datadesk_core::db::migrations::supported_version;
use datadesk_core::{
    backup_to, database_info, open_db, open_db_in_memory, open_db_with, CoreConfig, DbError,
    JournalMode,
};
use rusqlite::Connection;

#[test]
fn in_memory_store_has_every_table() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), supported_version());
    for table in ["accounts", "documents", "settings"] {
        assert_table_exists(&conn, table);
    }
    let foreign_keys: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(foreign_keys, 1);
}

#[test]
fn reopening_a_file_store_keeps_the_schema() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("datadesk.sqlite3");

    let first = open_db(&path).unwrap();
    first
        .execute("INSERT INTO accounts (handle) VALUES ('keeper')", [])
        .unwrap();
    drop(first);

    let second = open_db(&path).unwrap();
    assert_eq!(schema_version(&second), supported_version());
    let handles: i64 = second
        .query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))
        .unwrap();
    assert_eq!(handles, 1);
}

#[test]
fn newer_schema_version_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 42;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion { found, supported } => {
            assert_eq!(found, 42);
            assert_eq!(supported, supported_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn config_selects_journal_mode() {
    let dir = tempfile::tempdir().unwrap();
    let config = CoreConfig {
        db_path: dir.path().join("configured.sqlite3"),
        journal_mode: JournalMode::Delete,
        busy_timeout_ms: 250,
        ..CoreConfig::default()
    };

    let conn = open_db_with(&config).unwrap();
    let mode: String = conn
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(mode, "delete");
}

#[test]
fn info_reports_counts_and_backup_copies_rows() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open_db(dir.path().join("live.sqlite3")).unwrap();
    conn.execute("INSERT INTO accounts (handle) VALUES ('alice')", [])
        .unwrap();
    conn.execute(
        "INSERT INTO settings (key, value, type_tag) VALUES ('ui.theme', 'dark', 'string')",
        [],
    )
    .unwrap();

    let info = database_info(&conn).unwrap();
    assert_eq!(info.schema_version, supported_version());
    assert_eq!(info.accounts, 1);
    assert_eq!(info.documents, 0);
    assert_eq!(info.settings, 1);
    assert!(info.path.is_some());
    assert!(info.page_count > 0);

    let target = dir.path().join("backup").join("copy.sqlite3");
    backup_to(&conn, &target).unwrap();
    let copy = Connection::open(&target).unwrap();
    let copied: i64 = copy
        .query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))
        .unwrap();
    assert_eq!(copied, 1);
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
            [table],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table} does not exist");
}

#[test]
fn backup_under_a_file_reports_the_directory() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open_db(dir.path().join("live.sqlite3")).unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();

    match backup_to(&conn, blocker.join("copy.sqlite3")).unwrap_err() {
        DbError::Directory { path, .. } => assert_eq!(path, blocker),
        other => panic!("unexpected error: {other}"),
    }
}
