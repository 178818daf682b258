use motionlog_core::{
    AttachOptions, DataContext, SchemaModel, StoreCoordinator, StoreError, MEASUREMENT_SCHEMA,
};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn attach_creates_and_migrates_a_fresh_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fresh.sqlite3");

    let coordinator =
        StoreCoordinator::attach(schema(), &path, AttachOptions::default()).unwrap();
    assert!(coordinator.is_attached());
    assert!(path.exists());
    coordinator.detach_store().unwrap();

    let conn = Connection::open(&path).unwrap();
    assert_eq!(user_version(&conn), schema().latest_version());
    assert_column_exists(&conn, "measurements", "body_side");
    assert_column_exists(&conn, "measurements", "body_part");
}

#[test]
fn attach_creates_missing_parent_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("deeper").join("capture.sqlite3");

    let coordinator =
        StoreCoordinator::attach(schema(), &path, AttachOptions::default()).unwrap();
    assert!(coordinator.is_attached());
    assert!(path.exists());
}

#[test]
fn attach_upgrades_a_version_one_file_in_place() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("old.sqlite3");
    write_version_one_file(&path);

    let coordinator =
        StoreCoordinator::attach(schema(), &path, AttachOptions::default()).unwrap();
    coordinator.detach_store().unwrap();

    let conn = Connection::open(&path).unwrap();
    assert_eq!(user_version(&conn), schema().latest_version());
    assert_column_exists(&conn, "measurements", "body_side");
    assert_column_exists(&conn, "measurements", "body_part");
}

#[test]
fn attach_rejects_a_file_from_a_newer_build() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("future.sqlite3");
    {
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    }

    let err = StoreCoordinator::attach(schema(), &path, AttachOptions::default()).unwrap_err();
    match err {
        StoreError::UnsupportedSchemaVersion {
            file_version,
            latest_supported,
        } => {
            assert_eq!(file_version, 999);
            assert_eq!(latest_supported, schema().latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn attach_without_auto_migrate_rejects_a_stale_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stale.sqlite3");
    write_version_one_file(&path);

    let options = AttachOptions {
        auto_migrate: false,
        ..AttachOptions::default()
    };
    let err = StoreCoordinator::attach(schema(), &path, options).unwrap_err();
    assert!(matches!(
        err,
        StoreError::MigrationRequired {
            file_version: 1,
            ..
        }
    ));
}

#[test]
fn attach_without_create_fails_on_a_missing_file() {
    let dir = TempDir::new().unwrap();

    let options = AttachOptions {
        create_if_missing: false,
        ..AttachOptions::default()
    };
    let err = StoreCoordinator::attach(schema(), dir.path().join("absent.sqlite3"), options)
        .unwrap_err();
    assert!(matches!(err, StoreError::Sqlite(_)));
}

#[test]
fn detach_is_idempotent_and_blocks_later_store_access() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("detach.sqlite3");

    let coordinator =
        StoreCoordinator::attach(schema(), &path, AttachOptions::default()).unwrap();
    coordinator.detach_store().unwrap();
    assert!(!coordinator.is_attached());
    coordinator.detach_store().unwrap();

    let context = DataContext::new(Arc::new(coordinator));
    let err = context.measurement_count().unwrap_err();
    assert!(matches!(err, StoreError::StoreDetached));
}

#[test]
fn unknown_schema_names_are_not_found() {
    let err = SchemaModel::load(None, "telemetry").unwrap_err();
    match err {
        StoreError::SchemaNotFound { bundle, name } => {
            assert_eq!(bundle, "motionlog");
            assert_eq!(name, "telemetry");
        }
        other => panic!("unexpected error: {other}"),
    }

    let err = SchemaModel::load(Some("third_party"), MEASUREMENT_SCHEMA).unwrap_err();
    assert!(matches!(err, StoreError::SchemaNotFound { .. }));
}

fn schema() -> SchemaModel {
    SchemaModel::load(None, MEASUREMENT_SCHEMA).unwrap()
}

// The measurement table as shipped before the device-placement columns.
fn write_version_one_file(path: &Path) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE measurements (
            uuid TEXT PRIMARY KEY NOT NULL,
            type TEXT NOT NULL,
            timestamp REAL NOT NULL,
            x REAL NOT NULL,
            y REAL NOT NULL,
            z REAL NOT NULL,
            w REAL,
            accuracy REAL,
            is_local INTEGER NOT NULL DEFAULT 1,
            recorded_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000)
        );
        PRAGMA user_version = 1;",
    )
    .unwrap();
}

fn user_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_column_exists(conn: &Connection, table: &str, column: &str) {
    let count: i64 = conn
        .query_row(
            &format!("SELECT COUNT(*) FROM pragma_table_info('{table}') WHERE name = ?1;"),
            [column],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(count, 1, "column {table}.{column} should exist");
}
