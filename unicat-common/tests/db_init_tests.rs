//! Tests for database initialization
//!
//! Covers first-run creation, reopening an existing database, schema
//! versioning and the table constraints the registry relies on.

use tempfile::TempDir;
use unicat_common::config::{database_path, DatabaseConfig};
use unicat_common::db::init::init_database;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = database_path(&dir.path().join("nested").join("root"));
    assert!(!db_path.exists());

    let result = init_database(&db_path, &DatabaseConfig::default()).await;
    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = TempDir::new().unwrap();
    let db_path = database_path(dir.path());

    let pool = init_database(&db_path, &DatabaseConfig::default()).await.unwrap();
    sqlx::query("INSERT INTO countries (code, name) VALUES ('PT', 'Portugal')")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let reopened = init_database(&db_path, &DatabaseConfig::default()).await;
    assert!(reopened.is_ok(), "Failed to open existing database: {:?}", reopened.err());

    let name: String = sqlx::query_scalar("SELECT name FROM countries WHERE code = 'PT'")
        .fetch_one(&reopened.unwrap())
        .await
        .unwrap();
    assert_eq!(name, "Portugal");
}

#[tokio::test]
async fn test_all_tables_created() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&database_path(dir.path()), &DatabaseConfig::default())
        .await
        .unwrap();

    for table in [
        "schema_version",
        "users",
        "countries",
        "exchange_programs",
        "exchange_participants",
        "favorite_programs",
        "exchange_reviews",
    ] {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(exists, "Table {} was not created", table);
    }
}

#[tokio::test]
async fn test_schema_version_recorded_once() {
    let dir = TempDir::new().unwrap();
    let db_path = database_path(dir.path());

    let pool = init_database(&db_path, &DatabaseConfig::default()).await.unwrap();
    pool.close().await;
    let pool = init_database(&db_path, &DatabaseConfig::default()).await.unwrap();

    let version: i32 = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(version, 3);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 3);
}

#[tokio::test]
async fn test_foreign_keys_enforced_on_every_connection() {
    let dir = TempDir::new().unwrap();
    let config = DatabaseConfig {
        max_connections: 3,
        ..Default::default()
    };
    let pool = init_database(&database_path(dir.path()), &config).await.unwrap();

    // Hold several connections so the checks do not all reuse the first one
    let mut held = Vec::new();
    for _ in 0..3 {
        let mut conn = pool.acquire().await.unwrap();
        let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(enabled, 1);
        held.push(conn);
    }
    drop(held);

    let orphan = sqlx::query(
        "INSERT INTO favorite_programs (user_id, program_id) VALUES ('00000000-0000-0000-0000-000000000000', 1)",
    )
    .execute(&pool)
    .await;
    assert!(orphan.is_err(), "Foreign key violation was not rejected");
}

#[tokio::test]
async fn test_review_rating_range_constraint() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&database_path(dir.path()), &DatabaseConfig::default())
        .await
        .unwrap();

    let user = "11111111-1111-1111-1111-111111111111";
    sqlx::query("INSERT INTO users (guid, username, university, is_institution) VALUES (?, 'x', 'UB', 0)")
        .bind(user)
        .execute(&pool)
        .await
        .unwrap();
    let program = sqlx::query("INSERT INTO exchange_programs (university) VALUES ('KU Leuven')")
        .execute(&pool)
        .await
        .unwrap()
        .last_insert_rowid();

    let out_of_range = sqlx::query(
        "INSERT INTO exchange_reviews (user_id, program_id, rating, review_text) VALUES (?, ?, 6, 'too good')",
    )
    .bind(user)
    .bind(program)
    .execute(&pool)
    .await;
    assert!(out_of_range.is_err());

    let average: f64 = sqlx::query_scalar("SELECT cached_average_rating FROM exchange_programs WHERE id = ?")
        .bind(program)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(average, 0.0);
}
