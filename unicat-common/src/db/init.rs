//! Database initialization
//!
//! Creates the database on first run, applies connection pragmas on every
//! pooled connection, creates missing tables and runs pending migrations.
//! The uniqueness rules of the exchange directory live here as table
//! constraints so concurrent requests cannot slip past an application check.

use crate::config::DatabaseConfig;
use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path, config: &DatabaseConfig) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Pragmas are set through connect options so that every connection in
    // the pool gets them, not just the first one.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables (idempotent) and run pending migrations
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_users_table(pool).await?;
    create_countries_table(pool).await?;
    create_exchange_programs_table(pool).await?;
    create_exchange_participants_table(pool).await?;
    create_favorite_programs_table(pool).await?;
    create_exchange_reviews_table(pool).await?;

    crate::db::migrations::run_migrations(pool).await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            guid TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            university TEXT NOT NULL DEFAULT '',
            is_institution INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_countries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS countries (
            code TEXT PRIMARY KEY CHECK (length(code) <= 3),
            name TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_exchange_programs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS exchange_programs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            qs_index INTEGER,
            university TEXT NOT NULL,
            university_folded TEXT NOT NULL DEFAULT '',
            city TEXT,
            rank TEXT,
            country_code TEXT REFERENCES countries(code) ON DELETE SET NULL,
            size TEXT,
            focus TEXT,
            research TEXT,
            status TEXT,
            static_image TEXT,
            overall_score REAL,
            cached_average_rating REAL NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_exchange_programs_country ON exchange_programs(country_code)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Enrollments: UNIQUE(user_id) gives one enrollment per user system-wide,
/// which also covers the per-program pair.
async fn create_exchange_participants_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS exchange_participants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL UNIQUE REFERENCES users(guid) ON DELETE CASCADE,
            program_id INTEGER NOT NULL REFERENCES exchange_programs(id) ON DELETE CASCADE,
            start_date DATE NOT NULL,
            end_date DATE NOT NULL,
            contact_info TEXT NOT NULL,
            interests TEXT NOT NULL DEFAULT '',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_exchange_participants_program ON exchange_participants(program_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_favorite_programs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS favorite_programs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL REFERENCES users(guid) ON DELETE CASCADE,
            program_id INTEGER NOT NULL REFERENCES exchange_programs(id) ON DELETE CASCADE,
            UNIQUE (user_id, program_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_exchange_reviews_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS exchange_reviews (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL REFERENCES users(guid) ON DELETE CASCADE,
            program_id INTEGER NOT NULL REFERENCES exchange_programs(id) ON DELETE CASCADE,
            rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
            review_text TEXT NOT NULL,
            academic_rating REAL,
            housing_rating REAL,
            social_rating REAL,
            city_rating REAL,
            tips TEXT NOT NULL DEFAULT '',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (user_id, program_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_exchange_reviews_program ON exchange_reviews(program_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
