//! Database schema migrations
//!
//! Versioned migrations tracked in the `schema_version` table. Tables are
//! created with their current shape by `init`; migrations upgrade databases
//! created by earlier releases and must stay idempotent.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - add a new one for each change
//! 2. **Check before altering** - a migration may run against a fresh schema
//! 3. **Use ALTER TABLE** - prefer it over DROP/CREATE to preserve data

use crate::db::catalog::fold_university;
use crate::Result;
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
const CURRENT_SCHEMA_VERSION: i32 = 3;

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

/// Set schema version in database
async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("Migration v2 completed");
    }

    if current_version < 3 {
        migrate_v3(pool).await?;
        set_schema_version(pool, 3).await?;
        info!("Migration v3 completed");
    }

    Ok(())
}

/// Migration v1: add `interests` to exchange_participants
///
/// Early databases stored only dates and contact info for a participant.
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    let has_column: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('exchange_participants') WHERE name = 'interests'",
    )
    .fetch_one(pool)
    .await?;

    if has_column > 0 {
        return Ok(());
    }

    match sqlx::query("ALTER TABLE exchange_participants ADD COLUMN interests TEXT NOT NULL DEFAULT ''")
        .execute(pool)
        .await
    {
        Ok(_) => {
            info!("  Added interests column to exchange_participants");
            Ok(())
        }
        Err(sqlx::Error::Database(db_err)) if db_err.message().contains("duplicate column") => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Migration v2: rebuild every cached average rating
///
/// Databases written before the cache was maintained in the review
/// transaction can hold stale averages.
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE exchange_programs
        SET cached_average_rating = COALESCE(
            (SELECT AVG(CAST(rating AS REAL)) FROM exchange_reviews r
             WHERE r.program_id = exchange_programs.id),
            0
        )
        "#,
    )
    .execute(pool)
    .await?;

    info!("  Recomputed cached ratings for {} programs", result.rows_affected());
    Ok(())
}

/// Migration v3: add and backfill `university_folded` on exchange_programs
///
/// The directory search matches against this lowercased copy; SQLite cannot
/// fold non-ASCII letters itself, so the backfill runs here.
async fn migrate_v3(pool: &SqlitePool) -> Result<()> {
    let has_column: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('exchange_programs') WHERE name = 'university_folded'",
    )
    .fetch_one(pool)
    .await?;

    if has_column == 0 {
        match sqlx::query(
            "ALTER TABLE exchange_programs ADD COLUMN university_folded TEXT NOT NULL DEFAULT ''",
        )
        .execute(pool)
        .await
        {
            Ok(_) => info!("  Added university_folded column to exchange_programs"),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("duplicate column") => {}
            Err(e) => return Err(e.into()),
        }
    }

    let rows = sqlx::query("SELECT id, university FROM exchange_programs")
        .fetch_all(pool)
        .await?;

    let mut tx = pool.begin().await?;
    for row in &rows {
        let university: String = row.get("university");
        sqlx::query("UPDATE exchange_programs SET university_folded = ? WHERE id = ?")
            .bind(fold_university(&university))
            .bind(row.get::<i64, _>("id"))
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    info!("  Folded university names for {} programs", rows.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_schema_version_no_table() {
        let pool = setup_test_db().await;
        let version = get_schema_version(&pool).await.unwrap();
        assert_eq!(version, 0);
    }

    #[tokio::test]
    async fn test_migrate_v1_adds_interests_to_old_table() {
        let pool = setup_test_db().await;

        sqlx::query(
            "CREATE TABLE exchange_participants (id INTEGER PRIMARY KEY, user_id TEXT, program_id INTEGER, contact_info TEXT)",
        )
        .execute(&pool)
        .await
        .unwrap();

        migrate_v1(&pool).await.unwrap();
        // Second run is a no-op
        migrate_v1(&pool).await.unwrap();

        let has_column: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pragma_table_info('exchange_participants') WHERE name = 'interests'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(has_column, 1);
    }

    #[tokio::test]
    async fn test_migrate_v2_backfills_stale_average() {
        let pool = setup_test_db().await;

        sqlx::query("CREATE TABLE exchange_programs (id INTEGER PRIMARY KEY, cached_average_rating REAL NOT NULL DEFAULT 0)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("CREATE TABLE exchange_reviews (id INTEGER PRIMARY KEY, program_id INTEGER, rating INTEGER)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO exchange_programs (id, cached_average_rating) VALUES (1, 1.0), (2, 3.0)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO exchange_reviews (program_id, rating) VALUES (1, 5), (1, 4)")
            .execute(&pool)
            .await
            .unwrap();

        migrate_v2(&pool).await.unwrap();

        let averages: Vec<f64> =
            sqlx::query_scalar("SELECT cached_average_rating FROM exchange_programs ORDER BY id")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(averages, vec![4.5, 0.0]);
    }

    #[tokio::test]
    async fn test_migrate_v3_folds_existing_names() {
        let pool = setup_test_db().await;

        sqlx::query("CREATE TABLE exchange_programs (id INTEGER PRIMARY KEY, university TEXT NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO exchange_programs (id, university) VALUES (1, 'UNIVERSITÀ DI BOLOGNA'), (2, 'TU München')")
            .execute(&pool)
            .await
            .unwrap();

        migrate_v3(&pool).await.unwrap();
        // Second run only refreshes the folded names
        migrate_v3(&pool).await.unwrap();

        let folded: Vec<String> =
            sqlx::query_scalar("SELECT university_folded FROM exchange_programs ORDER BY id")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(folded, vec!["università di bologna", "tu münchen"]);
    }
}
