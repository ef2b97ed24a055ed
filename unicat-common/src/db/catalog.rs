//! Countries and exchange programs
//!
//! Programs are produced by external import tooling; this module only
//! stores the validated records and reads them back.

use crate::db::models::{Country, ExchangeProgram, NewProgram};
use crate::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::info;

/// Column list shared by every query that yields an [`ExchangeProgram`]
pub(crate) const PROGRAM_COLUMNS: &str = r#"
    p.id, p.qs_index, p.university, p.city, p.rank, p.country_code,
    c.name AS country_name, p.size, p.focus, p.research, p.status,
    p.static_image, p.overall_score, p.cached_average_rating
"#;

pub(crate) fn program_from_row(row: &SqliteRow) -> ExchangeProgram {
    ExchangeProgram {
        id: row.get("id"),
        qs_index: row.get("qs_index"),
        university: row.get("university"),
        city: row.get("city"),
        rank: row.get("rank"),
        country_code: row.get("country_code"),
        country_name: row.get("country_name"),
        size: row.get("size"),
        focus: row.get("focus"),
        research: row.get("research"),
        status: row.get("status"),
        static_image: row.get("static_image"),
        overall_score: row.get("overall_score"),
        cached_average_rating: row.get("cached_average_rating"),
    }
}

/// Insert or rename a country
pub async fn upsert_country(db: &SqlitePool, country: &Country) -> Result<()> {
    if country.code.is_empty() || country.code.len() > 3 {
        return Err(Error::InvalidInput(format!(
            "Country code must be 1-3 characters: '{}'",
            country.code
        )));
    }

    sqlx::query(
        r#"
        INSERT INTO countries (code, name) VALUES (?, ?)
        ON CONFLICT(code) DO UPDATE SET name = excluded.name
        "#,
    )
    .bind(&country.code)
    .bind(&country.name)
    .execute(db)
    .await?;

    Ok(())
}

/// Lowercased university name used for case-insensitive search
///
/// SQLite `LIKE` only folds ASCII, so names such as "UNIVERSITÀ" are folded
/// here and stored next to the original.
pub(crate) fn fold_university(name: &str) -> String {
    name.to_lowercase()
}

/// Store a validated program record, returning its id
pub async fn insert_program(db: &SqlitePool, program: &NewProgram) -> Result<i64> {
    if program.university.trim().is_empty() {
        return Err(Error::InvalidInput("University name is required".to_string()));
    }

    let id = sqlx::query(
        r#"
        INSERT INTO exchange_programs
            (qs_index, university, university_folded, city, rank, country_code,
             size, focus, research, status, static_image, overall_score)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(program.qs_index)
    .bind(&program.university)
    .bind(fold_university(&program.university))
    .bind(&program.city)
    .bind(&program.rank)
    .bind(&program.country_code)
    .bind(&program.size)
    .bind(&program.focus)
    .bind(&program.research)
    .bind(&program.status)
    .bind(&program.static_image)
    .bind(program.overall_score)
    .execute(db)
    .await?
    .last_insert_rowid();

    info!("Added exchange program {} ({})", id, program.university);
    Ok(id)
}

/// Load a program with its country name
pub async fn get_program(db: &SqlitePool, program_id: i64) -> Result<ExchangeProgram> {
    let sql = format!(
        "SELECT {} FROM exchange_programs p LEFT JOIN countries c ON p.country_code = c.code WHERE p.id = ?",
        PROGRAM_COLUMNS
    );

    let row = sqlx::query(&sql)
        .bind(program_id)
        .fetch_optional(db)
        .await?
        .ok_or(Error::ProgramNotFound(program_id))?;

    Ok(program_from_row(&row))
}

/// Fail with `ProgramNotFound` unless the program exists
pub(crate) async fn ensure_program_exists(conn: &mut SqliteConnection, program_id: i64) -> Result<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM exchange_programs WHERE id = ?)")
        .bind(program_id)
        .fetch_one(&mut *conn)
        .await?;

    if exists {
        Ok(())
    } else {
        Err(Error::ProgramNotFound(program_id))
    }
}

/// Delete a program; reviews, enrollments and favorites cascade with it
pub async fn delete_program(db: &SqlitePool, program_id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM exchange_programs WHERE id = ?")
        .bind(program_id)
        .execute(db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::ProgramNotFound(program_id));
    }

    info!("Deleted exchange program {}", program_id);
    Ok(())
}
