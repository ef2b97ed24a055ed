//! Test fixtures for unicat-common integration tests
//!
//! Each test gets its own database file inside a temporary directory; the
//! directory is removed when the returned [`TestDb`] is dropped.

#![allow(dead_code)]

use chrono::NaiveDate;
use sqlx::SqlitePool;
use tempfile::TempDir;
use unicat_common::config::DatabaseConfig;
use unicat_common::db::catalog::{insert_program, upsert_country};
use unicat_common::db::init::init_database;
use unicat_common::db::models::{Country, NewEnrollment, NewProgram, NewReview, User};
use unicat_common::db::users::create_user;

pub struct TestDb {
    pub pool: SqlitePool,
    _dir: TempDir,
}

pub async fn setup_test_db() -> TestDb {
    let dir = tempfile::tempdir().expect("create temp dir");
    let pool = init_database(&dir.path().join("unicat.db"), &DatabaseConfig::default())
        .await
        .expect("init database");
    TestDb { pool, _dir: dir }
}

pub async fn add_country(pool: &SqlitePool, code: &str, name: &str) {
    upsert_country(
        pool,
        &Country {
            code: code.to_string(),
            name: name.to_string(),
        },
    )
    .await
    .expect("insert country");
}

pub async fn add_program(pool: &SqlitePool, university: &str, country_code: &str, qs_index: i64) -> i64 {
    insert_program(
        pool,
        &NewProgram {
            qs_index: Some(qs_index),
            university: university.to_string(),
            country_code: Some(country_code.to_string()),
            ..Default::default()
        },
    )
    .await
    .expect("insert program")
}

pub async fn add_student(pool: &SqlitePool, username: &str) -> User {
    create_user(pool, username, "UB", false).await.expect("create user")
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn enrollment() -> NewEnrollment {
    NewEnrollment {
        start_date: date(2025, 9, 1),
        end_date: date(2026, 1, 31),
        contact_info: "@student on telegram".to_string(),
        interests: "hiking, jazz".to_string(),
    }
}

pub fn review(rating: f64) -> NewReview {
    NewReview {
        rating,
        review_text: "Great semester".to_string(),
        ..Default::default()
    }
}

pub async fn cached_average(pool: &SqlitePool, program_id: i64) -> f64 {
    sqlx::query_scalar("SELECT cached_average_rating FROM exchange_programs WHERE id = ?")
        .bind(program_id)
        .fetch_one(pool)
        .await
        .expect("read cached average")
}
