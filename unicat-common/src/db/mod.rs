//! Database models and queries

pub mod catalog;
pub mod init;
pub mod migrations;
pub mod models;
pub mod users;

pub use init::*;
pub use migrations::*;
pub use models::*;

use crate::Result;
use sqlx::{Sqlite, SqlitePool, Transaction};

/// Open a transaction that holds the write lock from its first statement
///
/// A deferred transaction that reads before writing cannot be upgraded once
/// another writer commits; SQLite answers SQLITE_BUSY without waiting.
/// Taking the lock up front makes concurrent units of work queue on the
/// busy timeout instead, so their existence checks see committed rows.
pub async fn begin_immediate(db: &SqlitePool) -> Result<Transaction<'static, Sqlite>> {
    Ok(db.begin_with("BEGIN IMMEDIATE").await?)
}
