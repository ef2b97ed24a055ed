//! User records
//!
//! Accounts, passwords and email verification are handled by the
//! authentication front end. The exchange core only needs a stable guid, a
//! display name and the institution flag.

use crate::db::begin_immediate;
use crate::db::models::User;
use crate::rating;
use crate::uuid_utils::{generate, parse_guid};
use crate::{Error, Result};
use sqlx::{Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

/// Register a user known to the authentication layer
pub async fn create_user(
    db: &SqlitePool,
    username: &str,
    university: &str,
    is_institution: bool,
) -> Result<User> {
    if username.trim().is_empty() {
        return Err(Error::InvalidInput("Username is required".to_string()));
    }

    let user = User {
        guid: generate(),
        username: username.to_string(),
        university: university.to_string(),
        is_institution,
    };

    let inserted = sqlx::query(
        "INSERT INTO users (guid, username, university, is_institution) VALUES (?, ?, ?, ?)",
    )
    .bind(user.guid.to_string())
    .bind(&user.username)
    .bind(&user.university)
    .bind(user.is_institution)
    .execute(db)
    .await
    .map_err(Error::from);

    match inserted {
        Ok(_) => {
            info!("Created user {} ({})", user.username, user.guid);
            Ok(user)
        }
        Err(e) if e.is_unique_violation() => Err(Error::InvalidInput(format!(
            "Username already taken: {}",
            username
        ))),
        Err(e) => Err(e),
    }
}

pub async fn get_user(db: &SqlitePool, guid: Uuid) -> Result<User> {
    let row = sqlx::query("SELECT guid, username, university, is_institution FROM users WHERE guid = ?")
        .bind(guid.to_string())
        .fetch_optional(db)
        .await?
        .ok_or(Error::UserNotFound(guid))?;

    Ok(User {
        guid: parse_guid(row.get::<&str, _>("guid"))?,
        username: row.get("username"),
        university: row.get("university"),
        is_institution: row.get("is_institution"),
    })
}

/// Delete a user and everything that cascades with them
///
/// Cascading reviews would leave stale cached averages behind, so the
/// affected programs are recomputed in the same transaction.
pub async fn delete_user(db: &SqlitePool, guid: Uuid) -> Result<()> {
    let mut tx = begin_immediate(db).await?;

    let reviewed: Vec<i64> =
        sqlx::query_scalar("SELECT program_id FROM exchange_reviews WHERE user_id = ?")
            .bind(guid.to_string())
            .fetch_all(&mut *tx)
            .await?;

    let result = sqlx::query("DELETE FROM users WHERE guid = ?")
        .bind(guid.to_string())
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::UserNotFound(guid));
    }

    for program_id in &reviewed {
        rating::recompute_with(&mut *tx, *program_id).await?;
    }

    tx.commit().await?;

    info!(
        "Deleted user {} and recomputed {} program ratings",
        guid,
        reviewed.len()
    );
    Ok(())
}

/// Fail with `UserNotFound` unless the user exists
pub(crate) async fn ensure_user_exists(conn: &mut sqlx::SqliteConnection, guid: Uuid) -> Result<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE guid = ?)")
        .bind(guid.to_string())
        .fetch_one(&mut *conn)
        .await?;

    if exists {
        Ok(())
    } else {
        Err(Error::UserNotFound(guid))
    }
}
