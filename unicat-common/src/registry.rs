//! Enrollment, favorite and review registry
//!
//! Uniqueness rules:
//! - one enrollment per user, across all programs
//! - one review per (user, program)
//! - a favorite row either exists or it does not
//!
//! Each rule is a UNIQUE constraint in the schema. The existence checks
//! below only produce precise errors. Units of work that read before they
//! write run under `BEGIN IMMEDIATE`, so concurrent duplicates are
//! serialized and the loser sees the winner's row; a single-statement
//! insert that races past a check hits the constraint and gets the same
//! error.

use crate::db::begin_immediate;
use crate::db::catalog::ensure_program_exists;
use crate::db::models::{DisconnectOutcome, Enrollment, FavoriteToggle, NewEnrollment, NewReview, Review};
use crate::db::users::ensure_user_exists;
use crate::rating::{self, whole_stars, MAX_STARS};
use crate::uuid_utils::parse_guid;
use crate::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

pub(crate) const REVIEW_COLUMNS: &str = r#"
    r.id, r.user_id, u.username, r.program_id, r.rating, r.review_text,
    r.academic_rating, r.housing_rating, r.social_rating, r.city_rating,
    r.tips, r.created_at
"#;

pub(crate) fn review_from_row(row: &SqliteRow) -> Result<Review> {
    Ok(Review {
        id: row.get("id"),
        user_id: parse_guid(row.get::<&str, _>("user_id"))?,
        username: row.get("username"),
        program_id: row.get("program_id"),
        rating: row.get("rating"),
        review_text: row.get("review_text"),
        academic_rating: row.get("academic_rating"),
        housing_rating: row.get("housing_rating"),
        social_rating: row.get("social_rating"),
        city_rating: row.get("city_rating"),
        tips: row.get("tips"),
        created_at: row.get("created_at"),
    })
}

pub(crate) fn enrollment_from_row(row: &SqliteRow) -> Result<Enrollment> {
    Ok(Enrollment {
        id: row.get("id"),
        user_id: parse_guid(row.get::<&str, _>("user_id"))?,
        program_id: row.get("program_id"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        contact_info: row.get("contact_info"),
        interests: row.get("interests"),
    })
}

/// Connect a user to an exchange program
///
/// Fails with `AlreadyEnrolled` when the user has any enrollment, whether in
/// this program or another one.
pub async fn enroll(
    db: &SqlitePool,
    user: Uuid,
    program_id: i64,
    enrollment: &NewEnrollment,
) -> Result<Enrollment> {
    if enrollment.end_date < enrollment.start_date {
        return Err(Error::InvalidInput(format!(
            "End date {} is before start date {}",
            enrollment.end_date, enrollment.start_date
        )));
    }
    if enrollment.contact_info.trim().is_empty() {
        return Err(Error::InvalidInput("Contact info is required".to_string()));
    }

    let mut conn = db.acquire().await?;
    ensure_program_exists(&mut conn, program_id).await?;
    ensure_user_exists(&mut conn, user).await?;

    let current: Option<i64> =
        sqlx::query_scalar("SELECT program_id FROM exchange_participants WHERE user_id = ?")
            .bind(user.to_string())
            .fetch_optional(&mut *conn)
            .await?;

    if let Some(current) = current {
        info!(
            "User {} tried to connect to program {} while connected to {}",
            user, program_id, current
        );
        return Err(Error::AlreadyEnrolled { user });
    }

    let inserted = sqlx::query(
        r#"
        INSERT INTO exchange_participants
            (user_id, program_id, start_date, end_date, contact_info, interests)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user.to_string())
    .bind(program_id)
    .bind(enrollment.start_date)
    .bind(enrollment.end_date)
    .bind(&enrollment.contact_info)
    .bind(&enrollment.interests)
    .execute(&mut *conn)
    .await
    .map_err(Error::from);

    let id = match inserted {
        Ok(result) => result.last_insert_rowid(),
        Err(e) if e.is_unique_violation() => {
            warn!("Concurrent enrollment for user {} rejected by constraint", user);
            return Err(Error::AlreadyEnrolled { user });
        }
        Err(e) => return Err(e),
    };

    info!("User {} connected to program {}", user, program_id);

    Ok(Enrollment {
        id,
        user_id: user,
        program_id,
        start_date: enrollment.start_date,
        end_date: enrollment.end_date,
        contact_info: enrollment.contact_info.clone(),
        interests: enrollment.interests.clone(),
    })
}

/// Remove the user's enrollment in this program, if there is one
pub async fn disconnect(db: &SqlitePool, user: Uuid, program_id: i64) -> Result<DisconnectOutcome> {
    let mut conn = db.acquire().await?;
    ensure_program_exists(&mut conn, program_id).await?;

    let result = sqlx::query("DELETE FROM exchange_participants WHERE user_id = ? AND program_id = ?")
        .bind(user.to_string())
        .bind(program_id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() > 0 {
        info!("User {} disconnected from program {}", user, program_id);
        Ok(DisconnectOutcome::Disconnected)
    } else {
        Ok(DisconnectOutcome::NotConnected)
    }
}

/// Flip the favorite state of a program for a user
///
/// Deleting first means the common "remove" path is one statement; the
/// insert uses OR IGNORE so a concurrent duplicate still ends favorited.
pub async fn toggle_favorite(db: &SqlitePool, user: Uuid, program_id: i64) -> Result<FavoriteToggle> {
    let mut tx = begin_immediate(db).await?;
    ensure_program_exists(&mut tx, program_id).await?;
    ensure_user_exists(&mut tx, user).await?;

    let removed = sqlx::query("DELETE FROM favorite_programs WHERE user_id = ? AND program_id = ?")
        .bind(user.to_string())
        .bind(program_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let outcome = if removed > 0 {
        FavoriteToggle::Removed
    } else {
        sqlx::query("INSERT OR IGNORE INTO favorite_programs (user_id, program_id) VALUES (?, ?)")
            .bind(user.to_string())
            .bind(program_id)
            .execute(&mut *tx)
            .await?;
        FavoriteToggle::Added
    };

    tx.commit().await?;

    info!("User {} favorite on program {}: {:?}", user, program_id, outcome);
    Ok(outcome)
}

/// Program ids the user has favorited
pub async fn favorite_program_ids(db: &SqlitePool, user: Uuid) -> Result<Vec<i64>> {
    let ids = sqlx::query_scalar("SELECT program_id FROM favorite_programs WHERE user_id = ? ORDER BY program_id")
        .bind(user.to_string())
        .fetch_all(db)
        .await?;
    Ok(ids)
}

/// Whole-star rating and required fields of a review form
fn validate_review(review: &NewReview) -> Result<i64> {
    let rating = whole_stars(review.rating);
    if rating < 1 || rating > i64::from(MAX_STARS) {
        return Err(Error::InvalidInput(format!(
            "Rating must be between 1 and {} stars, got {}",
            MAX_STARS, review.rating
        )));
    }
    if review.review_text.trim().is_empty() {
        return Err(Error::InvalidInput("Review text is required".to_string()));
    }

    let sub_ratings = [
        ("academic_rating", review.academic_rating),
        ("housing_rating", review.housing_rating),
        ("social_rating", review.social_rating),
        ("city_rating", review.city_rating),
    ];
    for (field, value) in sub_ratings {
        if let Some(value) = value {
            if !(0.0..=f64::from(MAX_STARS)).contains(&value) {
                return Err(Error::InvalidInput(format!(
                    "{} must be between 0 and {}, got {}",
                    field, MAX_STARS, value
                )));
            }
        }
    }

    Ok(rating)
}

async fn is_enrolled(conn: &mut SqliteConnection, user: Uuid, program_id: i64) -> Result<bool> {
    let enrolled = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM exchange_participants WHERE user_id = ? AND program_id = ?)",
    )
    .bind(user.to_string())
    .bind(program_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(enrolled)
}

async fn has_reviewed(conn: &mut SqliteConnection, user: Uuid, program_id: i64) -> Result<bool> {
    let reviewed = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM exchange_reviews WHERE user_id = ? AND program_id = ?)",
    )
    .bind(user.to_string())
    .bind(program_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(reviewed)
}

/// Store a review and fold it into the program's cached average
///
/// Insert and rating update share one transaction; any failure rolls both
/// back, so a rejected review never touches the average.
pub async fn submit_review(
    db: &SqlitePool,
    user: Uuid,
    program_id: i64,
    review: &NewReview,
) -> Result<Review> {
    let mut tx = begin_immediate(db).await?;
    ensure_program_exists(&mut tx, program_id).await?;

    if !is_enrolled(&mut tx, user, program_id).await? {
        return Err(Error::NotEnrolled { user, program_id });
    }
    if has_reviewed(&mut tx, user, program_id).await? {
        return Err(Error::AlreadyReviewed { user, program_id });
    }

    let rating = validate_review(review)?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO exchange_reviews
            (user_id, program_id, rating, review_text, academic_rating,
             housing_rating, social_rating, city_rating, tips)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user.to_string())
    .bind(program_id)
    .bind(rating)
    .bind(&review.review_text)
    .bind(review.academic_rating)
    .bind(review.housing_rating)
    .bind(review.social_rating)
    .bind(review.city_rating)
    .bind(&review.tips)
    .execute(&mut *tx)
    .await
    .map_err(Error::from);

    let review_id = match inserted {
        Ok(result) => result.last_insert_rowid(),
        Err(e) if e.is_unique_violation() => {
            warn!("Concurrent review by user {} on program {} rejected by constraint", user, program_id);
            return Err(Error::AlreadyReviewed { user, program_id });
        }
        Err(e) => return Err(e),
    };

    let average = rating::apply_new_rating(&mut tx, program_id, rating as f64).await?;

    let sql = format!(
        "SELECT {} FROM exchange_reviews r JOIN users u ON r.user_id = u.guid WHERE r.id = ?",
        REVIEW_COLUMNS
    );
    let row = sqlx::query(&sql).bind(review_id).fetch_one(&mut *tx).await?;
    let stored = review_from_row(&row)?;

    tx.commit().await?;

    info!(
        "User {} reviewed program {} with {} stars (average now {:.2})",
        user, program_id, rating, average
    );
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(rating: f64, text: &str) -> NewReview {
        NewReview {
            rating,
            review_text: text.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_review_truncates_rating() {
        assert_eq!(validate_review(&form(4.9, "Great")).unwrap(), 4);
        assert_eq!(validate_review(&form(5.0, "Great")).unwrap(), 5);
    }

    #[test]
    fn test_validate_review_rejects_missing_fields() {
        assert!(matches!(validate_review(&form(0.0, "text")), Err(Error::InvalidInput(_))));
        assert!(matches!(validate_review(&form(0.9, "text")), Err(Error::InvalidInput(_))));
        assert!(matches!(validate_review(&form(6.0, "text")), Err(Error::InvalidInput(_))));
        assert!(matches!(validate_review(&form(3.0, "   ")), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_validate_review_sub_rating_range() {
        let mut review = form(3.0, "ok");
        review.housing_rating = Some(4.5);
        assert!(validate_review(&review).is_ok());

        review.city_rating = Some(5.5);
        assert!(matches!(validate_review(&review), Err(Error::InvalidInput(_))));
    }
}
