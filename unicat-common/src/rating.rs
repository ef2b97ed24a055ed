//! Rating aggregation for exchange programs
//!
//! Each program stores a denormalized `cached_average_rating`. A new review
//! updates it in O(1) from the previous (count, average) pair inside the
//! review's transaction; [`recompute`] rebuilds it from all reviews and is
//! the repair path after bulk deletes.
//!
//! Ratings are whole stars. Input is truncated (`4.9` counts as `4`), which
//! is intentional: storage could hold fractions but the overall rating is
//! always shown and averaged as an integer number of stars.
//!
//! The incremental update must run exactly once per persisted review.
//! Running it twice double-counts; nothing here detects that.

use crate::db::catalog::ensure_program_exists;
use crate::Result;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

/// Highest star value
pub const MAX_STARS: u8 = 5;

/// Coerce a submitted rating to whole stars
pub fn whole_stars(rating: f64) -> i64 {
    rating.trunc() as i64
}

/// Running (count, average) pair for one program
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RatingAggregate {
    pub count: u64,
    pub average: f64,
}

impl RatingAggregate {
    /// Fold one more rating into the average and return the new value
    ///
    /// `new_avg = (old_avg * old_count + rating) / (old_count + 1)`
    pub fn apply(&mut self, rating: f64) -> f64 {
        let rating = whole_stars(rating) as f64;
        self.average = if self.count == 0 {
            rating
        } else {
            (self.average * self.count as f64 + rating) / (self.count + 1) as f64
        };
        self.count += 1;
        self.average
    }

    /// Full rescan; 0 for an empty slice
    pub fn from_ratings(ratings: &[i64]) -> Self {
        if ratings.is_empty() {
            return Self::default();
        }
        let sum: i64 = ratings.iter().sum();
        Self {
            count: ratings.len() as u64,
            average: sum as f64 / ratings.len() as f64,
        }
    }
}

/// Floor of an average (or of a half-star sub-rating)
pub fn full_stars(average: f64) -> u8 {
    average.max(0.0).floor() as u8
}

pub fn has_half_star(average: f64) -> bool {
    average - average.floor() >= 0.5
}

/// Stars left blank after the full and half stars
pub fn empty_stars(average: f64) -> u8 {
    let used = full_stars(average) + u8::from(has_half_star(average));
    MAX_STARS.saturating_sub(used)
}

/// Full/half/empty split of a star value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StarDisplay {
    pub full: u8,
    pub half: bool,
    pub empty: u8,
}

impl StarDisplay {
    pub fn from_value(value: f64) -> Self {
        Self {
            full: full_stars(value),
            half: has_half_star(value),
            empty: empty_stars(value),
        }
    }
}

/// Share of reviews with one exact star value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StarShare {
    pub stars: u8,
    pub percentage: u32,
}

/// Percentages for stars 5 down to 1
///
/// Each share is rounded on its own (ties to even), so the total may be 99
/// or 101. That is accepted and not corrected.
pub fn histogram_from_ratings(ratings: &[i64]) -> Vec<StarShare> {
    let total = ratings.len();
    (1..=MAX_STARS)
        .rev()
        .map(|stars| {
            let matching = ratings.iter().filter(|r| **r == i64::from(stars)).count();
            let percentage = if total > 0 {
                (matching as f64 / total as f64 * 100.0).round_ties_even() as u32
            } else {
                0
            };
            StarShare { stars, percentage }
        })
        .collect()
}

/// Everything a program page shows about its rating
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingSummary {
    pub program_id: i64,
    pub average_rating: f64,
    pub full_stars: u8,
    pub has_half_star: bool,
    pub empty_stars: u8,
    pub total_ratings: i64,
    pub breakdown: Vec<StarShare>,
}

async fn program_ratings(conn: &mut SqliteConnection, program_id: i64) -> Result<Vec<i64>> {
    let ratings = sqlx::query_scalar("SELECT rating FROM exchange_reviews WHERE program_id = ?")
        .bind(program_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(ratings)
}

async fn store_average(conn: &mut SqliteConnection, program_id: i64, average: f64) -> Result<()> {
    sqlx::query("UPDATE exchange_programs SET cached_average_rating = ? WHERE id = ?")
        .bind(average)
        .bind(program_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Incrementally fold a just-persisted review into the cached average
///
/// Call on the same connection/transaction that inserted the review, right
/// after the insert: the previous count is the current count minus one.
pub async fn apply_new_rating(conn: &mut SqliteConnection, program_id: i64, rating: f64) -> Result<f64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM exchange_reviews WHERE program_id = ?")
        .bind(program_id)
        .fetch_one(&mut *conn)
        .await?;

    let old_average: f64 =
        sqlx::query_scalar("SELECT cached_average_rating FROM exchange_programs WHERE id = ?")
            .bind(program_id)
            .fetch_one(&mut *conn)
            .await?;

    let mut aggregate = RatingAggregate {
        count: (count - 1).max(0) as u64,
        average: old_average,
    };
    let average = aggregate.apply(rating);
    store_average(conn, program_id, average).await?;

    debug!(
        "Program {} average {:.3} -> {:.3} ({} reviews)",
        program_id, old_average, average, aggregate.count
    );
    Ok(average)
}

/// Rebuild the cached average from every review of the program
pub async fn recompute(db: &SqlitePool, program_id: i64) -> Result<f64> {
    let mut conn = db.acquire().await?;
    ensure_program_exists(&mut conn, program_id).await?;
    recompute_with(&mut conn, program_id).await
}

pub(crate) async fn recompute_with(conn: &mut SqliteConnection, program_id: i64) -> Result<f64> {
    let ratings = program_ratings(conn, program_id).await?;
    let aggregate = RatingAggregate::from_ratings(&ratings);
    store_average(conn, program_id, aggregate.average).await?;

    debug!(
        "Recomputed program {} average {:.3} from {} reviews",
        program_id, aggregate.average, aggregate.count
    );
    Ok(aggregate.average)
}

/// Cached average, as maintained by the aggregator
pub async fn average_rating(db: &SqlitePool, program_id: i64) -> Result<f64> {
    sqlx::query_scalar("SELECT cached_average_rating FROM exchange_programs WHERE id = ?")
        .bind(program_id)
        .fetch_optional(db)
        .await?
        .ok_or(crate::Error::ProgramNotFound(program_id))
}

pub async fn total_ratings(db: &SqlitePool, program_id: i64) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM exchange_reviews WHERE program_id = ?")
        .bind(program_id)
        .fetch_one(db)
        .await?;
    Ok(count)
}

pub async fn rating_histogram(db: &SqlitePool, program_id: i64) -> Result<Vec<StarShare>> {
    let mut conn = db.acquire().await?;
    ensure_program_exists(&mut conn, program_id).await?;
    let ratings = program_ratings(&mut conn, program_id).await?;
    Ok(histogram_from_ratings(&ratings))
}

/// Average, star split, count and breakdown in one read
///
/// Both reads share a transaction so the average and the breakdown come
/// from the same snapshot.
pub async fn rating_summary(db: &SqlitePool, program_id: i64) -> Result<RatingSummary> {
    let mut tx = db.begin().await?;
    let average: f64 = sqlx::query_scalar("SELECT cached_average_rating FROM exchange_programs WHERE id = ?")
        .bind(program_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(crate::Error::ProgramNotFound(program_id))?;
    let ratings = program_ratings(&mut tx, program_id).await?;
    tx.commit().await?;

    Ok(RatingSummary {
        program_id,
        average_rating: average,
        full_stars: full_stars(average),
        has_half_star: has_half_star(average),
        empty_stars: empty_stars(average),
        total_ratings: ratings.len() as i64,
        breakdown: histogram_from_ratings(&ratings),
    })
}
