//! Exchange program directory queries
//!
//! Read side of the exchange feature: the filtered, paginated program list,
//! the program page with its participants and reviews, and the viewer's
//! current program. Everything is computed for one viewing user.

use crate::db::catalog::{fold_university, program_from_row, PROGRAM_COLUMNS};
use crate::db::models::{Enrollment, ExchangeProgram, Review, User};
use crate::pagination::calculate_pagination;
use crate::rating::{self, RatingSummary, StarDisplay};
use crate::registry::{enrollment_from_row, review_from_row, REVIEW_COLUMNS};
use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

/// Listing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Best QS ranking first (lowest index)
    #[default]
    QsIndex,
    RatingDesc,
    RatingAsc,
    NameAsc,
    NameDesc,
    /// Kept as the directory has always shipped it: highest index first
    QsRankAsc,
}

impl SortOrder {
    /// Parse a `sort` query value; unknown values fall back to the default
    pub fn from_param(value: &str) -> Self {
        match value {
            "rating_desc" => SortOrder::RatingDesc,
            "rating_asc" => SortOrder::RatingAsc,
            "name_asc" => SortOrder::NameAsc,
            "name_desc" => SortOrder::NameDesc,
            "qs_rank_asc" => SortOrder::QsRankAsc,
            _ => SortOrder::QsIndex,
        }
    }

    fn order_by(self) -> &'static str {
        match self {
            SortOrder::QsIndex => " ORDER BY p.qs_index IS NULL, p.qs_index ASC, p.id ASC",
            SortOrder::RatingDesc => " ORDER BY p.cached_average_rating DESC, p.id ASC",
            SortOrder::RatingAsc => " ORDER BY p.cached_average_rating ASC, p.id ASC",
            SortOrder::NameAsc => " ORDER BY p.university ASC, p.id ASC",
            SortOrder::NameDesc => " ORDER BY p.university DESC, p.id ASC",
            SortOrder::QsRankAsc => " ORDER BY p.qs_index DESC, p.id ASC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FavoritesFilter {
    Favorites,
    NotFavorites,
}

impl FavoritesFilter {
    pub fn from_param(value: &str) -> Option<Self> {
        match value {
            "favorites" => Some(FavoritesFilter::Favorites),
            "not_favorites" => Some(FavoritesFilter::NotFavorites),
            _ => None,
        }
    }
}

/// Directory filters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramFilter {
    /// Case-insensitive substring of the university name
    pub university: Option<String>,
    /// Country names; a program matches any of them
    pub countries: Vec<String>,
    pub favorites: Option<FavoritesFilter>,
    pub sort: SortOrder,
}

/// One program as listed for a viewer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramSummary {
    #[serde(flatten)]
    pub program: ExchangeProgram,
    pub average_rating: f64,
    pub full_stars: u8,
    pub has_half_star: bool,
    pub reviews_count: i64,
    pub participants_count: i64,
    pub is_favorite: bool,
    /// Viewer is enrolled in this program
    pub is_connected: bool,
    pub is_user_program: bool,
    /// Viewer is enrolled in some program
    pub has_user_program: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramPage {
    pub results: Vec<ProgramSummary>,
    /// Programs matching the filters
    pub count: i64,
    /// All listable programs, ignoring filters
    pub total_count: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

/// A fellow participant, shown so students heading to the same place can meet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Participant {
    pub user_id: Uuid,
    pub username: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub contact_info: String,
    pub interests: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewView {
    #[serde(flatten)]
    pub review: Review,
    pub stars: StarDisplay,
    pub academic_stars: Option<StarDisplay>,
    pub housing_stars: Option<StarDisplay>,
    pub social_stars: Option<StarDisplay>,
    pub city_stars: Option<StarDisplay>,
}

impl From<Review> for ReviewView {
    fn from(review: Review) -> Self {
        Self {
            stars: StarDisplay::from_value(review.rating as f64),
            academic_stars: review.academic_rating.map(StarDisplay::from_value),
            housing_stars: review.housing_rating.map(StarDisplay::from_value),
            social_stars: review.social_rating.map(StarDisplay::from_value),
            city_stars: review.city_rating.map(StarDisplay::from_value),
            review,
        }
    }
}

/// Program page for one viewer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramDetail {
    pub program: ProgramSummary,
    pub rating: RatingSummary,
    pub participants: Vec<Participant>,
    /// Newest first
    pub reviews: Vec<ReviewView>,
    pub is_registered: bool,
    pub user_has_reviewed: bool,
    pub is_registered_in_any_program: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentProgram {
    pub enrollment: Enrollment,
    pub program: ExchangeProgram,
}

/// Institution accounts may not browse or join exchange programs
pub fn ensure_exchange_access(user: &User) -> Result<()> {
    if user.is_institution {
        return Err(Error::Forbidden(
            "Institution accounts cannot use the exchange directory".to_string(),
        ));
    }
    Ok(())
}

/// Escape LIKE wildcards and wrap for substring matching
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

const FROM_PROGRAMS: &str = " FROM exchange_programs p LEFT JOIN countries c ON p.country_code = c.code";

fn push_summary_select(qb: &mut QueryBuilder<'_, Sqlite>, viewer: Uuid) {
    qb.push("SELECT ");
    qb.push(PROGRAM_COLUMNS);
    qb.push(
        r#",
        (SELECT COUNT(*) FROM exchange_reviews r WHERE r.program_id = p.id) AS reviews_count,
        (SELECT COUNT(*) FROM exchange_participants e WHERE e.program_id = p.id) AS participants_count,
        EXISTS(SELECT 1 FROM favorite_programs f WHERE f.program_id = p.id AND f.user_id = "#,
    );
    qb.push_bind(viewer.to_string());
    qb.push(") AS is_favorite");
    qb.push(FROM_PROGRAMS);
}

fn push_filters<'a>(
    qb: &mut QueryBuilder<'a, Sqlite>,
    viewer: Uuid,
    home_country_code: &'a str,
    filter: &'a ProgramFilter,
) {
    qb.push(" WHERE (p.country_code IS NULL OR p.country_code <> ");
    qb.push_bind(home_country_code);
    qb.push(")");

    if let Some(university) = filter.university.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        qb.push(" AND p.university_folded LIKE ");
        qb.push_bind(like_pattern(&fold_university(university)));
        qb.push(" ESCAPE '\\'");
    }

    if !filter.countries.is_empty() {
        qb.push(" AND c.name IN (");
        let mut names = qb.separated(", ");
        for country in &filter.countries {
            names.push_bind(country.as_str());
        }
        names.push_unseparated(")");
    }

    match filter.favorites {
        Some(FavoritesFilter::Favorites) => {
            qb.push(" AND p.id IN (SELECT program_id FROM favorite_programs WHERE user_id = ");
            qb.push_bind(viewer.to_string());
            qb.push(")");
        }
        Some(FavoritesFilter::NotFavorites) => {
            qb.push(" AND p.id NOT IN (SELECT program_id FROM favorite_programs WHERE user_id = ");
            qb.push_bind(viewer.to_string());
            qb.push(")");
        }
        None => {}
    }
}

fn summary_from_row(row: &SqliteRow, viewer_program: Option<i64>) -> ProgramSummary {
    let program = program_from_row(row);
    let average = program.cached_average_rating;
    let is_user_program = viewer_program == Some(program.id);

    ProgramSummary {
        average_rating: average,
        full_stars: rating::full_stars(average),
        has_half_star: rating::has_half_star(average),
        reviews_count: row.get("reviews_count"),
        participants_count: row.get("participants_count"),
        is_favorite: row.get("is_favorite"),
        is_connected: is_user_program,
        is_user_program,
        has_user_program: viewer_program.is_some(),
        program,
    }
}

async fn viewer_program_id(db: &SqlitePool, viewer: Uuid) -> Result<Option<i64>> {
    let program_id = sqlx::query_scalar("SELECT program_id FROM exchange_participants WHERE user_id = ?")
        .bind(viewer.to_string())
        .fetch_optional(db)
        .await?;
    Ok(program_id)
}

/// Filtered, sorted, paginated program list
///
/// Programs located in `home_country_code` are never listed.
pub async fn list_programs(
    db: &SqlitePool,
    viewer: Uuid,
    home_country_code: &str,
    filter: &ProgramFilter,
    requested_page: i64,
    page_size: i64,
) -> Result<ProgramPage> {
    let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*)");
    count_query.push(FROM_PROGRAMS);
    push_filters(&mut count_query, viewer, home_country_code, filter);
    let count: i64 = count_query.build_query_scalar().fetch_one(db).await?;

    let total_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM exchange_programs WHERE country_code IS NULL OR country_code <> ?",
    )
    .bind(home_country_code)
    .fetch_one(db)
    .await?;

    let pagination = calculate_pagination(count, requested_page, page_size);
    let viewer_program = viewer_program_id(db, viewer).await?;

    let mut page_query = QueryBuilder::<Sqlite>::new("");
    push_summary_select(&mut page_query, viewer);
    push_filters(&mut page_query, viewer, home_country_code, filter);
    page_query.push(filter.sort.order_by());
    page_query.push(" LIMIT ");
    page_query.push_bind(pagination.page_size);
    page_query.push(" OFFSET ");
    page_query.push_bind(pagination.offset);

    let rows = page_query.build().fetch_all(db).await?;
    let results = rows
        .iter()
        .map(|row| summary_from_row(row, viewer_program))
        .collect();

    Ok(ProgramPage {
        results,
        count,
        total_count,
        page: pagination.page,
        page_size: pagination.page_size,
        total_pages: pagination.total_pages,
    })
}

/// One program as listed for a viewer, regardless of its country
pub async fn program_summary(db: &SqlitePool, viewer: Uuid, program_id: i64) -> Result<ProgramSummary> {
    let mut query = QueryBuilder::<Sqlite>::new("");
    push_summary_select(&mut query, viewer);
    query.push(" WHERE p.id = ");
    query.push_bind(program_id);

    let row = query
        .build()
        .fetch_optional(db)
        .await?
        .ok_or(Error::ProgramNotFound(program_id))?;

    let viewer_program = viewer_program_id(db, viewer).await?;
    Ok(summary_from_row(&row, viewer_program))
}

pub async fn list_participants(db: &SqlitePool, program_id: i64) -> Result<Vec<Participant>> {
    let rows = sqlx::query(
        r#"
        SELECT e.user_id, u.username, e.start_date, e.end_date, e.contact_info, e.interests
        FROM exchange_participants e
        JOIN users u ON e.user_id = u.guid
        WHERE e.program_id = ?
        ORDER BY e.start_date ASC, u.username ASC
        "#,
    )
    .bind(program_id)
    .fetch_all(db)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(Participant {
                user_id: crate::uuid_utils::parse_guid(row.get::<&str, _>("user_id"))?,
                username: row.get("username"),
                start_date: row.get("start_date"),
                end_date: row.get("end_date"),
                contact_info: row.get("contact_info"),
                interests: row.get("interests"),
            })
        })
        .collect()
}

/// Reviews of a program, newest first
pub async fn list_reviews(db: &SqlitePool, program_id: i64) -> Result<Vec<Review>> {
    let sql = format!(
        "SELECT {} FROM exchange_reviews r JOIN users u ON r.user_id = u.guid WHERE r.program_id = ? ORDER BY r.created_at DESC, r.id DESC",
        REVIEW_COLUMNS
    );
    let rows = sqlx::query(&sql).bind(program_id).fetch_all(db).await?;
    rows.iter().map(review_from_row).collect()
}

/// Everything the program page shows
pub async fn program_detail(db: &SqlitePool, viewer: Uuid, program_id: i64) -> Result<ProgramDetail> {
    let program = program_summary(db, viewer, program_id).await?;
    let rating = rating::rating_summary(db, program_id).await?;
    let participants = list_participants(db, program_id).await?;
    let reviews = list_reviews(db, program_id).await?;

    let user_has_reviewed = reviews.iter().any(|r| r.user_id == viewer);

    Ok(ProgramDetail {
        is_registered: program.is_user_program,
        is_registered_in_any_program: program.has_user_program,
        user_has_reviewed,
        program,
        rating,
        participants,
        reviews: reviews.into_iter().map(ReviewView::from).collect(),
    })
}

/// The user's enrollment and its program, if any
pub async fn current_program(db: &SqlitePool, user: Uuid) -> Result<Option<CurrentProgram>> {
    let row = sqlx::query(
        "SELECT id, user_id, program_id, start_date, end_date, contact_info, interests FROM exchange_participants WHERE user_id = ?",
    )
    .bind(user.to_string())
    .fetch_optional(db)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let enrollment = enrollment_from_row(&row)?;
    let program = crate::db::catalog::get_program(db, enrollment.program_id).await?;
    Ok(Some(CurrentProgram { enrollment, program }))
}

/// Number of enrollments across all programs
pub async fn connection_count(db: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM exchange_participants")
        .fetch_one(db)
        .await?;
    Ok(count)
}
