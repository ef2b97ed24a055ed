//! Exchange program endpoints
//!
//! Listing, program page, enrollment, favorites and reviews. Mutations answer
//! with `{ "success", "message", ... }`.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::info;
use unicat_common::db::catalog::get_program;
use unicat_common::db::models::{DisconnectOutcome, NewEnrollment, NewReview};
use unicat_common::directory::{
    self, CurrentProgram, FavoritesFilter, ProgramDetail, ProgramFilter, ProgramPage, ReviewView,
    SortOrder,
};
use unicat_common::rating::{self, RatingSummary};
use unicat_common::registry;

use crate::api::ExchangeUser;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Directory query string
///
/// `country` may repeat, so the raw pairs are collected rather than
/// deserialized into a struct.
#[derive(Debug, Clone, PartialEq)]
pub struct ListParams {
    pub filter: ProgramFilter,
    pub page: i64,
}

impl ListParams {
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut filter = ProgramFilter::default();
        let mut page = 1;

        for (key, value) in pairs {
            match key.as_str() {
                "university" if !value.trim().is_empty() => {
                    filter.university = Some(value.trim().to_string());
                }
                "country" if !value.is_empty() => filter.countries.push(value.clone()),
                "favorites" => filter.favorites = FavoritesFilter::from_param(value),
                "sort" => filter.sort = SortOrder::from_param(value),
                // Non-numeric pages fall back to the first page
                "page" => page = value.parse().unwrap_or(1),
                _ => {}
            }
        }

        Self { filter, page }
    }
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// GET /api/programs
pub async fn list_programs(
    State(state): State<AppState>,
    user: ExchangeUser,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<ProgramPage>> {
    let params = ListParams::from_pairs(&pairs);
    let page = directory::list_programs(
        &state.db,
        user.guid(),
        &state.exchange.home_country_code,
        &params.filter,
        params.page,
        state.exchange.page_size,
    )
    .await?;
    Ok(Json(page))
}

/// GET /api/programs/:id
pub async fn get_program_detail(
    State(state): State<AppState>,
    user: ExchangeUser,
    Path(program_id): Path<i64>,
) -> ApiResult<Json<ProgramDetail>> {
    let detail = directory::program_detail(&state.db, user.guid(), program_id).await?;
    Ok(Json(detail))
}

/// GET /api/programs/:id/rating
pub async fn get_program_rating(
    State(state): State<AppState>,
    _user: ExchangeUser,
    Path(program_id): Path<i64>,
) -> ApiResult<Json<RatingSummary>> {
    let summary = rating::rating_summary(&state.db, program_id).await?;
    Ok(Json(summary))
}

/// POST /api/programs/:id/rating/recompute
pub async fn recompute_rating(
    State(state): State<AppState>,
    user: ExchangeUser,
    Path(program_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let average = rating::recompute(&state.db, program_id).await?;
    info!("User {} recomputed rating of program {}", user.0.username, program_id);

    Ok(Json(json!({
        "success": true,
        "message": "Rating recomputed",
        "average_rating": average,
    })))
}

/// POST /api/programs/:id/enroll
pub async fn enroll(
    State(state): State<AppState>,
    user: ExchangeUser,
    Path(program_id): Path<i64>,
    payload: Result<Json<NewEnrollment>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let form = json_body(payload)?;
    let program = get_program(&state.db, program_id).await?;
    let enrollment = registry::enroll(&state.db, user.guid(), program_id, &form).await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Successfully connected to {}", program.university),
        "enrollment": enrollment,
    })))
}

/// POST /api/programs/:id/disconnect
///
/// Not being connected is answered with 400 and `success: false`.
pub async fn disconnect(
    State(state): State<AppState>,
    user: ExchangeUser,
    Path(program_id): Path<i64>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let program = get_program(&state.db, program_id).await?;

    let response = match registry::disconnect(&state.db, user.guid(), program_id).await? {
        DisconnectOutcome::Disconnected => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": format!("Successfully disconnected from {}", program.university),
            })),
        ),
        DisconnectOutcome::NotConnected => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "message": "You are not connected to this program",
            })),
        ),
    };

    Ok(response)
}

/// POST /api/programs/:id/favorite
pub async fn toggle_favorite(
    State(state): State<AppState>,
    user: ExchangeUser,
    Path(program_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let program = get_program(&state.db, program_id).await?;
    let outcome = registry::toggle_favorite(&state.db, user.guid(), program_id).await?;

    let message = if outcome.is_favorite() {
        format!("Added {} to favorites", program.university)
    } else {
        format!("Removed {} from favorites", program.university)
    };

    Ok(Json(json!({
        "success": true,
        "is_favorite": outcome.is_favorite(),
        "message": message,
    })))
}

/// POST /api/programs/:id/reviews
pub async fn submit_review(
    State(state): State<AppState>,
    user: ExchangeUser,
    Path(program_id): Path<i64>,
    payload: Result<Json<NewReview>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let form = json_body(payload)?;
    let review = registry::submit_review(&state.db, user.guid(), program_id, &form).await?;
    let average = rating::average_rating(&state.db, program_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Review submitted",
            "review": ReviewView::from(review),
            "average_rating": average,
        })),
    ))
}

/// GET /api/me/program
///
/// `null` when the caller is not connected to any program.
pub async fn get_current_program(
    State(state): State<AppState>,
    user: ExchangeUser,
) -> ApiResult<Json<Option<CurrentProgram>>> {
    let current = directory::current_program(&state.db, user.guid()).await?;
    Ok(Json(current))
}
