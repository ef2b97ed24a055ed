//! Public statistics shown on the home page

use axum::{extract::State, Json};
use serde::Serialize;
use unicat_common::directory::connection_count;

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Students currently connected to an exchange program
    pub connections: i64,
}

/// GET /api/stats
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<Json<StatsResponse>> {
    let connections = connection_count(&state.db).await?;
    Ok(Json(StatsResponse { connections }))
}
