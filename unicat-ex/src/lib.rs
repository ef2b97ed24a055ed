//! unicat-ex library - exchange program directory service
//!
//! HTTP front of the exchange feature: program listing and detail pages,
//! enrollment, favorites and reviews. Caller identity is supplied by the
//! authentication layer in front of this service.

use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use unicat_common::config::ExchangeConfig;

pub mod api;
pub mod error;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Home country and page size for the directory
    pub exchange: Arc<ExchangeConfig>,
}

impl AppState {
    pub fn new(db: SqlitePool, exchange: ExchangeConfig) -> Self {
        Self {
            db,
            exchange: Arc::new(exchange),
        }
    }
}

/// Build application router
///
/// `/health` and `/api/stats` are public; every other route resolves the
/// caller through [`api::ExchangeUser`].
pub fn build_router(state: AppState) -> Router {
    let exchange = Router::new()
        .route("/api/programs", get(api::list_programs))
        .route("/api/programs/:id", get(api::get_program_detail))
        .route("/api/programs/:id/rating", get(api::get_program_rating))
        .route("/api/programs/:id/rating/recompute", post(api::recompute_rating))
        .route("/api/programs/:id/enroll", post(api::enroll))
        .route("/api/programs/:id/disconnect", post(api::disconnect))
        .route("/api/programs/:id/favorite", post(api::toggle_favorite))
        .route("/api/programs/:id/reviews", post(api::submit_review))
        .route("/api/me/program", get(api::get_current_program));

    let public = Router::new()
        .route("/api/stats", get(api::get_stats))
        .merge(api::health_routes());

    Router::new()
        .merge(exchange)
        .merge(public)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
