//! HTTP API handlers for unicat-ex

pub mod health;
pub mod identity;
pub mod programs;
pub mod stats;

pub use health::health_routes;
pub use identity::{ExchangeUser, USER_HEADER};
pub use programs::{
    disconnect, enroll, get_current_program, get_program_detail, get_program_rating, list_programs,
    recompute_rating, submit_review, toggle_favorite,
};
pub use stats::get_stats;
