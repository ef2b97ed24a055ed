//! Database models

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Community member; authentication happens outside this crate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub guid: Uuid,
    pub username: String,
    pub university: String,
    /// Institution accounts publish events but may not use the exchange directory
    pub is_institution: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    pub code: String,
    pub name: String,
}

/// Exchange program (a partner university)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeProgram {
    pub id: i64,
    /// Position in the QS ranking import, used as default ordering
    pub qs_index: Option<i64>,
    pub university: String,
    pub city: Option<String>,
    pub rank: Option<String>,
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub size: Option<String>,
    pub focus: Option<String>,
    pub research: Option<String>,
    pub status: Option<String>,
    pub static_image: Option<String>,
    pub overall_score: Option<f64>,
    /// Denormalized mean of review ratings, owned by `rating`
    pub cached_average_rating: f64,
}

/// Validated program record as produced by an import collaborator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewProgram {
    pub qs_index: Option<i64>,
    pub university: String,
    pub city: Option<String>,
    pub rank: Option<String>,
    pub country_code: Option<String>,
    pub size: Option<String>,
    pub focus: Option<String>,
    pub research: Option<String>,
    pub status: Option<String>,
    pub static_image: Option<String>,
    pub overall_score: Option<f64>,
}

/// A user's connection to one exchange program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: i64,
    pub user_id: Uuid,
    pub program_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub contact_info: String,
    pub interests: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEnrollment {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub contact_info: String,
    #[serde(default)]
    pub interests: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub user_id: Uuid,
    pub username: String,
    pub program_id: i64,
    pub rating: i64,
    pub review_text: String,
    pub academic_rating: Option<f64>,
    pub housing_rating: Option<f64>,
    pub social_rating: Option<f64>,
    pub city_rating: Option<f64>,
    pub tips: String,
    pub created_at: NaiveDateTime,
}

/// Review form input
///
/// `rating` arrives as a number and is truncated to whole stars before it is
/// stored or averaged. Sub-ratings keep their fractional part (half stars).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewReview {
    pub rating: f64,
    pub review_text: String,
    #[serde(default)]
    pub academic_rating: Option<f64>,
    #[serde(default)]
    pub housing_rating: Option<f64>,
    #[serde(default)]
    pub social_rating: Option<f64>,
    #[serde(default)]
    pub city_rating: Option<f64>,
    #[serde(default)]
    pub tips: String,
}

/// Outcome of toggling a favorite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FavoriteToggle {
    Added,
    Removed,
}

impl FavoriteToggle {
    pub fn is_favorite(self) -> bool {
        self == FavoriteToggle::Added
    }
}

/// Outcome of disconnecting from a program; absence is not an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectOutcome {
    Disconnected,
    NotConnected,
}
