//! Caller identity
//!
//! Accounts and sessions live in the authentication layer in front of this
//! service. It forwards the authenticated user's guid in `X-Unicat-User`;
//! this extractor loads that user and applies the exchange access rule.
//! The header is trusted, so the service must only be reachable through
//! that layer.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::debug;
use unicat_common::db::models::User;
use unicat_common::db::users::get_user;
use unicat_common::directory::ensure_exchange_access;
use unicat_common::Error as CoreError;
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

/// Header carrying the authenticated user's guid
pub const USER_HEADER: &str = "x-unicat-user";

/// A known, non-institution user allowed to use the exchange directory
#[derive(Debug, Clone)]
pub struct ExchangeUser(pub User);

impl ExchangeUser {
    pub fn guid(&self) -> Uuid {
        self.0.guid
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ExchangeUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        let value = parts
            .headers
            .get(USER_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("Missing X-Unicat-User header".to_string()))?
            .to_str()
            .map_err(|_| ApiError::Unauthorized("Malformed X-Unicat-User header".to_string()))?;

        let guid = Uuid::parse_str(value.trim())
            .map_err(|_| ApiError::Unauthorized(format!("Invalid user id: {}", value)))?;

        let user = match get_user(&state.db, guid).await {
            Ok(user) => user,
            Err(CoreError::UserNotFound(_)) => {
                debug!("Rejected request for unknown user {}", guid);
                return Err(ApiError::Unauthorized(format!("Unknown user: {}", guid)));
            }
            Err(e) => return Err(e.into()),
        };

        ensure_exchange_access(&user)?;

        Ok(ExchangeUser(user))
    }
}
