//! Authentication extractor.
//!
//! The session token is read from `Authorization: Bearer` first, then from
//! the `__session` cookie set by the Clerk frontend.

use std::ops::Deref;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};

use routeplan_types::UserId;

use crate::error::ApiError;
use crate::state::AppState;

const SESSION_COOKIE: &str = "__session";

/// Extractor that requires a verified session.
///
/// Rejects with 401 when no token is present or verification fails.
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserId);

impl Deref for AuthUser {
    type Target = UserId;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).ok_or_else(ApiError::unauthorized)?;

        let session = state.auth.authenticate(&token).await.map_err(|e| {
            tracing::debug!(error = %e, "Session verification failed");
            ApiError::from(e)
        })?;

        Ok(Self(session.user_id))
    }
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    bearer_token(headers).or_else(|| session_cookie(headers))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}
