use std::convert::Infallible;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use super::cookies::SESSION_COOKIE;
use crate::{error::AppError, state::AppState};

/// The authenticated user behind a request, re-read from the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
}

/// Identity if the request carries a valid session, `None` otherwise. Never rejects.
pub struct MaybeUser(pub Option<Identity>);

/// Identity required; rejects with 401.
pub struct CurrentUser(pub Identity);

/// Bearer token from `Authorization`, falling back to the session cookie.
pub(crate) fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer ").or_else(|| h.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
}

pub async fn optional_auth(state: &AppState, headers: &HeaderMap) -> Option<Identity> {
    let token = session_token(headers)?;
    let claims = state.jwt.verify(&token)?;

    // A valid signature is not enough: the user must still exist.
    match state.users.find_by_id(claims.sub).await {
        Ok(Some(user)) => Some(Identity {
            id: user.id,
            email: user.email,
            name: user.name,
        }),
        Ok(None) => {
            debug!(user_id = %claims.sub, "token for unknown user");
            None
        }
        Err(e) => {
            warn!(error = %e, user_id = %claims.sub, "user lookup failed during auth");
            None
        }
    }
}

pub async fn required_auth(state: &AppState, headers: &HeaderMap) -> Result<Identity, AppError> {
    optional_auth(state, headers)
        .await
        .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(optional_auth(state, &parts.headers).await))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        required_auth(state, &parts.headers).await.map(CurrentUser)
    }
}
