//! Bearer-token extractors with exact-match role guards.
//!
//! `UserAuth` admits only `USER` tokens and `AdminAuth` only `ADMIN` tokens;
//! an admin token on a user route is `Forbidden`.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use log::info;
use tilnote_core::{require_role, CoreError, CurrentUser, Role};

/// Caller holding a valid `USER` token.
#[derive(Debug, Clone, Copy)]
pub struct UserAuth(pub CurrentUser);

/// Caller holding a valid `ADMIN` token.
#[derive(Debug, Clone, Copy)]
pub struct AdminAuth(pub CurrentUser);

#[axum::async_trait]
impl FromRequestParts<AppState> for UserAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        authorize(parts, state, Role::User).map(Self)
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        authorize(parts, state, Role::Admin).map(Self)
    }
}

fn authorize(parts: &Parts, state: &AppState, required: Role) -> Result<CurrentUser, ApiError> {
    let token = bearer_token(parts).ok_or(CoreError::Unauthenticated)?;
    let current = state.tokens().verify(token)?;
    if let Err(err) = require_role(&current, required) {
        info!(
            "event=authorize module=api status=rejected subject_id={} role={} required={}",
            current.id, current.role, required
        );
        return Err(err.into());
    }
    Ok(current)
}

/// Extracts `<token>` from `Authorization: Bearer <token>`; the scheme is
/// matched case-insensitively.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
