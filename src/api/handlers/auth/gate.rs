//! Session-based access gates for page-level handlers.
//!
//! Mirrors the client navigation model: authenticated pages bounce anonymous
//! visitors to `/login`, while the login flow bounces already-authenticated
//! users to `/app/pantry`.

use anyhow::Result;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use super::session::KEY_USER_ID;
use super::state::AuthState;
use super::storage::{UserRecord, lookup_user_by_id};

/// Resolve the session cookie to a user, if any.
///
/// A missing or unparseable `userId` yields `None` without touching the
/// database; only a real lookup failure is an error.
pub(crate) async fn current_user(
    headers: &HeaderMap,
    pool: &PgPool,
    auth_state: &AuthState,
) -> Result<Option<UserRecord>> {
    let session = auth_state.sessions().read(headers);
    let Some(user_id) = session.get(KEY_USER_ID) else {
        return Ok(None);
    };
    let Ok(user_id) = Uuid::parse_str(user_id) else {
        return Ok(None);
    };
    lookup_user_by_id(pool, user_id).await
}

/// Require an authenticated user; anonymous requests are redirected to
/// `/login`. A session naming a user that no longer exists counts as
/// anonymous.
pub(crate) async fn require_logged_in_user(
    headers: &HeaderMap,
    pool: &PgPool,
    auth_state: &AuthState,
) -> Result<UserRecord, Response> {
    match current_user(headers, pool, auth_state).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(Redirect::to("/login").into_response()),
        Err(err) => {
            error!("Failed to resolve session user: {err}");
            Err(StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
    }
}

/// Require an anonymous visitor; logged-in users are redirected to the app.
pub(crate) async fn require_logged_out_user(
    headers: &HeaderMap,
    pool: &PgPool,
    auth_state: &AuthState,
) -> Result<(), Response> {
    match current_user(headers, pool, auth_state).await {
        Ok(None) => Ok(()),
        Ok(Some(_)) => Err(Redirect::to("/app/pantry").into_response()),
        Err(err) => {
            error!("Failed to resolve session user: {err}");
            Err(StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
    }
}
