//! Login and logout endpoints.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::IntoResponse,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use crate::api::handlers::{FieldErrors, field_errors_response, message_response};

use super::gate::require_logged_out_user;
use super::magic_link::generate_magic_link;
use super::session::KEY_NONCE;
use super::state::AuthState;
use super::storage::enqueue_magic_link_email;
use super::types::{LoginRequest, LoginResponse};
use super::utils::{generate_nonce, normalize_email, valid_email};

/// Start a login attempt by emailing a magic link.
///
/// A fresh nonce is set in the session cookie and embedded in the link, so
/// only the browser that requested the link can consume it.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Magic link queued", body = LoginResponse),
        (status = 400, description = "Invalid email", body = crate::api::handlers::FieldErrorsResponse),
        (status = 303, description = "Already logged in")
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    if let Err(redirect) = require_logged_out_user(&headers, &pool, &auth_state).await {
        return redirect;
    }

    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return message_response(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        let mut errors = FieldErrors::new();
        errors.insert("email".to_string(), "Invalid email".to_string());
        return field_errors_response(errors);
    }

    let nonce = match generate_nonce() {
        Ok(nonce) => nonce,
        Err(err) => {
            error!("Failed to generate login nonce: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let magic_link = match generate_magic_link(
        auth_state.codec(),
        auth_state.config().origin(),
        &email,
        &nonce,
    ) {
        Ok(link) => link,
        Err(err) => {
            error!("Failed to generate magic link: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if let Err(err) = enqueue_magic_link_email(&pool, &email, &magic_link).await {
        error!("Failed to enqueue magic link email: {err}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    // The nonce replaces any previous login attempt in this browser.
    let mut session = auth_state.sessions().read(&headers);
    session.set(KEY_NONCE, &nonce);
    let cookie = match auth_state.sessions().commit(&session) {
        Ok(cookie) => cookie,
        Err(err) => {
            error!("Failed to commit session: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    (
        StatusCode::OK,
        [(SET_COOKIE, cookie)],
        Json(LoginResponse {
            status: "ok".to_string(),
        }),
    )
        .into_response()
}

/// Drop the session cookie.
#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "auth"
)]
pub async fn logout(auth_state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    match auth_state.sessions().clear() {
        Ok(cookie) => (StatusCode::NO_CONTENT, [(SET_COOKIE, cookie)]).into_response(),
        Err(err) => {
            error!("Failed to clear session: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
