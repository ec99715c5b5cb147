//! Magic link validation and signup completion.

use axum::{
    Json,
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::api::handlers::{FieldErrors, field_errors_response, message_response};

use super::magic_link::{MagicLinkError, parse_magic_link};
use super::session::{KEY_NONCE, KEY_USER_ID, Session};
use super::state::AuthState;
use super::storage::{SignupOutcome, insert_user, lookup_user_by_email};
use super::types::{SignupPromptResponse, SignupRequest};

#[derive(Deserialize, IntoParams, Debug)]
pub struct MagicLinkQuery {
    /// Encrypted magic link token from the emailed URL.
    pub magic: Option<String>,
}

/// Turn a session into a logged-in one: the pending nonce is consumed and
/// `userId` is set to the authenticated user. Afterwards the session must
/// carry exactly the user id and no nonce.
fn log_in_session(session: &mut Session, user_id: Uuid) {
    session.unset(KEY_NONCE);
    session.set(KEY_USER_ID, &user_id.to_string());
}

/// Validate a clicked magic link.
///
/// Known users are logged in and redirected into the app; unknown emails get
/// a signup prompt. Either way the nonce is consumed so the link cannot be
/// replayed from this browser.
#[utoipa::path(
    get,
    path = "/validate-magic-link",
    params(MagicLinkQuery),
    responses(
        (status = 303, description = "Logged in, redirect to the app"),
        (status = 200, description = "Valid link for an unknown email", body = SignupPromptResponse),
        (status = 400, description = "Missing, invalid, or expired link", body = crate::api::handlers::MessageResponse)
    ),
    tag = "auth"
)]
pub async fn validate_magic_link(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Query(query): Query<MagicLinkQuery>,
) -> impl IntoResponse {
    let payload = match parse_magic_link(auth_state.codec(), query.magic.as_deref()) {
        Ok(payload) => payload,
        Err(err) => return message_response(StatusCode::BAD_REQUEST, err.message()),
    };

    let mut session = auth_state.sessions().read(&headers);

    // A link whose nonce does not match this browser's pending login is
    // reported exactly like a forged one.
    if session.get(KEY_NONCE) != Some(payload.nonce.as_str()) {
        return message_response(StatusCode::BAD_REQUEST, MagicLinkError::InvalidLink.message());
    }

    let user = match lookup_user_by_email(&pool, &payload.email).await {
        Ok(user) => user,
        Err(err) => {
            error!("Failed to lookup user for magic link: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match user {
        Some(user) => {
            log_in_session(&mut session, user.id);
            let cookie = match auth_state.sessions().commit(&session) {
                Ok(cookie) => cookie,
                Err(err) => {
                    error!("Failed to commit session: {err}");
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
            };
            ([(SET_COOKIE, cookie)], Redirect::to("/app/pantry")).into_response()
        }
        None => {
            session.unset(KEY_NONCE);
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
                Json(SignupPromptResponse {
                    status: "signup".to_string(),
                    email: payload.email,
                }),
            )
                .into_response()
        }
    }
}

/// Complete signup for a validated link whose email had no account.
///
/// The token is decrypted again to recover the email, but the nonce is not
/// re-checked: it was consumed when the link was first validated.
#[utoipa::path(
    post,
    path = "/validate-magic-link",
    params(MagicLinkQuery),
    request_body = SignupRequest,
    responses(
        (status = 303, description = "Account created, redirect to the app"),
        (status = 400, description = "Invalid link or blank names", body = crate::api::handlers::FieldErrorsResponse)
    ),
    tag = "auth"
)]
pub async fn complete_signup(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Query(query): Query<MagicLinkQuery>,
    payload: Option<Json<SignupRequest>>,
) -> impl IntoResponse {
    let request: SignupRequest = match payload {
        Some(Json(payload)) => payload,
        None => return message_response(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    let first_name = request.first_name.trim();
    let last_name = request.last_name.trim();
    let mut errors = FieldErrors::new();
    if first_name.is_empty() {
        errors.insert(
            "firstName".to_string(),
            "First name cannot be blank".to_string(),
        );
    }
    if last_name.is_empty() {
        errors.insert(
            "lastName".to_string(),
            "Last name cannot be blank".to_string(),
        );
    }
    if !errors.is_empty() {
        return field_errors_response(errors);
    }

    let link = match parse_magic_link(auth_state.codec(), query.magic.as_deref()) {
        Ok(payload) => payload,
        Err(err) => return message_response(StatusCode::BAD_REQUEST, err.message()),
    };

    let user = match insert_user(&pool, &link.email, first_name, last_name).await {
        Ok(SignupOutcome::Created(user)) => user,
        Ok(SignupOutcome::Conflict) => {
            // The email signed up through another link in the meantime.
            return message_response(
                StatusCode::BAD_REQUEST,
                MagicLinkError::InvalidLink.message(),
            );
        }
        Err(err) => {
            error!("Failed to create user: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut session = auth_state.sessions().read(&headers);
    log_in_session(&mut session, user.id);
    let cookie = match auth_state.sessions().commit(&session) {
        Ok(cookie) => cookie,
        Err(err) => {
            error!("Failed to commit session: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    ([(SET_COOKIE, cookie)], Redirect::to("/app/pantry")).into_response()
}
