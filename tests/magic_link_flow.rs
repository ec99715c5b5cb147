//! Handler-level tests for the magic-link flow.
//!
//! These run against a lazy pool that never connects: every path exercised
//! here must fail or succeed before touching the database, which is exactly
//! the contract for validation and nonce checks.

use anyhow::Result;
use axum::{
    Json,
    extract::{Extension, Query},
    http::{HeaderMap, HeaderValue, StatusCode, header::COOKIE, header::SET_COOKIE},
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use secrecy::SecretString;
use serde_json::{Value, json};
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::sync::Arc;
use url::Url;

use larder::api::handlers::auth::{
    AuthConfig, AuthState,
    login::{login, logout},
    magic_link::generate_magic_link,
    session::{KEY_NONCE, Session},
    types::{LoginRequest, SignupRequest},
    validate::{MagicLinkQuery, complete_signup, validate_magic_link},
};
use larder::api::handlers::pantry::pantry;
use larder::api::handlers::pantry::types::PantryQuery;

const ORIGIN: &str = "http://localhost:3000";

fn auth_state() -> Arc<AuthState> {
    Arc::new(AuthState::new(AuthConfig::new(
        ORIGIN.to_string(),
        SecretString::from("magic-test-secret"),
        SecretString::from("cookie-test-secret"),
    )))
}

fn pool() -> Result<PgPool> {
    Ok(PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?)
}

/// Build request headers carrying a session with the given nonce.
fn headers_with_nonce(state: &AuthState, nonce: &str) -> Result<HeaderMap> {
    let mut session = Session::default();
    session.set(KEY_NONCE, nonce);
    let set_cookie = state.sessions().commit(&session)?;
    let pair = set_cookie
        .to_str()?
        .split(';')
        .next()
        .unwrap_or_default()
        .to_string();
    let mut headers = HeaderMap::new();
    headers.insert(COOKIE, HeaderValue::from_str(&pair)?);
    Ok(headers)
}

async fn body_json(response: axum::response::Response) -> Result<Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn magic_param(link: &str) -> Result<String> {
    let url = Url::parse(link)?;
    let magic = url
        .query_pairs()
        .find(|(key, _)| key == "magic")
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default();
    Ok(magic)
}

#[tokio::test]
async fn validate_missing_param() -> Result<()> {
    let response = validate_magic_link(
        HeaderMap::new(),
        Extension(pool()?),
        Extension(auth_state()),
        Query(MagicLinkQuery { magic: None }),
    )
    .await
    .into_response();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await?;
    assert_eq!(body["message"], "missing magic parameter");
    Ok(())
}

#[tokio::test]
async fn validate_garbage_token() -> Result<()> {
    let response = validate_magic_link(
        HeaderMap::new(),
        Extension(pool()?),
        Extension(auth_state()),
        Query(MagicLinkQuery {
            magic: Some("definitely-not-a-token".to_string()),
        }),
    )
    .await
    .into_response();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await?;
    assert_eq!(body["message"], "invalid magic link");
    Ok(())
}

#[tokio::test]
async fn validate_expired_link() -> Result<()> {
    let state = auth_state();
    let payload = json!({
        "email": "alice@example.com",
        "nonce": "nonce-1",
        "createdAt": (Utc::now() - Duration::minutes(6)).to_rfc3339(),
    });
    let token = state.codec().encrypt(&payload.to_string())?;

    // Expiry is checked before the nonce, so no session is needed.
    let response = validate_magic_link(
        HeaderMap::new(),
        Extension(pool()?),
        Extension(state),
        Query(MagicLinkQuery { magic: Some(token) }),
    )
    .await
    .into_response();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await?;
    assert_eq!(body["message"], "magic link has expired");
    Ok(())
}

#[tokio::test]
async fn validate_nonce_mismatch_reads_like_forged() -> Result<()> {
    let state = auth_state();
    let link = generate_magic_link(state.codec(), ORIGIN, "alice@example.com", "nonce-1")?;
    let magic = magic_param(&link)?;

    // A fresh browser without the pending nonce.
    let response = validate_magic_link(
        HeaderMap::new(),
        Extension(pool()?),
        Extension(state.clone()),
        Query(MagicLinkQuery {
            magic: Some(magic.clone()),
        }),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await?;
    assert_eq!(body["message"], "invalid magic link");

    // A browser with a different pending nonce.
    let headers = headers_with_nonce(&state, "nonce-2")?;
    let response = validate_magic_link(
        headers,
        Extension(pool()?),
        Extension(state),
        Query(MagicLinkQuery { magic: Some(magic) }),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await?;
    assert_eq!(body["message"], "invalid magic link");
    Ok(())
}

#[tokio::test]
async fn login_missing_payload() -> Result<()> {
    let response = login(
        HeaderMap::new(),
        Extension(pool()?),
        Extension(auth_state()),
        None,
    )
    .await
    .into_response();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await?;
    assert_eq!(body["message"], "Missing payload");
    Ok(())
}

#[tokio::test]
async fn login_invalid_email() -> Result<()> {
    let response = login(
        HeaderMap::new(),
        Extension(pool()?),
        Extension(auth_state()),
        Some(Json(LoginRequest {
            email: "not-an-email".to_string(),
        })),
    )
    .await
    .into_response();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await?;
    assert_eq!(body["errors"]["email"], "Invalid email");
    Ok(())
}

#[tokio::test]
async fn logout_expires_cookie() -> Result<()> {
    let response = logout(Extension(auth_state())).await.into_response();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let set_cookie = response
        .headers()
        .get(SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    assert!(set_cookie.starts_with("larder_session="));
    assert!(set_cookie.contains("Max-Age=0"));
    Ok(())
}

#[tokio::test]
async fn pantry_requires_login() -> Result<()> {
    let response = pantry(
        HeaderMap::new(),
        Extension(pool()?),
        Extension(auth_state()),
        Query(PantryQuery { query: None }),
    )
    .await
    .into_response();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response
        .headers()
        .get("location")
        .and_then(|value| value.to_str().ok());
    assert_eq!(location, Some("/login"));
    Ok(())
}

#[tokio::test]
async fn signup_rejects_blank_names() -> Result<()> {
    let state = auth_state();
    let link = generate_magic_link(state.codec(), ORIGIN, "new@example.com", "nonce-1")?;
    let magic = magic_param(&link)?;

    let response = complete_signup(
        HeaderMap::new(),
        Extension(pool()?),
        Extension(state),
        Query(MagicLinkQuery { magic: Some(magic) }),
        Some(Json(SignupRequest {
            first_name: " ".to_string(),
            last_name: String::new(),
        })),
    )
    .await
    .into_response();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await?;
    assert_eq!(body["errors"]["firstName"], "First name cannot be blank");
    assert_eq!(body["errors"]["lastName"], "Last name cannot be blank");
    Ok(())
}

#[tokio::test]
async fn signup_rejects_invalid_token_before_touching_db() -> Result<()> {
    let response = complete_signup(
        HeaderMap::new(),
        Extension(pool()?),
        Extension(auth_state()),
        Query(MagicLinkQuery {
            magic: Some("garbage".to_string()),
        }),
        Some(Json(SignupRequest {
            first_name: "Alice".to_string(),
            last_name: "Doe".to_string(),
        })),
    )
    .await
    .into_response();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await?;
    assert_eq!(body["message"], "invalid magic link");
    Ok(())
}
