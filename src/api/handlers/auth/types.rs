//! Request and response bodies for the auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
}

/// Returned after a login request; the magic link travels by email (or the
/// log fallback), never in this response.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub status: String,
}

/// Returned when a valid magic link belongs to an email with no account yet.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SignupPromptResponse {
    pub status: String,
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub first_name: String,
    pub last_name: String,
}
