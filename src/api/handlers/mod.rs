//! API handlers and shared response types.
//!
//! Mutating endpoints respond with either a success payload or a typed
//! error body: `{"message": ...}` for request-level failures and
//! `{"errors": {field: message}}` for form validation failures.

pub mod auth;
pub mod health;
pub mod pantry;
pub mod recipes;
pub mod root;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Field-keyed validation messages, keyed by the submitted field name.
pub type FieldErrors = BTreeMap<String, String>;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct FieldErrorsResponse {
    pub errors: FieldErrors,
}

/// Request-level failure with a human-readable message.
pub(crate) fn message_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(MessageResponse {
            message: message.to_string(),
        }),
    )
        .into_response()
}

/// Form validation failure; always 400 so the client re-renders the form.
pub(crate) fn field_errors_response(errors: FieldErrors) -> Response {
    (StatusCode::BAD_REQUEST, Json(FieldErrorsResponse { errors })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_response_shape() {
        let response = message_response(StatusCode::BAD_REQUEST, "invalid magic link");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn field_errors_serialize_under_errors_key() {
        let mut errors = FieldErrors::new();
        errors.insert("email".to_string(), "Invalid email".to_string());
        let body = serde_json::to_value(FieldErrorsResponse { errors }).unwrap();
        assert_eq!(body["errors"]["email"], "Invalid email");
    }
}
