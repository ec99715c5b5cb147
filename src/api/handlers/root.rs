use crate::GIT_COMMIT_HASH;
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ServiceInfo {
    name: String,
    version: String,
    commit: String,
}

/// Service banner for the bare origin.
#[utoipa::path(
    get,
    path= "/",
    responses (
        (status = 200, description = "Service name, version and commit", body = [ServiceInfo])
    ),
    tag= "larder"
)]
pub async fn root() -> impl IntoResponse {
    Json(ServiceInfo {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: GIT_COMMIT_HASH.to_string(),
    })
}
