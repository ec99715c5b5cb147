//! Pantry endpoints: shelves and the items on them.
//!
//! Every route requires a logged-in user and only ever touches that user's
//! rows; acting on someone else's shelf or item is a 401 with an explicit
//! message. Deletes are idempotent so a double-submitted form stays quiet.

pub mod storage;
pub mod types;

use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use super::auth::AuthState;
use super::auth::gate::require_logged_in_user;
use super::{FieldErrors, field_errors_response, message_response};

use storage::{
    create_item, create_shelf, delete_item, delete_shelf, item_owner, list_items_for_shelves,
    list_shelves, rename_shelf, shelf_owner,
};
use types::{CreateItemRequest, ItemResponse, PantryQuery, RenameShelfRequest, ShelfResponse};

/// List the user's shelves with their items, optionally filtered by shelf
/// name.
#[utoipa::path(
    get,
    path = "/app/pantry",
    params(PantryQuery),
    responses(
        (status = 200, description = "Shelves with items", body = [ShelfResponse]),
        (status = 303, description = "Not logged in")
    ),
    tag = "pantry"
)]
pub async fn pantry(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Query(query): Query<PantryQuery>,
) -> impl IntoResponse {
    let user = match require_logged_in_user(&headers, &pool, &auth_state).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    let filter = query
        .query
        .as_deref()
        .map(str::trim)
        .filter(|filter| !filter.is_empty());

    let shelves = match list_shelves(&pool, user.id, filter).await {
        Ok(shelves) => shelves,
        Err(err) => {
            error!("Failed to list shelves: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let shelf_ids: Vec<Uuid> = shelves.iter().map(|shelf| shelf.id).collect();
    let items = match list_items_for_shelves(&pool, &shelf_ids).await {
        Ok(items) => items,
        Err(err) => {
            error!("Failed to list shelf items: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let response: Vec<ShelfResponse> = shelves
        .into_iter()
        .map(|shelf| ShelfResponse {
            items: items
                .iter()
                .filter(|item| item.shelf_id == shelf.id)
                .map(|item| ItemResponse {
                    id: item.id.to_string(),
                    name: item.name.clone(),
                })
                .collect(),
            id: shelf.id.to_string(),
            name: shelf.name,
        })
        .collect();

    Json(response).into_response()
}

/// Create a shelf with the placeholder name; the client renames it inline.
#[utoipa::path(
    post,
    path = "/app/pantry/shelves",
    responses(
        (status = 200, description = "Shelf created", body = ShelfResponse),
        (status = 303, description = "Not logged in")
    ),
    tag = "pantry"
)]
pub async fn new_shelf(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let user = match require_logged_in_user(&headers, &pool, &auth_state).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    match create_shelf(&pool, user.id).await {
        Ok(shelf) => Json(ShelfResponse {
            id: shelf.id.to_string(),
            name: shelf.name,
            items: Vec::new(),
        })
        .into_response(),
        Err(err) => {
            error!("Failed to create shelf: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/app/pantry/shelves/{id}/name",
    params(("id" = Uuid, Path, description = "Shelf id")),
    request_body = RenameShelfRequest,
    responses(
        (status = 204, description = "Shelf renamed"),
        (status = 400, description = "Blank name", body = crate::api::handlers::FieldErrorsResponse),
        (status = 401, description = "Shelf belongs to someone else", body = crate::api::handlers::MessageResponse),
        (status = 404, description = "Shelf not found", body = crate::api::handlers::MessageResponse)
    ),
    tag = "pantry"
)]
pub async fn rename_shelf_name(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(shelf_id): Path<Uuid>,
    payload: Option<Json<RenameShelfRequest>>,
) -> impl IntoResponse {
    let user = match require_logged_in_user(&headers, &pool, &auth_state).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    let request: RenameShelfRequest = match payload {
        Some(Json(payload)) => payload,
        None => return message_response(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    let name = request.shelf_name.trim();
    if name.is_empty() {
        let mut errors = FieldErrors::new();
        errors.insert(
            "shelfName".to_string(),
            "Shelf name cannot be blank".to_string(),
        );
        return field_errors_response(errors);
    }

    match shelf_owner(&pool, shelf_id).await {
        Ok(Some(owner)) if owner == user.id => {}
        Ok(Some(_)) => {
            return message_response(
                StatusCode::UNAUTHORIZED,
                "You can not rename shelves that don't belong to you!",
            );
        }
        Ok(None) => return message_response(StatusCode::NOT_FOUND, "Shelf not found"),
        Err(err) => {
            error!("Failed to lookup shelf owner: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    match rename_shelf(&pool, shelf_id, name).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            error!("Failed to rename shelf: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/app/pantry/shelves/{id}",
    params(("id" = Uuid, Path, description = "Shelf id")),
    responses(
        (status = 204, description = "Shelf deleted (or already gone)"),
        (status = 401, description = "Shelf belongs to someone else", body = crate::api::handlers::MessageResponse)
    ),
    tag = "pantry"
)]
pub async fn delete_shelf_by_id(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(shelf_id): Path<Uuid>,
) -> impl IntoResponse {
    let user = match require_logged_in_user(&headers, &pool, &auth_state).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    match shelf_owner(&pool, shelf_id).await {
        Ok(Some(owner)) if owner == user.id => {}
        Ok(Some(_)) => {
            return message_response(
                StatusCode::UNAUTHORIZED,
                "You can not delete shelves that don't belong to you!",
            );
        }
        // Already gone; a repeated delete is not an error.
        Ok(None) => return StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            error!("Failed to lookup shelf owner: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    match delete_shelf(&pool, shelf_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            error!("Failed to delete shelf: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/app/pantry/shelves/{id}/items",
    params(("id" = Uuid, Path, description = "Shelf id")),
    request_body = CreateItemRequest,
    responses(
        (status = 200, description = "Item created", body = ItemResponse),
        (status = 400, description = "Blank name", body = crate::api::handlers::FieldErrorsResponse),
        (status = 401, description = "Shelf belongs to someone else", body = crate::api::handlers::MessageResponse),
        (status = 404, description = "Shelf not found", body = crate::api::handlers::MessageResponse)
    ),
    tag = "pantry"
)]
pub async fn new_shelf_item(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(shelf_id): Path<Uuid>,
    payload: Option<Json<CreateItemRequest>>,
) -> impl IntoResponse {
    let user = match require_logged_in_user(&headers, &pool, &auth_state).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    let request: CreateItemRequest = match payload {
        Some(Json(payload)) => payload,
        None => return message_response(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    let name = request.item_name.trim();
    if name.is_empty() {
        let mut errors = FieldErrors::new();
        errors.insert(
            "itemName".to_string(),
            "Item name cannot be blank".to_string(),
        );
        return field_errors_response(errors);
    }

    match shelf_owner(&pool, shelf_id).await {
        Ok(Some(owner)) if owner == user.id => {}
        Ok(Some(_)) => {
            return message_response(
                StatusCode::UNAUTHORIZED,
                "You can not add items to shelves that don't belong to you!",
            );
        }
        Ok(None) => return message_response(StatusCode::NOT_FOUND, "Shelf not found"),
        Err(err) => {
            error!("Failed to lookup shelf owner: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    match create_item(&pool, user.id, shelf_id, name).await {
        Ok(item) => Json(ItemResponse {
            id: item.id.to_string(),
            name: item.name,
        })
        .into_response(),
        Err(err) => {
            error!("Failed to create shelf item: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/app/pantry/items/{id}",
    params(("id" = Uuid, Path, description = "Item id")),
    responses(
        (status = 204, description = "Item deleted (or already gone)"),
        (status = 401, description = "Item belongs to someone else", body = crate::api::handlers::MessageResponse)
    ),
    tag = "pantry"
)]
pub async fn delete_item_by_id(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(item_id): Path<Uuid>,
) -> impl IntoResponse {
    let user = match require_logged_in_user(&headers, &pool, &auth_state).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    match item_owner(&pool, item_id).await {
        Ok(Some(owner)) if owner == user.id => {}
        Ok(Some(_)) => {
            return message_response(
                StatusCode::UNAUTHORIZED,
                "You can not delete items that don't belong to you!",
            );
        }
        Ok(None) => return StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            error!("Failed to lookup item owner: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    match delete_item(&pool, item_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            error!("Failed to delete item: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
