//! Request and response bodies for the pantry endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams, Debug)]
pub struct PantryQuery {
    /// Case-insensitive shelf name filter.
    pub query: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ItemResponse {
    pub id: String,
    pub name: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ShelfResponse {
    pub id: String,
    pub name: String,
    pub items: Vec<ItemResponse>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RenameShelfRequest {
    pub shelf_name: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemRequest {
    pub item_name: String,
}
