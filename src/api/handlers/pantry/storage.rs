//! Database helpers for pantry shelves and items.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

pub(super) struct ShelfRecord {
    pub(super) id: Uuid,
    pub(super) name: String,
}

pub(super) struct ItemRecord {
    pub(super) id: Uuid,
    pub(super) shelf_id: Uuid,
    pub(super) name: String,
}

/// Shelves for a user, newest first, optionally filtered by name.
pub(super) async fn list_shelves(
    pool: &PgPool,
    user_id: Uuid,
    filter: Option<&str>,
) -> Result<Vec<ShelfRecord>> {
    let query = r"
        SELECT id, name
        FROM pantry_shelves
        WHERE user_id = $1
          AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%')
        ORDER BY created_at DESC
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(user_id)
        .bind(filter)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list pantry shelves")?;

    Ok(rows
        .into_iter()
        .map(|row| ShelfRecord {
            id: row.get("id"),
            name: row.get("name"),
        })
        .collect())
}

/// Items for a set of shelves, alphabetical within each shelf.
pub(super) async fn list_items_for_shelves(
    pool: &PgPool,
    shelf_ids: &[Uuid],
) -> Result<Vec<ItemRecord>> {
    let query = r"
        SELECT id, shelf_id, name
        FROM pantry_items
        WHERE shelf_id = ANY($1)
        ORDER BY name ASC
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(shelf_ids)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list pantry items")?;

    Ok(rows
        .into_iter()
        .map(|row| ItemRecord {
            id: row.get("id"),
            shelf_id: row.get("shelf_id"),
            name: row.get("name"),
        })
        .collect())
}

pub(super) async fn create_shelf(pool: &PgPool, user_id: Uuid) -> Result<ShelfRecord> {
    let query = r"
        INSERT INTO pantry_shelves (user_id, name)
        VALUES ($1, 'New Shelf')
        RETURNING id, name
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to create pantry shelf")?;

    Ok(ShelfRecord {
        id: row.get("id"),
        name: row.get("name"),
    })
}

pub(super) async fn shelf_owner(pool: &PgPool, shelf_id: Uuid) -> Result<Option<Uuid>> {
    let query = "SELECT user_id FROM pantry_shelves WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(shelf_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup shelf owner")?;

    Ok(row.map(|row| row.get("user_id")))
}

pub(super) async fn rename_shelf(pool: &PgPool, shelf_id: Uuid, name: &str) -> Result<()> {
    let query = "UPDATE pantry_shelves SET name = $2, updated_at = NOW() WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(shelf_id)
        .bind(name)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to rename pantry shelf")?;
    Ok(())
}

/// Items on the shelf go with it via the foreign key cascade.
pub(super) async fn delete_shelf(pool: &PgPool, shelf_id: Uuid) -> Result<()> {
    let query = "DELETE FROM pantry_shelves WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(shelf_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete pantry shelf")?;
    Ok(())
}

pub(super) async fn create_item(
    pool: &PgPool,
    user_id: Uuid,
    shelf_id: Uuid,
    name: &str,
) -> Result<ItemRecord> {
    let query = r"
        INSERT INTO pantry_items (user_id, shelf_id, name)
        VALUES ($1, $2, $3)
        RETURNING id, shelf_id, name
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(shelf_id)
        .bind(name)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to create pantry item")?;

    Ok(ItemRecord {
        id: row.get("id"),
        shelf_id: row.get("shelf_id"),
        name: row.get("name"),
    })
}

pub(super) async fn item_owner(pool: &PgPool, item_id: Uuid) -> Result<Option<Uuid>> {
    let query = "SELECT user_id FROM pantry_items WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(item_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup item owner")?;

    Ok(row.map(|row| row.get("user_id")))
}

pub(super) async fn delete_item(pool: &PgPool, item_id: Uuid) -> Result<()> {
    let query = "DELETE FROM pantry_items WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(item_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete pantry item")?;
    Ok(())
}
