//! Database helpers for recipes and ingredients.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

/// Placeholder image for freshly created recipes.
const NEW_RECIPE_IMAGE_URL: &str = "https://via.placeholder.com/150?text=Larder+Recipes";

pub(super) struct RecipeSummary {
    pub(super) id: Uuid,
    pub(super) name: String,
    pub(super) total_time: String,
    pub(super) image_url: String,
    pub(super) meal_plan_multiplier: Option<i32>,
}

pub(super) struct RecipeRecord {
    pub(super) id: Uuid,
    pub(super) user_id: Uuid,
    pub(super) name: String,
    pub(super) total_time: String,
    pub(super) image_url: String,
    pub(super) instructions: String,
    pub(super) meal_plan_multiplier: Option<i32>,
}

pub(super) struct IngredientRecord {
    pub(super) id: Uuid,
    pub(super) name: String,
    pub(super) amount: Option<String>,
}

/// One ingredient update within a full-form recipe save.
pub(super) struct IngredientUpdate {
    pub(super) id: Uuid,
    pub(super) name: String,
    pub(super) amount: Option<String>,
}

/// Recipes for a user, newest first, optionally filtered by name and by
/// meal-plan membership.
pub(super) async fn list_recipes(
    pool: &PgPool,
    user_id: Uuid,
    filter: Option<&str>,
    meal_plan_only: bool,
) -> Result<Vec<RecipeSummary>> {
    let query = r"
        SELECT id, name, total_time, image_url, meal_plan_multiplier
        FROM recipes
        WHERE user_id = $1
          AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%')
          AND (NOT $3 OR meal_plan_multiplier IS NOT NULL)
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
        .bind(meal_plan_only)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list recipes")?;

    Ok(rows
        .into_iter()
        .map(|row| RecipeSummary {
            id: row.get("id"),
            name: row.get("name"),
            total_time: row.get("total_time"),
            image_url: row.get("image_url"),
            meal_plan_multiplier: row.get("meal_plan_multiplier"),
        })
        .collect())
}

/// Create a recipe with placeholder content; the client edits it in place.
pub(super) async fn create_recipe(pool: &PgPool, user_id: Uuid) -> Result<RecipeSummary> {
    let query = r"
        INSERT INTO recipes (user_id, name, total_time, image_url, instructions)
        VALUES ($1, 'New Recipe', '0 min', $2, '')
        RETURNING id, name, total_time, image_url, meal_plan_multiplier
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(NEW_RECIPE_IMAGE_URL)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to create recipe")?;

    Ok(RecipeSummary {
        id: row.get("id"),
        name: row.get("name"),
        total_time: row.get("total_time"),
        image_url: row.get("image_url"),
        meal_plan_multiplier: row.get("meal_plan_multiplier"),
    })
}

pub(super) async fn get_recipe(pool: &PgPool, recipe_id: Uuid) -> Result<Option<RecipeRecord>> {
    let query = r"
        SELECT id, user_id, name, total_time, image_url, instructions, meal_plan_multiplier
        FROM recipes
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(recipe_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup recipe")?;

    Ok(row.map(|row| RecipeRecord {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        total_time: row.get("total_time"),
        image_url: row.get("image_url"),
        instructions: row.get("instructions"),
        meal_plan_multiplier: row.get("meal_plan_multiplier"),
    }))
}

/// Ingredients in the order they were added to the recipe.
pub(super) async fn list_ingredients(
    pool: &PgPool,
    recipe_id: Uuid,
) -> Result<Vec<IngredientRecord>> {
    let query = r"
        SELECT id, name, amount
        FROM ingredients
        WHERE recipe_id = $1
        ORDER BY created_at ASC
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(recipe_id)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list ingredients")?;

    Ok(rows
        .into_iter()
        .map(|row| IngredientRecord {
            id: row.get("id"),
            name: row.get("name"),
            amount: row.get("amount"),
        })
        .collect())
}

/// Save the recipe fields and its ingredient edits in one transaction so a
/// partial form submission never half-applies.
pub(super) async fn save_recipe(
    pool: &PgPool,
    recipe_id: Uuid,
    name: &str,
    total_time: &str,
    instructions: &str,
    ingredients: &[IngredientUpdate],
) -> Result<()> {
    let mut tx = pool.begin().await.context("begin recipe save")?;

    let query = r"
        UPDATE recipes
        SET name = $2, total_time = $3, instructions = $4, updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(recipe_id)
        .bind(name)
        .bind(total_time)
        .bind(instructions)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to update recipe")?;

    let query = r"
        UPDATE ingredients
        SET name = $3, amount = $4, updated_at = NOW()
        WHERE id = $1 AND recipe_id = $2
    ";
    for ingredient in ingredients {
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(ingredient.id)
            .bind(recipe_id)
            .bind(&ingredient.name)
            .bind(ingredient.amount.as_deref())
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to update ingredient")?;
    }

    tx.commit().await.context("commit recipe save")?;
    Ok(())
}

pub(super) async fn create_ingredient(
    pool: &PgPool,
    recipe_id: Uuid,
    name: &str,
    amount: Option<&str>,
) -> Result<IngredientRecord> {
    let query = r"
        INSERT INTO ingredients (recipe_id, name, amount)
        VALUES ($1, $2, $3)
        RETURNING id, name, amount
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(recipe_id)
        .bind(name)
        .bind(amount)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to create ingredient")?;

    Ok(IngredientRecord {
        id: row.get("id"),
        name: row.get("name"),
        amount: row.get("amount"),
    })
}

/// Ingredients go with the recipe via the foreign key cascade.
pub(super) async fn delete_recipe(pool: &PgPool, recipe_id: Uuid) -> Result<()> {
    let query = "DELETE FROM recipes WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(recipe_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete recipe")?;
    Ok(())
}

/// Owner of the recipe an ingredient belongs to.
pub(super) async fn ingredient_recipe_owner(
    pool: &PgPool,
    ingredient_id: Uuid,
) -> Result<Option<Uuid>> {
    let query = r"
        SELECT recipes.user_id
        FROM ingredients
        JOIN recipes ON recipes.id = ingredients.recipe_id
        WHERE ingredients.id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(ingredient_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup ingredient owner")?;

    Ok(row.map(|row| row.get("user_id")))
}

pub(super) async fn delete_ingredient(pool: &PgPool, ingredient_id: Uuid) -> Result<()> {
    let query = "DELETE FROM ingredients WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(ingredient_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete ingredient")?;
    Ok(())
}

/// Set or clear the meal-plan multiplier.
pub(super) async fn set_meal_plan(
    pool: &PgPool,
    recipe_id: Uuid,
    multiplier: Option<i32>,
) -> Result<()> {
    let query = r"
        UPDATE recipes
        SET meal_plan_multiplier = $2, updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(recipe_id)
        .bind(multiplier)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update meal plan")?;
    Ok(())
}
