//! Recipe endpoints: the recipe book, per-recipe editing, ingredients, and
//! the meal plan flag.
//!
//! Every route requires a logged-in user. Reads on someone else's recipe are
//! a 401; writes carry ownership messages matching the pantry routes.

pub mod storage;
pub mod types;

use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use super::auth::AuthState;
use super::auth::gate::require_logged_in_user;
use super::auth::storage::UserRecord;
use super::{FieldErrors, field_errors_response, message_response};

use storage::{
    IngredientUpdate, RecipeRecord, create_ingredient, create_recipe, delete_ingredient,
    delete_recipe, get_recipe, ingredient_recipe_owner, list_ingredients, list_recipes,
    save_recipe, set_meal_plan,
};
use types::{
    CreateIngredientRequest, IngredientResponse, MealPlanRequest, RecipeDetailResponse,
    RecipeSummaryResponse, RecipesQuery, SaveRecipeRequest,
};

const RECIPE_NOT_FOUND: &str = "A recipe with that id does not exist";

/// List the user's recipes, optionally filtered by name or meal-plan
/// membership.
#[utoipa::path(
    get,
    path = "/app/recipes",
    params(RecipesQuery),
    responses(
        (status = 200, description = "Recipe summaries", body = [RecipeSummaryResponse]),
        (status = 303, description = "Not logged in")
    ),
    tag = "recipes"
)]
pub async fn recipes(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Query(query): Query<RecipesQuery>,
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
    let meal_plan_only = query.meal_plan_only.unwrap_or(false);

    match list_recipes(&pool, user.id, filter, meal_plan_only).await {
        Ok(recipes) => {
            let response: Vec<RecipeSummaryResponse> = recipes
                .into_iter()
                .map(|recipe| RecipeSummaryResponse {
                    id: recipe.id.to_string(),
                    name: recipe.name,
                    total_time: recipe.total_time,
                    image_url: recipe.image_url,
                    meal_plan_multiplier: recipe.meal_plan_multiplier,
                })
                .collect();
            Json(response).into_response()
        }
        Err(err) => {
            error!("Failed to list recipes: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Create a recipe with placeholder content and land the client on its
/// detail view for editing.
#[utoipa::path(
    post,
    path = "/app/recipes",
    responses(
        (status = 303, description = "Recipe created, redirect to its detail view")
    ),
    tag = "recipes"
)]
pub async fn new_recipe(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let user = match require_logged_in_user(&headers, &pool, &auth_state).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    match create_recipe(&pool, user.id).await {
        Ok(recipe) => Redirect::to(&format!("/app/recipes/{}", recipe.id)).into_response(),
        Err(err) => {
            error!("Failed to create recipe: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Fetch a recipe and check it belongs to the user.
async fn recipe_for_user(
    pool: &PgPool,
    recipe_id: Uuid,
    user: &UserRecord,
    unauthorized_message: &str,
) -> Result<RecipeRecord, Response> {
    match get_recipe(pool, recipe_id).await {
        Ok(Some(recipe)) if recipe.user_id == user.id => Ok(recipe),
        Ok(Some(_)) => Err(message_response(
            StatusCode::UNAUTHORIZED,
            unauthorized_message,
        )),
        Ok(None) => Err(message_response(StatusCode::NOT_FOUND, RECIPE_NOT_FOUND)),
        Err(err) => {
            error!("Failed to lookup recipe: {err}");
            Err(StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
    }
}

#[utoipa::path(
    get,
    path = "/app/recipes/{id}",
    params(("id" = Uuid, Path, description = "Recipe id")),
    responses(
        (status = 200, description = "Recipe with ingredients", body = RecipeDetailResponse),
        (status = 401, description = "Recipe belongs to someone else", body = crate::api::handlers::MessageResponse),
        (status = 404, description = "Unknown recipe", body = crate::api::handlers::MessageResponse)
    ),
    tag = "recipes"
)]
pub async fn recipe_detail(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(recipe_id): Path<Uuid>,
) -> impl IntoResponse {
    let user = match require_logged_in_user(&headers, &pool, &auth_state).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    let recipe = match recipe_for_user(
        &pool,
        recipe_id,
        &user,
        "You are not authorized to view this recipe",
    )
    .await
    {
        Ok(recipe) => recipe,
        Err(response) => return response,
    };

    let ingredients = match list_ingredients(&pool, recipe.id).await {
        Ok(ingredients) => ingredients,
        Err(err) => {
            error!("Failed to list ingredients: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    Json(RecipeDetailResponse {
        id: recipe.id.to_string(),
        name: recipe.name,
        total_time: recipe.total_time,
        image_url: recipe.image_url,
        instructions: recipe.instructions,
        meal_plan_multiplier: recipe.meal_plan_multiplier,
        ingredients: ingredients
            .into_iter()
            .map(|ingredient| IngredientResponse {
                id: ingredient.id.to_string(),
                name: ingredient.name,
                amount: ingredient.amount,
            })
            .collect(),
    })
    .into_response()
}

/// Save the full recipe form: fields plus parallel ingredient edits.
#[utoipa::path(
    post,
    path = "/app/recipes/{id}",
    params(("id" = Uuid, Path, description = "Recipe id")),
    request_body = SaveRecipeRequest,
    responses(
        (status = 204, description = "Recipe saved"),
        (status = 400, description = "Validation failure", body = crate::api::handlers::FieldErrorsResponse),
        (status = 401, description = "Recipe belongs to someone else", body = crate::api::handlers::MessageResponse),
        (status = 404, description = "Unknown recipe", body = crate::api::handlers::MessageResponse)
    ),
    tag = "recipes"
)]
pub async fn update_recipe(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(recipe_id): Path<Uuid>,
    payload: Option<Json<SaveRecipeRequest>>,
) -> impl IntoResponse {
    let user = match require_logged_in_user(&headers, &pool, &auth_state).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    let request: SaveRecipeRequest = match payload {
        Some(Json(payload)) => payload,
        None => return message_response(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    if request.ingredient_ids.len() != request.ingredient_names.len()
        || request.ingredient_ids.len() != request.ingredient_amounts.len()
    {
        return message_response(
            StatusCode::BAD_REQUEST,
            "need an equal number of ingredient amounts, names and ids",
        );
    }

    let mut errors = FieldErrors::new();
    if request.name.trim().is_empty() {
        errors.insert("name".to_string(), "Name cannot be blank".to_string());
    }
    if request.total_time.trim().is_empty() {
        errors.insert(
            "totalTime".to_string(),
            "Total time cannot be blank".to_string(),
        );
    }
    if request.instructions.trim().is_empty() {
        errors.insert(
            "instructions".to_string(),
            "Instructions cannot be blank".to_string(),
        );
    }

    let mut ingredients = Vec::with_capacity(request.ingredient_ids.len());
    for (index, id) in request.ingredient_ids.iter().enumerate() {
        let Ok(id) = Uuid::parse_str(id.trim()) else {
            errors.insert(
                format!("ingredientIds.{index}"),
                "Ingredient id is missing".to_string(),
            );
            continue;
        };
        let name = request.ingredient_names[index].trim();
        if name.is_empty() {
            errors.insert(
                format!("ingredientNames.{index}"),
                "Ingredient name cannot be blank".to_string(),
            );
            continue;
        }
        ingredients.push(IngredientUpdate {
            id,
            name: name.to_string(),
            amount: request.ingredient_amounts[index].clone(),
        });
    }

    if !errors.is_empty() {
        return field_errors_response(errors);
    }

    if let Err(response) = recipe_for_user(
        &pool,
        recipe_id,
        &user,
        "You can not change recipes that don't belong to you!",
    )
    .await
    {
        return response;
    }

    match save_recipe(
        &pool,
        recipe_id,
        request.name.trim(),
        request.total_time.trim(),
        request.instructions.trim(),
        &ingredients,
    )
    .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            error!("Failed to save recipe: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/app/recipes/{id}",
    params(("id" = Uuid, Path, description = "Recipe id")),
    responses(
        (status = 303, description = "Recipe deleted, back to the list"),
        (status = 401, description = "Recipe belongs to someone else", body = crate::api::handlers::MessageResponse),
        (status = 404, description = "Unknown recipe", body = crate::api::handlers::MessageResponse)
    ),
    tag = "recipes"
)]
pub async fn delete_recipe_by_id(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(recipe_id): Path<Uuid>,
) -> impl IntoResponse {
    let user = match require_logged_in_user(&headers, &pool, &auth_state).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    if let Err(response) = recipe_for_user(
        &pool,
        recipe_id,
        &user,
        "You can not delete recipes that don't belong to you!",
    )
    .await
    {
        return response;
    }

    match delete_recipe(&pool, recipe_id).await {
        Ok(()) => Redirect::to("/app/recipes").into_response(),
        Err(err) => {
            error!("Failed to delete recipe: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/app/recipes/{id}/ingredients",
    params(("id" = Uuid, Path, description = "Recipe id")),
    request_body = CreateIngredientRequest,
    responses(
        (status = 200, description = "Ingredient created", body = IngredientResponse),
        (status = 400, description = "Blank name", body = crate::api::handlers::FieldErrorsResponse),
        (status = 401, description = "Recipe belongs to someone else", body = crate::api::handlers::MessageResponse),
        (status = 404, description = "Unknown recipe", body = crate::api::handlers::MessageResponse)
    ),
    tag = "recipes"
)]
pub async fn new_ingredient(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(recipe_id): Path<Uuid>,
    payload: Option<Json<CreateIngredientRequest>>,
) -> impl IntoResponse {
    let user = match require_logged_in_user(&headers, &pool, &auth_state).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    let request: CreateIngredientRequest = match payload {
        Some(Json(payload)) => payload,
        None => return message_response(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    let name = request.new_ingredient_name.trim();
    if name.is_empty() {
        let mut errors = FieldErrors::new();
        errors.insert(
            "newIngredientName".to_string(),
            "Ingredient name cannot be blank".to_string(),
        );
        return field_errors_response(errors);
    }

    if let Err(response) = recipe_for_user(
        &pool,
        recipe_id,
        &user,
        "You can not change recipes that don't belong to you!",
    )
    .await
    {
        return response;
    }

    match create_ingredient(&pool, recipe_id, name, request.new_ingredient_amount.as_deref()).await
    {
        Ok(ingredient) => Json(IngredientResponse {
            id: ingredient.id.to_string(),
            name: ingredient.name,
            amount: ingredient.amount,
        })
        .into_response(),
        Err(err) => {
            error!("Failed to create ingredient: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/app/ingredients/{id}",
    params(("id" = Uuid, Path, description = "Ingredient id")),
    responses(
        (status = 204, description = "Ingredient deleted (or already gone)"),
        (status = 401, description = "Ingredient belongs to someone else", body = crate::api::handlers::MessageResponse)
    ),
    tag = "recipes"
)]
pub async fn delete_ingredient_by_id(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(ingredient_id): Path<Uuid>,
) -> impl IntoResponse {
    let user = match require_logged_in_user(&headers, &pool, &auth_state).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    match ingredient_recipe_owner(&pool, ingredient_id).await {
        Ok(Some(owner)) if owner == user.id => {}
        Ok(Some(_)) => {
            return message_response(
                StatusCode::UNAUTHORIZED,
                "You can not delete ingredients that don't belong to you!",
            );
        }
        // Already gone; a repeated delete is not an error.
        Ok(None) => return StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            error!("Failed to lookup ingredient owner: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    match delete_ingredient(&pool, ingredient_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            error!("Failed to delete ingredient: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Put the recipe on the meal plan with a serving multiplier.
#[utoipa::path(
    post,
    path = "/app/recipes/{id}/meal-plan",
    params(("id" = Uuid, Path, description = "Recipe id")),
    request_body = MealPlanRequest,
    responses(
        (status = 204, description = "Meal plan updated"),
        (status = 400, description = "Invalid multiplier", body = crate::api::handlers::FieldErrorsResponse),
        (status = 401, description = "Recipe belongs to someone else", body = crate::api::handlers::MessageResponse),
        (status = 404, description = "Unknown recipe", body = crate::api::handlers::MessageResponse)
    ),
    tag = "recipes"
)]
pub async fn update_meal_plan(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(recipe_id): Path<Uuid>,
    payload: Option<Json<MealPlanRequest>>,
) -> impl IntoResponse {
    let user = match require_logged_in_user(&headers, &pool, &auth_state).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    let request: MealPlanRequest = match payload {
        Some(Json(payload)) => payload,
        None => return message_response(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    if request.meal_plan_multiplier < 1 {
        let mut errors = FieldErrors::new();
        errors.insert(
            "mealPlanMultiplier".to_string(),
            "Multiplier must be at least 1".to_string(),
        );
        return field_errors_response(errors);
    }

    if let Err(response) = recipe_for_user(
        &pool,
        recipe_id,
        &user,
        "You can not change recipes that don't belong to you!",
    )
    .await
    {
        return response;
    }

    match set_meal_plan(&pool, recipe_id, Some(request.meal_plan_multiplier)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            error!("Failed to update meal plan: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Take the recipe off the meal plan.
#[utoipa::path(
    delete,
    path = "/app/recipes/{id}/meal-plan",
    params(("id" = Uuid, Path, description = "Recipe id")),
    responses(
        (status = 204, description = "Removed from the meal plan"),
        (status = 401, description = "Recipe belongs to someone else", body = crate::api::handlers::MessageResponse),
        (status = 404, description = "Unknown recipe", body = crate::api::handlers::MessageResponse)
    ),
    tag = "recipes"
)]
pub async fn remove_from_meal_plan(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(recipe_id): Path<Uuid>,
) -> impl IntoResponse {
    let user = match require_logged_in_user(&headers, &pool, &auth_state).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    if let Err(response) = recipe_for_user(
        &pool,
        recipe_id,
        &user,
        "You can not change recipes that don't belong to you!",
    )
    .await
    {
        return response;
    }

    match set_meal_plan(&pool, recipe_id, None).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            error!("Failed to update meal plan: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
