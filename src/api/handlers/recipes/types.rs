//! Request and response bodies for the recipe endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RecipesQuery {
    /// Case-insensitive recipe name filter.
    pub query: Option<String>,
    /// When true, only recipes on the meal plan are returned.
    pub meal_plan_only: Option<bool>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RecipeSummaryResponse {
    pub id: String,
    pub name: String,
    pub total_time: String,
    pub image_url: String,
    pub meal_plan_multiplier: Option<i32>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct IngredientResponse {
    pub id: String,
    pub name: String,
    pub amount: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RecipeDetailResponse {
    pub id: String,
    pub name: String,
    pub total_time: String,
    pub image_url: String,
    pub instructions: String,
    pub meal_plan_multiplier: Option<i32>,
    pub ingredients: Vec<IngredientResponse>,
}

/// Full-form save: recipe fields plus parallel arrays updating the existing
/// ingredients in one submission.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SaveRecipeRequest {
    pub name: String,
    pub total_time: String,
    pub instructions: String,
    #[serde(default)]
    pub ingredient_ids: Vec<String>,
    #[serde(default)]
    pub ingredient_names: Vec<String>,
    #[serde(default)]
    pub ingredient_amounts: Vec<Option<String>>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateIngredientRequest {
    pub new_ingredient_name: String,
    pub new_ingredient_amount: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanRequest {
    pub meal_plan_multiplier: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::unwrap_used)]
    fn save_request_defaults_missing_arrays_to_empty() {
        let request: SaveRecipeRequest = serde_json::from_str(
            r#"{"name":"Soup","totalTime":"30 min","instructions":"Boil."}"#,
        )
        .unwrap();
        assert!(request.ingredient_ids.is_empty());
        assert!(request.ingredient_names.is_empty());
        assert!(request.ingredient_amounts.is_empty());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn create_ingredient_amount_is_optional() {
        let request: CreateIngredientRequest =
            serde_json::from_str(r#"{"newIngredientName":"Salt"}"#).unwrap();
        assert_eq!(request.new_ingredient_name, "Salt");
        assert!(request.new_ingredient_amount.is_none());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn summary_uses_camel_case() {
        let summary = RecipeSummaryResponse {
            id: "recipe-1".to_string(),
            name: "Soup".to_string(),
            total_time: "30 min".to_string(),
            image_url: "https://example.com/soup.png".to_string(),
            meal_plan_multiplier: Some(2),
        };
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["totalTime"], "30 min");
        assert_eq!(value["mealPlanMultiplier"], 2);
    }
}
