use super::handlers::{auth, health, pantry, recipes};
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI spec.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both served
/// and included in the generated `OpenAPI` spec.
/// Routes added outside (like `/` or `OPTIONS /health`) are intentionally not documented.
pub(crate) fn api_router() -> OpenApiRouter {
    let mut larder_tag = Tag::new("larder");
    larder_tag.description = Some("Recipe and pantry management API".to_string());

    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("Magic-link login and signup".to_string());

    let mut pantry_tag = Tag::new("pantry");
    pantry_tag.description = Some("Pantry shelves and items".to_string());

    let mut recipes_tag = Tag::new("recipes");
    recipes_tag.description = Some("Recipes, ingredients, and the meal plan".to_string());

    let mut openapi = cargo_openapi();
    openapi.tags = Some(vec![larder_tag, auth_tag, pantry_tag, recipes_tag]);

    // `routes!` reads #[utoipa::path] to bind HTTP method + path and add the route to OpenAPI.
    OpenApiRouter::with_openapi(openapi)
        .routes(routes!(health::health))
        .routes(routes!(auth::login::login))
        .routes(routes!(auth::login::logout))
        .routes(routes!(
            auth::validate::validate_magic_link,
            auth::validate::complete_signup
        ))
        .routes(routes!(pantry::pantry))
        .routes(routes!(pantry::new_shelf))
        .routes(routes!(pantry::rename_shelf_name))
        .routes(routes!(pantry::delete_shelf_by_id))
        .routes(routes!(pantry::new_shelf_item))
        .routes(routes!(pantry::delete_item_by_id))
        .routes(routes!(recipes::recipes, recipes::new_recipe))
        .routes(routes!(
            recipes::recipe_detail,
            recipes::update_recipe,
            recipes::delete_recipe_by_id
        ))
        .routes(routes!(recipes::new_ingredient))
        .routes(routes!(recipes::delete_ingredient_by_id))
        .routes(routes!(
            recipes::update_meal_plan,
            recipes::remove_from_meal_plan
        ))
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    if let Some(start) = author.find('<') {
        let name = author[..start].trim();
        let email = author[start + 1..].trim_end_matches('>').trim();
        let name = if name.is_empty() { None } else { Some(name) };
        let email = if email.is_empty() { None } else { Some(email) };
        (name, email)
    } else {
        let name = author.trim();
        (if name.is_empty() { None } else { Some(name) }, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let spec = openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(
            spec.info.description.as_deref(),
            Some(env!("CARGO_PKG_DESCRIPTION"))
        );

        let contact = spec.info.contact;
        assert!(contact.is_some());
        if let Some(contact) = contact {
            assert_eq!(contact.name.as_deref(), Some("Team Larder"));
            assert_eq!(contact.email.as_deref(), Some("team@larder.dev"));
        }

        let license = spec.info.license;
        assert!(license.is_some());
        if let Some(license) = license {
            assert_eq!(license.name, "BSD-3-Clause");
            assert_eq!(license.identifier.as_deref(), Some("BSD-3-Clause"));
        }
    }

    #[test]
    fn openapi_tags_and_paths() {
        let spec = openapi();
        let tags = spec.tags.clone().unwrap_or_default();
        assert!(tags.iter().any(|tag| tag.name == "larder"));
        assert!(tags.iter().any(|tag| tag.name == "auth"));
        assert!(tags.iter().any(|tag| tag.name == "pantry"));
        assert!(tags.iter().any(|tag| tag.name == "recipes"));
        assert!(spec.paths.paths.contains_key("/validate-magic-link"));
        assert!(spec.paths.paths.contains_key("/app/pantry/shelves/{id}"));
        assert!(
            spec.paths
                .paths
                .contains_key("/app/recipes/{id}/meal-plan")
        );
    }
}
