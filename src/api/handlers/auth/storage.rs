//! Database helpers for users and magic-link email enqueueing.

use anyhow::{Context, Result};
use serde_json::json;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::utils::is_unique_violation;
use crate::api::email::EmailTemplate;

/// User row as the handlers need it.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// Outcome when attempting to create a new user during signup.
#[derive(Debug)]
pub(super) enum SignupOutcome {
    Created(UserRecord),
    Conflict,
}

pub(super) async fn lookup_user_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<UserRecord>> {
    let query = "SELECT id, email, first_name, last_name FROM users WHERE email = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by email")?;

    Ok(row.map(|row| UserRecord {
        id: row.get("id"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
    }))
}

pub(crate) async fn lookup_user_by_id(pool: &PgPool, id: Uuid) -> Result<Option<UserRecord>> {
    let query = "SELECT id, email, first_name, last_name FROM users WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by id")?;

    Ok(row.map(|row| UserRecord {
        id: row.get("id"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
    }))
}

/// Create the user row for a completed signup. A unique violation on the
/// email means two links for the same address raced; the caller treats the
/// loser's link as no longer valid.
pub(super) async fn insert_user(
    pool: &PgPool,
    email: &str,
    first_name: &str,
    last_name: &str,
) -> Result<SignupOutcome> {
    let query = r"
        INSERT INTO users
            (email, first_name, last_name)
        VALUES ($1, $2, $3)
        RETURNING id, email, first_name, last_name
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(first_name)
        .bind(last_name)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(SignupOutcome::Created(UserRecord {
            id: row.get("id"),
            email: row.get("email"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
        })),
        Err(err) if is_unique_violation(&err) => Ok(SignupOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert user"),
    }
}

/// Queue the magic-link email. Delivery is asynchronous via the outbox
/// worker; a failed send never blocks the login response.
pub(super) async fn enqueue_magic_link_email(
    pool: &PgPool,
    email: &str,
    magic_link: &str,
) -> Result<()> {
    let payload_json = json!({
        "email": email,
        "magic_link": magic_link,
    });
    let payload_text =
        serde_json::to_string(&payload_json).context("failed to serialize email payload")?;

    let query = r"
        INSERT INTO email_outbox (to_email, template, payload_json)
        VALUES ($1, $2, $3::jsonb)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(email)
        .bind(EmailTemplate::MagicLink.as_str())
        .bind(payload_text)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to insert email outbox row")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{SignupOutcome, UserRecord};
    use uuid::Uuid;

    #[test]
    fn signup_outcome_debug_names() {
        let record = UserRecord {
            id: Uuid::nil(),
            email: "a@example.com".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Doe".to_string(),
        };
        assert!(format!("{:?}", SignupOutcome::Created(record)).starts_with("Created"));
        assert_eq!(format!("{:?}", SignupOutcome::Conflict), "Conflict");
    }

    #[test]
    fn user_record_holds_values() {
        let record = UserRecord {
            id: Uuid::nil(),
            email: "a@example.com".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Doe".to_string(),
        };
        assert_eq!(record.id, Uuid::nil());
        assert_eq!(record.email, "a@example.com");
    }
}
