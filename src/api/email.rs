//! Outbox-based delivery of magic-link emails.
//!
//! `POST /login` never talks to a mail server. It inserts a row into
//! `email_outbox` (template `magic_link`, payload holding the recipient and
//! the link) and returns. A background task drains that table: it locks a
//! batch of due rows with `FOR UPDATE SKIP LOCKED`, renders each row into a
//! [`MagicLinkEmail`], and hands it to an [`EmailSender`].
//!
//! A failed send is rescheduled with exponential backoff and jitter until
//! `max_attempts`, then parked as `failed`. Rows that cannot be rendered at
//! all (unknown template, malformed payload) are parked immediately; a retry
//! cannot fix those.
//!
//! The default sender is [`LogEmailSender`]: it writes the link to the
//! service log. That is how logins work in development, where there is no
//! mail server and the link is followed from the log output.
use anyhow::{Context, Result, anyhow};
use rand::Rng;
use serde::Deserialize;
use sqlx::{PgPool, Row, postgres::PgRow};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

/// Templates the outbox knows how to render. Magic links are the only email
/// this service sends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmailTemplate {
    MagicLink,
}

impl EmailTemplate {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MagicLink => "magic_link",
        }
    }

    fn parse(template: &str) -> Option<Self> {
        match template {
            "magic_link" => Some(Self::MagicLink),
            _ => None,
        }
    }
}

/// Rendered magic-link email, ready for delivery. Deserialized straight from
/// the `payload_json` column written at login time.
#[derive(Clone, Debug, Deserialize)]
pub struct MagicLinkEmail {
    pub email: String,
    pub magic_link: String,
}

/// Delivery abstraction used by the outbox worker.
pub trait EmailSender: Send + Sync {
    /// Deliver the login link or return an error to schedule a retry.
    fn send_magic_link(&self, message: &MagicLinkEmail) -> Result<()>;
}

/// Sender for environments without a mail server: the link lands in the log
/// and can be followed from there.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send_magic_link(&self, message: &MagicLinkEmail) -> Result<()> {
        info!(
            to_email = %message.email,
            magic_link = %message.magic_link,
            "magic link ready (log delivery)"
        );
        Ok(())
    }
}

/// Outbox worker knobs, filled in from the CLI.
#[derive(Clone, Copy, Debug)]
pub struct OutboxConfig {
    pub poll_interval: Duration,
    pub batch_size: usize,
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            batch_size: 10,
            max_attempts: 5,
            backoff_base: Duration::from_secs(5),
            backoff_max: Duration::from_secs(300),
        }
    }
}

impl OutboxConfig {
    /// Clamp zero or inverted knobs to workable values so a bad flag cannot
    /// spin the poll loop or divide the batch query by zero.
    #[must_use]
    pub fn clamped(self) -> Self {
        let backoff_base = self.backoff_base.max(Duration::from_secs(1));
        Self {
            poll_interval: self.poll_interval.max(Duration::from_secs(1)),
            batch_size: self.batch_size.max(1),
            max_attempts: self.max_attempts.max(1),
            backoff_base,
            backoff_max: self.backoff_max.max(backoff_base),
        }
    }
}

/// Spawn the background task that drains the email outbox.
pub fn spawn_outbox_worker(
    pool: PgPool,
    sender: Arc<dyn EmailSender>,
    config: OutboxConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let config = config.clamped();

        loop {
            match deliver_due(&pool, sender.as_ref(), &config).await {
                Ok(0) => {}
                Ok(count) => info!("processed {count} outbox emails"),
                Err(err) => error!("email outbox pass failed: {err}"),
            }

            sleep(config.poll_interval).await;
        }
    })
}

/// One worker pass: lock a batch of due rows, deliver each, record outcomes.
async fn deliver_due(
    pool: &PgPool,
    sender: &dyn EmailSender,
    config: &OutboxConfig,
) -> Result<usize> {
    let mut tx = pool
        .begin()
        .await
        .context("failed to start email outbox transaction")?;

    // SKIP LOCKED lets several workers share the table without double-sending.
    let query = r"
        SELECT id, template, payload_json::text AS payload_json, attempts
        FROM email_outbox
        WHERE status = 'pending'
          AND next_attempt_at <= NOW()
        ORDER BY next_attempt_at ASC, created_at ASC
        LIMIT $1
        FOR UPDATE SKIP LOCKED
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(i64::try_from(config.batch_size).unwrap_or(1))
        .fetch_all(&mut *tx)
        .instrument(span)
        .await
        .context("failed to load email outbox batch")?;

    let count = rows.len();
    for row in rows {
        let id: Uuid = row.get("id");
        let attempts: i32 = row.get("attempts");
        let outcome = deliver_row(sender, &row);
        record_outcome(&mut tx, id, attempts.saturating_add(1), outcome, config).await?;
    }

    // Commit even when empty so row locks are released on the poll cadence.
    tx.commit()
        .await
        .context("failed to commit email outbox batch")?;

    Ok(count)
}

/// Outcome of one delivery attempt.
enum Delivery {
    Sent,
    /// Transient failure; reschedule with backoff.
    Retry(anyhow::Error),
    /// Unrenderable row; park it as failed without retrying.
    Discard(anyhow::Error),
}

fn deliver_row(sender: &dyn EmailSender, row: &PgRow) -> Delivery {
    let template: String = row.get("template");
    let payload: String = row.get("payload_json");
    match render(&template, &payload) {
        Ok(message) => match sender.send_magic_link(&message) {
            Ok(()) => Delivery::Sent,
            Err(err) => Delivery::Retry(err),
        },
        Err(err) => Delivery::Discard(err),
    }
}

/// Turn a raw outbox row's template and payload into a deliverable message.
fn render(template: &str, payload: &str) -> Result<MagicLinkEmail> {
    match EmailTemplate::parse(template) {
        Some(EmailTemplate::MagicLink) => {
            serde_json::from_str(payload).context("malformed magic link payload")
        }
        None => Err(anyhow!("unknown email template: {template}")),
    }
}

async fn record_outcome(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
    attempts: i32,
    outcome: Delivery,
    config: &OutboxConfig,
) -> Result<()> {
    match outcome {
        Delivery::Sent => {
            let query = r"
                UPDATE email_outbox
                SET status = 'sent',
                    attempts = $2,
                    last_error = NULL,
                    sent_at = NOW(),
                    next_attempt_at = NOW()
                WHERE id = $1
            ";
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPDATE",
                db.statement = query
            );
            sqlx::query(query)
                .bind(id)
                .bind(attempts)
                .execute(&mut **tx)
                .instrument(span)
                .await
                .context("failed to mark outbox email sent")?;
        }
        Delivery::Retry(err) if !attempts_exhausted(attempts, config.max_attempts) => {
            let delay = retry_delay(attempts, config.backoff_base, config.backoff_max);
            let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
            let query = r"
                UPDATE email_outbox
                SET status = 'pending',
                    attempts = $2,
                    last_error = $3,
                    next_attempt_at = NOW() + ($4 * INTERVAL '1 millisecond')
                WHERE id = $1
            ";
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPDATE",
                db.statement = query
            );
            sqlx::query(query)
                .bind(id)
                .bind(attempts)
                .bind(err.to_string())
                .bind(delay_ms)
                .execute(&mut **tx)
                .instrument(span)
                .await
                .context("failed to reschedule outbox email")?;
        }
        Delivery::Retry(err) | Delivery::Discard(err) => {
            let query = r"
                UPDATE email_outbox
                SET status = 'failed',
                    attempts = $2,
                    last_error = $3,
                    next_attempt_at = NOW()
                WHERE id = $1
            ";
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPDATE",
                db.statement = query
            );
            sqlx::query(query)
                .bind(id)
                .bind(attempts)
                .bind(err.to_string())
                .execute(&mut **tx)
                .instrument(span)
                .await
                .context("failed to mark outbox email failed")?;
        }
    }

    Ok(())
}

fn attempts_exhausted(attempts: i32, max_attempts: u32) -> bool {
    u32::try_from(attempts).map_or(true, |made| made >= max_attempts)
}

/// Exponential backoff for the given attempt number, jittered over the upper
/// half of the window so parallel workers spread out.
fn retry_delay(attempt: i32, base: Duration, max: Duration) -> Duration {
    let shift = u32::try_from(attempt.saturating_sub(1)).unwrap_or(0).min(31);
    let capped = base.saturating_mul(1 << shift).min(max);

    let capped_ms = u64::try_from(capped.as_millis()).unwrap_or(u64::MAX);
    if capped_ms < 2 {
        return capped;
    }
    let half = capped_ms / 2;
    Duration::from_millis(rand::thread_rng().gen_range(half..=capped_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_round_trip() {
        assert_eq!(
            EmailTemplate::parse(EmailTemplate::MagicLink.as_str()),
            Some(EmailTemplate::MagicLink)
        );
        assert_eq!(EmailTemplate::parse("welcome"), None);
    }

    #[test]
    fn render_magic_link_payload() -> Result<()> {
        // Same shape the login handler enqueues.
        let payload = r#"{"email":"alice@example.com","magic_link":"http://localhost:3000/validate-magic-link?magic=abc"}"#;
        let message = render("magic_link", payload)?;
        assert_eq!(message.email, "alice@example.com");
        assert!(message.magic_link.contains("magic=abc"));
        Ok(())
    }

    #[test]
    fn render_rejects_unknown_template() {
        let result = render("welcome", "{}");
        assert!(result.is_err());
        if let Err(err) = result {
            assert!(err.to_string().contains("unknown email template"));
        }
    }

    #[test]
    fn render_rejects_malformed_payload() {
        assert!(render("magic_link", "not json").is_err());
        assert!(render("magic_link", r#"{"email":"a@b.co"}"#).is_err());
    }

    #[test]
    fn clamped_fixes_zero_knobs() {
        let config = OutboxConfig {
            poll_interval: Duration::ZERO,
            batch_size: 0,
            max_attempts: 0,
            backoff_base: Duration::ZERO,
            backoff_max: Duration::ZERO,
        }
        .clamped();

        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.backoff_base, Duration::from_secs(1));
        assert_eq!(config.backoff_max, Duration::from_secs(1));
    }

    #[test]
    fn clamped_keeps_valid_knobs() {
        let config = OutboxConfig::default().clamped();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.backoff_max, Duration::from_secs(300));
    }

    #[test]
    fn retry_delay_stays_within_window() {
        let base = Duration::from_secs(5);
        let max = Duration::from_secs(300);
        for attempt in 1..=20 {
            let delay = retry_delay(attempt, base, max);
            assert!(delay <= max, "attempt {attempt} exceeded cap: {delay:?}");
            let exact = base.saturating_mul(1 << u32::try_from(attempt - 1).unwrap_or(0).min(31));
            let window = exact.min(max);
            assert!(delay >= window / 2, "attempt {attempt} below window: {delay:?}");
        }
    }

    #[test]
    fn exhaustion_counts_the_attempt_being_recorded() {
        assert!(!attempts_exhausted(1, 5));
        assert!(!attempts_exhausted(4, 5));
        assert!(attempts_exhausted(5, 5));
        assert!(attempts_exhausted(-1, 5));
    }

    #[test]
    fn log_sender_always_succeeds() {
        let message = MagicLinkEmail {
            email: "alice@example.com".to_string(),
            magic_link: "http://localhost:3000/validate-magic-link?magic=abc".to_string(),
        };
        assert!(LogEmailSender.send_magic_link(&message).is_ok());
    }
}
