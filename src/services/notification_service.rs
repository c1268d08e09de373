use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::Result;
use crate::models::interview::{Interview, InterviewStatus};
use crate::models::notification_log::NotificationLog;
use crate::utils::crypto::sign_payload;

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub dedupe_key: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Outbound notifications. Callers treat failures as non-fatal.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn send(&self, notification: Notification) -> Result<()>;
}

fn format_window(interview: &Interview) -> String {
    match interview.window() {
        Some((start, end)) => format!(
            "{} - {} UTC",
            start.format("%Y-%m-%d %H:%M"),
            end.format("%H:%M")
        ),
        None => "at your convenience".to_string(),
    }
}

fn headline(interview: &Interview) -> String {
    match interview.status {
        InterviewStatus::Pending => "Interview invitation awaiting your confirmation".to_string(),
        InterviewStatus::Scheduled if interview.reschedule_count > 0 => {
            "Interview rescheduled".to_string()
        }
        InterviewStatus::Scheduled => "Interview scheduled".to_string(),
        InterviewStatus::Confirmed => "Interview confirmed".to_string(),
        InterviewStatus::Rescheduled => "Reschedule requested".to_string(),
        InterviewStatus::InProgress => "Interview started".to_string(),
        InterviewStatus::Completed => "Interview completed".to_string(),
        InterviewStatus::Cancelled => "Interview cancelled".to_string(),
        InterviewStatus::Rejected => "Interview declined by candidate".to_string(),
    }
}

/// Messages for both parties after `interview` reached its current state.
///
/// Dedupe keys are derived from the record version, so replaying the same
/// transition never produces a second message.
pub fn compose(interview: &Interview) -> Vec<Notification> {
    let subject = format!("{} ({} interview)", headline(interview), interview.mode);
    let mut body = format!(
        "Interview for application {} / job {}\nCandidate: {}\nWhen: {}\nStatus: {}",
        interview.application_id,
        interview.job_id,
        interview.candidate_name,
        format_window(interview),
        interview.status,
    );
    if let Some(link) = &interview.meeting_link {
        body.push_str(&format!("\nMeeting link: {}", link));
    }
    if let (Some(start), Some(reason)) = (interview.requested_time, &interview.reschedule_reason) {
        if interview.status == InterviewStatus::Rescheduled {
            body.push_str(&format!(
                "\nRequested time: {}\nReason: {}",
                start.format("%Y-%m-%d %H:%M UTC"),
                reason
            ));
        }
    }
    if let Some(reason) = &interview.reschedule_rejection_reason {
        if matches!(
            interview.status,
            InterviewStatus::Scheduled | InterviewStatus::Confirmed
        ) {
            body.push_str(&format!("\nReschedule declined: {}", reason));
        }
    }

    let mut recipients = vec![interview.candidate_email.clone()];
    if let Some(email) = &interview.interviewer_email {
        recipients.push(email.clone());
    }

    recipients
        .into_iter()
        .map(|recipient| Notification {
            dedupe_key: format!("{}:{}:{}", interview.id, interview.version, recipient),
            recipient,
            subject: subject.clone(),
            body: body.clone(),
        })
        .collect()
}

/// Sends every message for the interview's current state. Failures are logged
/// and swallowed; the stored transition stands regardless.
pub async fn dispatch(notifier: &dyn Notifier, interview: &Interview) -> usize {
    let mut sent = 0;
    for notification in compose(interview) {
        let recipient = notification.recipient.clone();
        match notifier.send(notification).await {
            Ok(()) => sent += 1,
            Err(e) => tracing::warn!(
                error = %e,
                interview_id = %interview.id,
                recipient = %recipient,
                "notification failed"
            ),
        }
    }
    sent
}

/// Writes notifications to the tracing log only.
#[derive(Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: Notification) -> Result<()> {
        tracing::info!(
            recipient = %notification.recipient,
            subject = %notification.subject,
            dedupe_key = %notification.dedupe_key,
            "notification"
        );
        Ok(())
    }
}

/// Postgres outbox delivered to an email gateway webhook by a background loop.
#[derive(Clone)]
pub struct OutboxNotifier {
    pool: PgPool,
    client: Client,
    target_url: String,
    secret: String,
}

#[async_trait]
impl Notifier for OutboxNotifier {
    async fn send(&self, notification: Notification) -> Result<()> {
        self.enqueue(&notification).await?;
        Ok(())
    }
}

impl OutboxNotifier {
    pub fn new(pool: PgPool, target_url: String, secret: String) -> Self {
        Self {
            pool,
            client: Client::new(),
            target_url,
            secret,
        }
    }

    /// Returns `None` when a row with the same dedupe key already exists.
    pub async fn enqueue(&self, notification: &Notification) -> Result<Option<Uuid>> {
        let row = sqlx::query(
            r#"
            INSERT INTO notification_logs (dedupe_key, recipient, subject, body, target_url, status)
            VALUES ($1, $2, $3, $4, $5, 'pending')
            ON CONFLICT (dedupe_key) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&notification.dedupe_key)
        .bind(&notification.recipient)
        .bind(&notification.subject)
        .bind(&notification.body)
        .bind(&self.target_url)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row.try_get("id")?)),
            None => {
                tracing::debug!(
                    dedupe_key = %notification.dedupe_key,
                    "duplicate notification skipped"
                );
                Ok(None)
            }
        }
    }

    pub async fn deliver_once(&self, log_id: Uuid) -> Result<()> {
        let log = sqlx::query_as::<_, NotificationLog>(
            r#"SELECT * FROM notification_logs WHERE id = $1"#,
        )
        .bind(log_id)
        .fetch_one(&self.pool)
        .await?;

        let payload = json!({
            "dedupe_key": &log.dedupe_key,
            "recipient": &log.recipient,
            "subject": &log.subject,
            "body": &log.body,
        });
        let body = serde_json::to_vec(&payload)?;

        let mut request = self
            .client
            .post(&log.target_url)
            .header("content-type", "application/json")
            .header("Idempotency-Key", &log.dedupe_key)
            .body(body.clone());
        if !self.secret.is_empty() {
            if let Some(signature) = sign_payload(&self.secret, &body) {
                request = request.header("X-Signature", signature);
            }
        }

        match request.send().await {
            Ok(resp) => {
                let status = resp.status().as_u16() as i32;
                let text = resp.text().await.unwrap_or_default();
                sqlx::query(
                    r#"UPDATE notification_logs SET http_status = $1, response_body = $2, status = CASE WHEN $1 BETWEEN 200 AND 299 THEN 'sent' ELSE 'failed' END, attempts = attempts + 1, updated_at = NOW() WHERE id = $3"#,
                )
                .bind(status)
                .bind(text)
                .bind(log.id)
                .execute(&self.pool)
                .await?;
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    recipient = %log.recipient,
                    "notification delivery failed"
                );
                sqlx::query(
                    r#"UPDATE notification_logs SET response_body = $1, status = 'failed', attempts = attempts + 1, updated_at = NOW() WHERE id = $2"#,
                )
                .bind(err.to_string())
                .bind(log.id)
                .execute(&self.pool)
                .await?;
            }
        }
        Ok(())
    }

    /// Delivers the oldest due notification. Returns `false` when the queue is empty.
    pub async fn run_once(&self) -> Result<bool> {
        let row_opt = sqlx::query(
            r#"
            UPDATE notification_logs SET updated_at = NOW(), next_retry_at = NOW() + INTERVAL '5 minutes'
            WHERE id = (
                SELECT id FROM notification_logs
                WHERE status = 'pending' AND (next_retry_at IS NULL OR next_retry_at <= NOW())
                ORDER BY created_at ASC
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING id
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row_opt else { return Ok(false) };
        let id: Uuid = row.try_get("id")?;

        if let Err(e) = self.deliver_once(id).await {
            tracing::error!(error = ?e, notification_id = %id, "notification delivery errored");
        }

        let row2 = sqlx::query(
            r#"SELECT attempts, max_attempts, status FROM notification_logs WHERE id = $1"#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        let attempts: i32 = row2.try_get("attempts")?;
        let max_attempts: i32 = row2.try_get("max_attempts")?;
        let status: String = row2.try_get("status")?;

        if status == "failed" && attempts < max_attempts {
            let retry_at = next_retry_at(Utc::now(), attempts);
            sqlx::query(
                r#"UPDATE notification_logs SET status = 'pending', next_retry_at = $2 WHERE id = $1"#,
            )
            .bind(id)
            .bind(retry_at)
            .execute(&self.pool)
            .await?;
        }

        Ok(true)
    }
}

/// Exponential backoff from 30s, capped at one hour.
pub fn next_retry_at(now: DateTime<Utc>, attempts: i32) -> DateTime<Utc> {
    let exponent = (attempts - 1).clamp(0, 16) as u32;
    let secs = (30i64 * 2i64.pow(exponent)).min(3600);
    now + chrono::Duration::seconds(secs)
}
