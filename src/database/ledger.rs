use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::error::Result;
use crate::models::interview::{Interview, InterviewStatus, InterviewTransition};

/// Lookup by foreign key. Unset fields do not filter.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct InterviewFilter {
    pub candidate_email: Option<String>,
    pub application_id: Option<String>,
    pub job_id: Option<String>,
    pub interviewer_id: Option<String>,
    pub status: Option<InterviewStatus>,
}

impl InterviewFilter {
    pub fn matches(&self, interview: &Interview) -> bool {
        self.candidate_email
            .as_deref()
            .map_or(true, |email| interview.is_candidate(email))
            && self
                .application_id
                .as_deref()
                .map_or(true, |id| interview.application_id == id)
            && self.job_id.as_deref().map_or(true, |id| interview.job_id == id)
            && self
                .interviewer_id
                .as_deref()
                .map_or(true, |id| interview.is_interviewer(id))
            && self.status.map_or(true, |status| interview.status == status)
    }
}

/// Persisted interview records.
///
/// Implementations must make `insert` and `update_if` atomic with respect to
/// interviewer overlap: a write that would give one interviewer two
/// slot-holding interviews in the same window fails with `Error::Conflict`.
#[async_trait]
pub trait InterviewLedger: Send + Sync + 'static {
    async fn insert(
        &self,
        interview: &Interview,
        transition: &InterviewTransition,
    ) -> Result<Interview>;

    async fn get(&self, id: Uuid) -> Result<Option<Interview>>;

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Interview>>;

    async fn list(&self, filter: &InterviewFilter) -> Result<Vec<Interview>>;

    /// Slot-holding interviews of `interviewer_id` overlapping `[from, to)`.
    async fn busy(
        &self,
        interviewer_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Interview>>;

    /// Writes `updated` only if the stored row still has `expected_status`
    /// and `expected_version`. `Ok(None)` means another writer got there first.
    async fn update_if(
        &self,
        updated: &Interview,
        expected_status: InterviewStatus,
        expected_version: i64,
        transition: &InterviewTransition,
    ) -> Result<Option<Interview>>;

    async fn history(&self, interview_id: Uuid) -> Result<Vec<InterviewTransition>>;
}

#[derive(Clone)]
pub struct PgInterviewLedger {
    pool: PgPool,
}

impl PgInterviewLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn insert_transition<'c, E>(executor: E, transition: &InterviewTransition) -> Result<()>
where
    E: sqlx::PgExecutor<'c>,
{
    sqlx::query(
        r#"
        INSERT INTO interview_transitions
            (id, interview_id, from_status, to_status, event, actor_id, actor_role, reason, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(transition.id)
    .bind(transition.interview_id)
    .bind(transition.from_status)
    .bind(transition.to_status)
    .bind(&transition.event)
    .bind(&transition.actor_id)
    .bind(&transition.actor_role)
    .bind(&transition.reason)
    .bind(transition.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl InterviewLedger for PgInterviewLedger {
    async fn insert(
        &self,
        interview: &Interview,
        transition: &InterviewTransition,
    ) -> Result<Interview> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, Interview>(
            r#"
            INSERT INTO interviews (
                id, application_id, job_id, candidate_name, candidate_email, mode, status,
                start_time, end_time, meeting_link, interviewer_id, interviewer_email, interviewer_name,
                reschedule_count, created_at, scheduled_at, updated_at, version, idempotency_key
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7,
                $8, $9, $10, $11, $12, $13,
                $14, $15, $16, $17, $18, $19
            )
            RETURNING *
            "#,
        )
        .bind(interview.id)
        .bind(&interview.application_id)
        .bind(&interview.job_id)
        .bind(&interview.candidate_name)
        .bind(&interview.candidate_email)
        .bind(interview.mode)
        .bind(interview.status)
        .bind(interview.start_time)
        .bind(interview.end_time)
        .bind(&interview.meeting_link)
        .bind(&interview.interviewer_id)
        .bind(&interview.interviewer_email)
        .bind(&interview.interviewer_name)
        .bind(interview.reschedule_count)
        .bind(interview.created_at)
        .bind(interview.scheduled_at)
        .bind(interview.updated_at)
        .bind(interview.version)
        .bind(&interview.idempotency_key)
        .fetch_one(&mut *tx)
        .await?;

        insert_transition(&mut *tx, transition).await?;
        tx.commit().await?;
        Ok(row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Interview>> {
        let row = sqlx::query_as::<_, Interview>(r#"SELECT * FROM interviews WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Interview>> {
        let row = sqlx::query_as::<_, Interview>(
            r#"SELECT * FROM interviews WHERE idempotency_key = $1"#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list(&self, filter: &InterviewFilter) -> Result<Vec<Interview>> {
        let rows = sqlx::query_as::<_, Interview>(
            r#"
            SELECT * FROM interviews
            WHERE ($1::text IS NULL OR lower(candidate_email) = lower($1))
              AND ($2::text IS NULL OR application_id = $2)
              AND ($3::text IS NULL OR job_id = $3)
              AND ($4::text IS NULL OR interviewer_id = $4)
              AND ($5::interview_status IS NULL OR status = $5)
            ORDER BY start_time ASC NULLS LAST, created_at DESC
            "#,
        )
        .bind(&filter.candidate_email)
        .bind(&filter.application_id)
        .bind(&filter.job_id)
        .bind(&filter.interviewer_id)
        .bind(filter.status)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn busy(
        &self,
        interviewer_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Interview>> {
        let rows = sqlx::query_as::<_, Interview>(
            r#"
            SELECT * FROM interviews
            WHERE interviewer_id = $1
              AND status NOT IN ('completed', 'cancelled', 'rejected')
              AND start_time < $3
              AND end_time > $2
              AND ($4::uuid IS NULL OR id <> $4)
            ORDER BY start_time ASC
            "#,
        )
        .bind(interviewer_id)
        .bind(from)
        .bind(to)
        .bind(exclude)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn update_if(
        &self,
        updated: &Interview,
        expected_status: InterviewStatus,
        expected_version: i64,
        transition: &InterviewTransition,
    ) -> Result<Option<Interview>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, Interview>(
            r#"
            UPDATE interviews SET
                status = $4,
                start_time = $5,
                end_time = $6,
                requested_time = $7,
                requested_end_time = $8,
                reschedule_reason = $9,
                reschedule_count = $10,
                reschedule_requested_by = $11,
                reschedule_rejection_reason = $12,
                status_before_reschedule = $13,
                rejection_reason = $14,
                cancellation_reason = $15,
                result = $16,
                comments = $17,
                suggestion = $18,
                confirmed_at = $19,
                started_at = $20,
                ended_at = $21,
                cancelled_at = $22,
                updated_at = $23,
                version = $24
            WHERE id = $1 AND status = $2 AND version = $3
            RETURNING *
            "#,
        )
        .bind(updated.id)
        .bind(expected_status)
        .bind(expected_version)
        .bind(updated.status)
        .bind(updated.start_time)
        .bind(updated.end_time)
        .bind(updated.requested_time)
        .bind(updated.requested_end_time)
        .bind(&updated.reschedule_reason)
        .bind(updated.reschedule_count)
        .bind(updated.reschedule_requested_by)
        .bind(&updated.reschedule_rejection_reason)
        .bind(updated.status_before_reschedule)
        .bind(&updated.rejection_reason)
        .bind(&updated.cancellation_reason)
        .bind(updated.result)
        .bind(&updated.comments)
        .bind(&updated.suggestion)
        .bind(updated.confirmed_at)
        .bind(updated.started_at)
        .bind(updated.ended_at)
        .bind(updated.cancelled_at)
        .bind(updated.updated_at)
        .bind(updated.version)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        insert_transition(&mut *tx, transition).await?;
        tx.commit().await?;
        Ok(Some(row))
    }

    async fn history(&self, interview_id: Uuid) -> Result<Vec<InterviewTransition>> {
        let rows = sqlx::query_as::<_, InterviewTransition>(
            r#"
            SELECT * FROM interview_transitions
            WHERE interview_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(interview_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
