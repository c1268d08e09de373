use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::database::ledger::{InterviewFilter, InterviewLedger};
use crate::error::{Error, Result};
use crate::models::interview::{Interview, InterviewStatus, InterviewTransition};

#[derive(Default)]
struct LedgerState {
    interviews: HashMap<Uuid, Interview>,
    transitions: Vec<InterviewTransition>,
}

impl LedgerState {
    fn overlapping(&self, candidate: &Interview) -> Option<&Interview> {
        let (start, end) = candidate.window()?;
        let interviewer = candidate.interviewer_id.as_deref()?;
        if !candidate.status.holds_slot() {
            return None;
        }
        self.interviews.values().find(|other| {
            other.id != candidate.id
                && other.is_interviewer(interviewer)
                && other.blocks(start, end)
        })
    }
}

/// Ledger kept in process memory. Used when no `DATABASE_URL` is configured and in tests.
#[derive(Default)]
pub struct MemoryInterviewLedger {
    state: Mutex<LedgerState>,
}

impl MemoryInterviewLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InterviewLedger for MemoryInterviewLedger {
    async fn insert(
        &self,
        interview: &Interview,
        transition: &InterviewTransition,
    ) -> Result<Interview> {
        let mut state = self.state.lock().await;

        if let Some(key) = interview.idempotency_key.as_deref() {
            if state
                .interviews
                .values()
                .any(|i| i.idempotency_key.as_deref() == Some(key))
            {
                return Err(Error::Conflict("Resource already exists".to_string()));
            }
        }
        if state.interviews.contains_key(&interview.id) {
            return Err(Error::Conflict("Resource already exists".to_string()));
        }
        if state.overlapping(interview).is_some() {
            return Err(Error::Conflict(
                "Interviewer already has an interview in this window".to_string(),
            ));
        }

        state.interviews.insert(interview.id, interview.clone());
        state.transitions.push(transition.clone());
        Ok(interview.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Interview>> {
        Ok(self.state.lock().await.interviews.get(&id).cloned())
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Interview>> {
        let state = self.state.lock().await;
        Ok(state
            .interviews
            .values()
            .find(|i| i.idempotency_key.as_deref() == Some(key))
            .cloned())
    }

    async fn list(&self, filter: &InterviewFilter) -> Result<Vec<Interview>> {
        let state = self.state.lock().await;
        let mut rows: Vec<Interview> = state
            .interviews
            .values()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect();
        rows.sort_by(|a, b| match (a.start_time, b.start_time) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => b.created_at.cmp(&a.created_at),
        });
        Ok(rows)
    }

    async fn busy(
        &self,
        interviewer_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Interview>> {
        let state = self.state.lock().await;
        let mut rows: Vec<Interview> = state
            .interviews
            .values()
            .filter(|i| Some(i.id) != exclude)
            .filter(|i| i.is_interviewer(interviewer_id) && i.blocks(from, to))
            .cloned()
            .collect();
        rows.sort_by_key(|i| i.start_time);
        Ok(rows)
    }

    async fn update_if(
        &self,
        updated: &Interview,
        expected_status: InterviewStatus,
        expected_version: i64,
        transition: &InterviewTransition,
    ) -> Result<Option<Interview>> {
        let mut state = self.state.lock().await;

        let current = state
            .interviews
            .get(&updated.id)
            .ok_or_else(|| Error::NotFound(format!("Interview {} not found", updated.id)))?;
        if current.status != expected_status || current.version != expected_version {
            return Ok(None);
        }
        if current.window() != updated.window() && state.overlapping(updated).is_some() {
            return Err(Error::Conflict(
                "Interviewer already has an interview in this window".to_string(),
            ));
        }

        state.interviews.insert(updated.id, updated.clone());
        state.transitions.push(transition.clone());
        Ok(Some(updated.clone()))
    }

    async fn history(&self, interview_id: Uuid) -> Result<Vec<InterviewTransition>> {
        let state = self.state.lock().await;
        Ok(state
            .transitions
            .iter()
            .filter(|t| t.interview_id == interview_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::state_machine::tests::{at, interview};

    fn created(interview: &Interview) -> InterviewTransition {
        InterviewTransition::record(interview, None, "book", None, None, None)
    }

    #[tokio::test]
    async fn insert_rejects_overlap_for_same_interviewer() {
        let ledger = MemoryInterviewLedger::new();
        let first = interview(InterviewStatus::Scheduled);
        ledger.insert(&first, &created(&first)).await.unwrap();

        let mut clash = interview(InterviewStatus::Scheduled);
        clash.start_time = Some(at(10, 30));
        clash.end_time = Some(at(11, 30));
        let err = ledger.insert(&clash, &created(&clash)).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        let mut other_interviewer = clash.clone();
        other_interviewer.interviewer_id = Some("hr-2".into());
        ledger
            .insert(&other_interviewer, &created(&other_interviewer))
            .await
            .unwrap();

        let mut back_to_back = interview(InterviewStatus::Scheduled);
        back_to_back.start_time = Some(at(11, 0));
        back_to_back.end_time = Some(at(12, 0));
        ledger
            .insert(&back_to_back, &created(&back_to_back))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cancelled_interviews_release_their_window() {
        let ledger = MemoryInterviewLedger::new();
        let cancelled = interview(InterviewStatus::Cancelled);
        ledger.insert(&cancelled, &created(&cancelled)).await.unwrap();

        let replacement = interview(InterviewStatus::Scheduled);
        ledger
            .insert(&replacement, &created(&replacement))
            .await
            .unwrap();
        let busy = ledger.busy("hr-1", at(9, 0), at(12, 0), None).await.unwrap();
        assert_eq!(busy.len(), 1);
        assert_eq!(busy[0].id, replacement.id);
    }

    #[tokio::test]
    async fn update_if_checks_status_and_version() {
        let ledger = MemoryInterviewLedger::new();
        let original = interview(InterviewStatus::Scheduled);
        ledger.insert(&original, &created(&original)).await.unwrap();

        let mut next = original.clone();
        next.status = InterviewStatus::Confirmed;
        next.version = 2;
        let note = created(&next);

        let stale = ledger
            .update_if(&next, InterviewStatus::Pending, 1, &note)
            .await
            .unwrap();
        assert!(stale.is_none());

        let written = ledger
            .update_if(&next, InterviewStatus::Scheduled, 1, &note)
            .await
            .unwrap();
        assert_eq!(written.unwrap().status, InterviewStatus::Confirmed);

        let replay = ledger
            .update_if(&next, InterviewStatus::Scheduled, 1, &note)
            .await
            .unwrap();
        assert!(replay.is_none());
        assert_eq!(ledger.history(original.id).await.unwrap().len(), 2);
    }
}
