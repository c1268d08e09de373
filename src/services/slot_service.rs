use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use reqwest::Client;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::database::ledger::InterviewLedger;
use crate::error::{Error, Result};
use crate::models::interview::Interview;
use crate::models::slot::{SlotAvailability, SlotQuery, SlotWindow};

const MAX_RANGE_DAYS: i64 = 62;
const MIN_DURATION_MINUTES: i64 = 15;
const MAX_DURATION_MINUTES: i64 = 480;

/// Source of raw candidate windows for an interviewer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SlotProvider: Send + Sync + 'static {
    async fn available_windows(&self, query: &SlotQuery) -> Result<Vec<SlotWindow>>;
}

/// Calendar service reached over HTTP.
///
/// `GET {base}/availability?interviewer_id=..&start_date=..&end_date=..&duration_minutes=..&channel=..`
/// answering `{ "YYYY-MM-DD": [{ "start_time", "end_time", "label" }] }`.
#[derive(Clone)]
pub struct HttpSlotProvider {
    client: Client,
    base_url: url::Url,
}

impl HttpSlotProvider {
    pub fn new(client: Client, base_url: &str) -> Result<Self> {
        let base_url = url::Url::parse(base_url)
            .map_err(|e| Error::Config(format!("Invalid SLOT_PROVIDER_URL: {}", e)))?;
        Ok(Self { client, base_url })
    }

    fn availability_url(&self, query: &SlotQuery) -> Result<url::Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config("SLOT_PROVIDER_URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push("availability");
        url.query_pairs_mut()
            .append_pair("interviewer_id", &query.interviewer_id)
            .append_pair("start_date", &query.start_date.to_string())
            .append_pair("end_date", &query.end_date.to_string())
            .append_pair("duration_minutes", &query.duration_minutes.to_string())
            .append_pair("channel", query.mode.code());
        Ok(url)
    }
}

#[async_trait]
impl SlotProvider for HttpSlotProvider {
    async fn available_windows(&self, query: &SlotQuery) -> Result<Vec<SlotWindow>> {
        let url = self.availability_url(query)?;
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("slot provider: {}", e)))?;

        if !resp.status().is_success() {
            return Err(Error::UpstreamUnavailable(format!(
                "slot provider answered {}",
                resp.status()
            )));
        }

        let grouped: HashMap<String, Vec<SlotWindow>> = resp
            .json()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("slot provider payload: {}", e)))?;
        Ok(grouped.into_values().flatten().collect())
    }
}

/// Offers back-to-back windows inside fixed weekday working hours (UTC).
#[derive(Debug, Clone)]
pub struct WorkingHoursProvider {
    start_hour: u32,
    end_hour: u32,
}

impl WorkingHoursProvider {
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    fn day_windows(&self, date: NaiveDate, duration: Duration) -> Vec<SlotWindow> {
        if duration <= Duration::zero() || matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            return Vec::new();
        }
        let midnight = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
        let open = midnight + Duration::hours(i64::from(self.start_hour));
        let close = midnight + Duration::hours(i64::from(self.end_hour.min(24)));

        let mut windows = Vec::new();
        let mut cursor = open;
        while cursor + duration <= close {
            windows.push(SlotWindow::new(cursor, cursor + duration));
            cursor += duration;
        }
        windows
    }
}

#[async_trait]
impl SlotProvider for WorkingHoursProvider {
    async fn available_windows(&self, query: &SlotQuery) -> Result<Vec<SlotWindow>> {
        let duration = Duration::minutes(query.duration_minutes);
        Ok(query
            .start_date
            .iter_days()
            .take_while(|d| *d <= query.end_date)
            .flat_map(|d| self.day_windows(d, duration))
            .collect())
    }
}

fn range_bounds(query: &SlotQuery) -> (DateTime<Utc>, DateTime<Utc>) {
    let from = Utc.from_utc_datetime(&query.start_date.and_time(NaiveTime::MIN));
    let to = Utc.from_utc_datetime(&query.end_date.and_time(NaiveTime::MIN)) + Duration::days(1);
    (from, to)
}

/// Turns raw provider windows into bookable, non-overlapping slots grouped by date.
pub fn reconcile(
    query: &SlotQuery,
    raw: Vec<SlotWindow>,
    busy: &[Interview],
    now: DateTime<Utc>,
) -> SlotAvailability {
    let (from, to) = range_bounds(query);
    let duration = Duration::minutes(query.duration_minutes);

    let mut candidates: Vec<SlotWindow> = raw
        .into_iter()
        .filter(|w| w.start_time < w.end_time)
        .filter(|w| w.end_time - w.start_time >= duration)
        .map(|w| SlotWindow::new(w.start_time, w.start_time + duration))
        .filter(|w| w.start_time >= from && w.end_time <= to && w.start_time >= now)
        .filter(|w| !busy.iter().any(|i| i.blocks(w.start_time, w.end_time)))
        .collect();
    candidates.sort_by_key(|w| (w.start_time, w.end_time));

    let mut kept: Vec<SlotWindow> = Vec::with_capacity(candidates.len());
    for window in candidates {
        let clashes = kept
            .last()
            .map_or(false, |prev| prev.overlaps(window.start_time, window.end_time));
        if !clashes {
            kept.push(window);
        }
    }

    let mut groups: BTreeMap<NaiveDate, Vec<SlotWindow>> = BTreeMap::new();
    for window in kept {
        groups
            .entry(window.start_time.date_naive())
            .or_default()
            .push(window);
    }

    if groups.is_empty() {
        SlotAvailability::Empty
    } else {
        SlotAvailability::Available(groups)
    }
}

#[derive(Clone)]
pub struct SlotService {
    provider: Arc<dyn SlotProvider>,
    ledger: Arc<dyn InterviewLedger>,
}

impl SlotService {
    pub fn new(provider: Arc<dyn SlotProvider>, ledger: Arc<dyn InterviewLedger>) -> Self {
        Self { provider, ledger }
    }

    pub async fn find_slots(
        &self,
        query: &SlotQuery,
        now: DateTime<Utc>,
    ) -> Result<SlotAvailability> {
        validate_query(query)?;

        let raw = match self.provider.available_windows(query).await {
            Ok(windows) => windows,
            Err(Error::UpstreamUnavailable(first)) => {
                tracing::warn!(
                    error = %first,
                    interviewer_id = %query.interviewer_id,
                    "slot query failed, retrying once"
                );
                self.provider.available_windows(query).await?
            }
            Err(e) => return Err(e),
        };

        let (from, to) = range_bounds(query);
        let busy = self
            .ledger
            .busy(&query.interviewer_id, from, to, None)
            .await?;
        let availability = reconcile(query, raw, &busy, now);

        tracing::debug!(
            interviewer_id = %query.interviewer_id,
            busy = busy.len(),
            slots = availability.windows().count(),
            "slot query reconciled"
        );
        Ok(availability)
    }
}

fn validate_query(query: &SlotQuery) -> Result<()> {
    if query.interviewer_id.trim().is_empty() {
        return Err(Error::Validation("interviewer_id is required".to_string()));
    }
    if !query.mode.needs_slot() {
        return Err(Error::Validation(
            "AI interviews do not use interviewer slots".to_string(),
        ));
    }
    if query.end_date < query.start_date {
        return Err(Error::Validation(
            "end_date must not be before start_date".to_string(),
        ));
    }
    if (query.end_date - query.start_date).num_days() >= MAX_RANGE_DAYS {
        return Err(Error::Validation(format!(
            "date range must be shorter than {} days",
            MAX_RANGE_DAYS
        )));
    }
    if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&query.duration_minutes) {
        return Err(Error::Validation(format!(
            "duration_minutes must be between {} and {}",
            MIN_DURATION_MINUTES, MAX_DURATION_MINUTES
        )));
    }
    Ok(())
}
