//! Per-attempt session state.
//!
//! A [`CatSession`] is owned by the engine: callers read it through getters
//! and only the engine mutates it. Status moves forward only.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CatError;
use crate::model::{
    AbilityEstimate, CalibratedItem, ContentArea, ResponseRecord, SessionStatus, StopReason,
    ThetaPoint,
};
use crate::scoring::ScoreReport;

/// Opaque session identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// A fresh random (v4 UUID) id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Coverage counter for one required area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaCoverage {
    pub minimum: u32,
    pub administered: u32,
}

impl AreaCoverage {
    pub fn is_met(&self) -> bool {
        self.administered >= self.minimum
    }
}

/// Build the per-area coverage plan for a session.
///
/// Each area gets `ceil(min_items / |areas|)` unless `overrides` names it.
pub fn coverage_plan(
    areas: &BTreeSet<ContentArea>,
    min_items: u32,
    overrides: &BTreeMap<ContentArea, u32>,
) -> BTreeMap<ContentArea, AreaCoverage> {
    let count = areas.len() as u32;
    let share = if count == 0 {
        0
    } else {
        min_items.div_ceil(count)
    };
    areas
        .iter()
        .map(|area| {
            let minimum = overrides.get(area).copied().unwrap_or(share);
            (
                *area,
                AreaCoverage {
                    minimum,
                    administered: 0,
                },
            )
        })
        .collect()
}

/// State of one adaptive attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatSession {
    id: SessionId,
    idempotency_key: String,
    status: SessionStatus,
    min_items: u32,
    max_items: u32,
    coverage: BTreeMap<ContentArea, AreaCoverage>,
    responses: Vec<ResponseRecord>,
    exhausted: BTreeSet<String>,
    pending_item: Option<CalibratedItem>,
    estimate: AbilityEstimate,
    history: Vec<ThetaPoint>,
    stop_reason: Option<StopReason>,
    score: Option<ScoreReport>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl CatSession {
    pub(crate) fn new(
        id: SessionId,
        idempotency_key: String,
        coverage: BTreeMap<ContentArea, AreaCoverage>,
        min_items: u32,
        max_items: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            idempotency_key,
            status: SessionStatus::Initializing,
            min_items,
            max_items,
            coverage,
            responses: Vec::new(),
            exhausted: BTreeSet::new(),
            pending_item: None,
            estimate: AbilityEstimate::prior(),
            history: Vec::new(),
            stop_reason: None,
            score: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn idempotency_key(&self) -> &str {
        &self.idempotency_key
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn min_items(&self) -> u32 {
        self.min_items
    }

    pub fn max_items(&self) -> u32 {
        self.max_items
    }

    pub fn coverage(&self) -> &BTreeMap<ContentArea, AreaCoverage> {
        &self.coverage
    }

    pub fn responses(&self) -> &[ResponseRecord] {
        &self.responses
    }

    /// Ids that may not be administered again in this session.
    pub fn exhausted(&self) -> &BTreeSet<String> {
        &self.exhausted
    }

    /// The item most recently issued and not yet answered.
    pub fn pending_item(&self) -> Option<&CalibratedItem> {
        self.pending_item.as_ref()
    }

    pub fn estimate(&self) -> &AbilityEstimate {
        &self.estimate
    }

    pub fn history(&self) -> &[ThetaPoint] {
        &self.history
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    pub fn score(&self) -> Option<&ScoreReport> {
        self.score.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn required_areas(&self) -> BTreeSet<ContentArea> {
        self.coverage.keys().copied().collect()
    }

    /// Required areas still below their minimum coverage.
    pub fn deficits(&self) -> BTreeSet<ContentArea> {
        self.coverage
            .iter()
            .filter(|(_, coverage)| !coverage.is_met())
            .map(|(area, _)| *area)
            .collect()
    }

    pub fn item_count(&self) -> u32 {
        self.responses.len() as u32
    }

    pub fn correct_count(&self) -> u32 {
        self.responses.iter().filter(|r| r.correct).count() as u32
    }

    /// Whether the session stopped because the bank ran out.
    pub fn ended_early(&self) -> bool {
        self.stop_reason == Some(StopReason::BankExhausted)
    }

    pub fn is_complete(&self) -> bool {
        self.status == SessionStatus::Complete
    }

    fn transition(&mut self, next: SessionStatus) -> Result<(), CatError> {
        if next < self.status {
            return Err(self.invalid_state());
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    fn invalid_state(&self) -> CatError {
        CatError::InvalidSession {
            session_id: self.id.to_string(),
            status: self.status,
        }
    }

    /// Mark `item` as the one awaiting a response.
    pub(crate) fn issue(&mut self, item: CalibratedItem) -> Result<(), CatError> {
        if self.is_complete() {
            return Err(self.invalid_state());
        }
        self.pending_item = Some(item);
        Ok(())
    }

    /// Append the response to the pending item.
    ///
    /// Fails without touching state if the session is complete or
    /// `item_id` is not the pending item.
    pub(crate) fn record_response(&mut self, item_id: &str, correct: bool) -> Result<(), CatError> {
        if self.is_complete() {
            return Err(self.invalid_state());
        }
        let item = match &self.pending_item {
            Some(item) if item.id == item_id => item.clone(),
            other => {
                return Err(CatError::UnknownItem {
                    session_id: self.id.to_string(),
                    expected: other.as_ref().map(|item| item.id.clone()),
                    submitted: item_id.to_string(),
                })
            }
        };
        if self.item_count() >= self.max_items {
            return Err(self.invalid_state());
        }
        self.transition(SessionStatus::InProgress)?;

        self.responses.push(ResponseRecord {
            item_id: item.id.clone(),
            area: item.area,
            params: item.params,
            correct,
            position: self.item_count() + 1,
        });
        if let Some(coverage) = self.coverage.get_mut(&item.area) {
            coverage.administered += 1;
        }
        self.exhausted.insert(item.id);
        self.pending_item = None;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub(crate) fn update_estimate(&mut self, estimate: AbilityEstimate) {
        self.estimate = estimate;
        self.history.push(ThetaPoint {
            item_number: self.item_count(),
            theta: estimate.theta,
            se: estimate.se,
        });
    }

    pub(crate) fn complete(&mut self, reason: StopReason, score: ScoreReport) -> Result<(), CatError> {
        self.transition(SessionStatus::Complete)?;
        self.pending_item = None;
        self.stop_reason = Some(reason);
        self.score = Some(score);
        self.completed_at = Some(self.updated_at);
        Ok(())
    }
}
