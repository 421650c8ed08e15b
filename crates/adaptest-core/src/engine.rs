//! The session state machine.
//!
//! [`CatEngine`] drives each attempt through start, submit and resume,
//! delegating to the estimator, selector and stopping rule, and persisting
//! every transition through the [`SessionStore`]. Calls for the same
//! session are serialized; calls for different sessions run in parallel.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{validate_bounds, EngineConfig};
use crate::error::CatError;
use crate::estimator::EapEstimator;
use crate::locks::KeyedLocks;
use crate::model::{AbilityEstimate, CalibratedItem, ContentArea, SessionStatus, StopReason};
use crate::scoring::{score_report, ScoreReport};
use crate::selector::{ItemSelector, Selection, SelectionContext};
use crate::session::{coverage_plan, CatSession, SessionId};
use crate::stopping::{StopDecision, StoppingRule};
use crate::traits::{ExposureLog, ItemBank, SessionStore};

/// Parameters for starting an attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRequest {
    pub required_areas: BTreeSet<ContentArea>,
    /// Item floor; the engine default when `None`.
    #[serde(default)]
    pub min_items: Option<u32>,
    /// Item ceiling; the engine default when `None`.
    #[serde(default)]
    pub max_items: Option<u32>,
    /// Client token: repeating a start with the same key returns the
    /// session it created the first time.
    pub idempotency_key: String,
}

impl StartRequest {
    pub fn new(
        required_areas: impl IntoIterator<Item = ContentArea>,
        min_items: u32,
        max_items: u32,
        idempotency_key: impl Into<String>,
    ) -> Self {
        Self {
            required_areas: required_areas.into_iter().collect(),
            min_items: Some(min_items),
            max_items: Some(max_items),
            idempotency_key: idempotency_key.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartOutcome {
    pub session_id: SessionId,
    pub status: SessionStatus,
    /// The item to present, absent if the session completed at start.
    pub first_item: Option<CalibratedItem>,
    pub score_report: Option<ScoreReport>,
    /// True when an existing session was returned for a repeated key.
    pub resumed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub status: SessionStatus,
    pub next_item: Option<CalibratedItem>,
    pub score_report: Option<ScoreReport>,
    pub estimate: AbilityEstimate,
    pub items_administered: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeOutcome {
    pub status: SessionStatus,
    pub pending_item: Option<CalibratedItem>,
    pub estimate: AbilityEstimate,
    pub items_administered: u32,
    pub score_report: Option<ScoreReport>,
}

/// The CAT engine.
pub struct CatEngine {
    bank: Arc<dyn ItemBank>,
    store: Arc<dyn SessionStore>,
    exposure: Option<Arc<dyn ExposureLog>>,
    config: EngineConfig,
    estimator: EapEstimator,
    selector: ItemSelector,
    locks: KeyedLocks,
}

impl CatEngine {
    pub fn new(
        bank: Arc<dyn ItemBank>,
        store: Arc<dyn SessionStore>,
        config: EngineConfig,
    ) -> Result<Self, CatError> {
        config.validate()?;
        let estimator = EapEstimator::from_config(&config)?;
        let selector = ItemSelector::new(config.max_exposure_rate);
        Ok(Self {
            bank,
            store,
            exposure: None,
            config,
            estimator,
            selector,
            locks: KeyedLocks::new(),
        })
    }

    /// Attach an exposure log. Exposure filtering only applies when
    /// `max_exposure_rate` is also configured.
    pub fn with_exposure_log(mut self, log: Arc<dyn ExposureLog>) -> Self {
        self.exposure = Some(log);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start an attempt, or return the existing one for a repeated key.
    pub async fn start(&self, request: StartRequest) -> Result<StartOutcome, CatError> {
        if request.required_areas.is_empty() {
            return Err(CatError::InvalidConfig(
                "at least one content area is required".into(),
            ));
        }
        if request.idempotency_key.trim().is_empty() {
            return Err(CatError::InvalidConfig(
                "idempotency key must not be empty".into(),
            ));
        }
        let min_items = request.min_items.unwrap_or(self.config.min_items);
        let max_items = request.max_items.unwrap_or(self.config.max_items);
        validate_bounds(min_items, max_items)?;

        let _guard = self
            .locks
            .acquire(&format!("key:{}", request.idempotency_key))
            .await;

        if let Some(existing) = self
            .store
            .find_by_idempotency_key(&request.idempotency_key)
            .await
            .map_err(CatError::Backend)?
        {
            tracing::debug!(
                session = %existing.id(),
                "start repeated with key '{}', returning existing session",
                request.idempotency_key
            );
            return Ok(StartOutcome {
                session_id: existing.id().clone(),
                status: existing.status(),
                first_item: existing.pending_item().cloned(),
                score_report: existing.score().copied(),
                resumed: true,
            });
        }

        let coverage = coverage_plan(
            &request.required_areas,
            min_items,
            &self.config.area_minimums,
        );
        let mut session = CatSession::new(
            SessionId::generate(),
            request.idempotency_key,
            coverage,
            min_items,
            max_items,
        );

        if let Some(log) = &self.exposure {
            if let Err(e) = log.record_session_start().await {
                tracing::warn!("failed to record session start in exposure log: {e:#}");
            }
        }

        match self.select_next(&session).await? {
            Selection::Next { item, information } => {
                tracing::debug!(
                    session = %session.id(),
                    item = %item.id,
                    information,
                    "first item selected"
                );
                session.issue(item)?;
            }
            Selection::BankExhausted => {
                tracing::warn!(
                    session = %session.id(),
                    "no eligible items at start, completing immediately"
                );
                let report = score_report(session.estimate(), 0);
                session.complete(StopReason::BankExhausted, report)?;
            }
        }

        self.store
            .insert(&session)
            .await
            .map_err(CatError::Backend)?;
        self.note_administration(&session).await;

        tracing::info!(
            session = %session.id(),
            areas = session.coverage().len(),
            min_items,
            max_items,
            "session started"
        );

        Ok(StartOutcome {
            session_id: session.id().clone(),
            status: session.status(),
            first_item: session.pending_item().cloned(),
            score_report: session.score().copied(),
            resumed: false,
        })
    }

    /// Record a response to the pending item and advance the session.
    pub async fn submit_response(
        &self,
        session_id: &SessionId,
        item_id: &str,
        correct: bool,
    ) -> Result<SubmitOutcome, CatError> {
        let _guard = self.locks.acquire(session_id.as_str()).await;
        let mut session = self.load(session_id).await?;

        session.record_response(item_id, correct)?;

        let estimation = self.estimator.estimate(session.responses());
        if let Some(edge) = estimation.edge {
            tracing::warn!(
                session = %session_id,
                ?edge,
                theta = estimation.estimate.theta,
                "posterior mass piled at the grid edge, estimate clamped"
            );
        }
        session.update_estimate(estimation.estimate);
        tracing::debug!(
            session = %session_id,
            item = item_id,
            correct,
            n = session.item_count(),
            theta = estimation.estimate.theta,
            se = estimation.estimate.se,
            "response recorded"
        );

        let rule = StoppingRule::new(
            session.min_items(),
            session.max_items(),
            self.config.target_se,
        );
        match rule.evaluate(session.item_count(), session.estimate()) {
            StopDecision::Stop(reason) => self.finish(&mut session, reason)?,
            StopDecision::Continue => match self.select_next(&session).await? {
                Selection::Next { item, information } => {
                    tracing::debug!(
                        session = %session_id,
                        item = %item.id,
                        information,
                        "next item selected"
                    );
                    session.issue(item)?;
                }
                Selection::BankExhausted => {
                    self.finish(&mut session, StopReason::BankExhausted)?;
                }
            },
        }

        self.store.save(&session).await.map_err(CatError::Backend)?;
        self.note_administration(&session).await;

        Ok(SubmitOutcome {
            status: session.status(),
            next_item: session.pending_item().cloned(),
            score_report: session.score().copied(),
            estimate: *session.estimate(),
            items_administered: session.item_count(),
        })
    }

    /// Current status and pending item. Never modifies the session.
    pub async fn resume(&self, session_id: &SessionId) -> Result<ResumeOutcome, CatError> {
        let _guard = self.locks.acquire(session_id.as_str()).await;
        let session = self.load(session_id).await?;

        let pending_item = match (session.status(), session.pending_item()) {
            (SessionStatus::Complete, _) => None,
            (_, Some(item)) => Some(item.clone()),
            (_, None) => self.select_next(&session).await?.item().cloned(),
        };

        Ok(ResumeOutcome {
            status: session.status(),
            pending_item,
            estimate: *session.estimate(),
            items_administered: session.item_count(),
            score_report: session.score().copied(),
        })
    }

    /// Full session state, for reporting.
    pub async fn session(&self, session_id: &SessionId) -> Result<CatSession, CatError> {
        self.load(session_id).await
    }

    async fn load(&self, session_id: &SessionId) -> Result<CatSession, CatError> {
        self.store
            .load(session_id)
            .await
            .map_err(CatError::Backend)?
            .ok_or_else(|| CatError::SessionNotFound(session_id.to_string()))
    }

    fn finish(&self, session: &mut CatSession, reason: StopReason) -> Result<(), CatError> {
        let report = score_report(session.estimate(), session.item_count());
        session.complete(reason, report)?;
        tracing::info!(
            session = %session.id(),
            %reason,
            items = report.items_administered,
            theta = report.theta,
            se = report.se,
            scaled = report.scaled_score,
            passed = report.passed,
            "session complete"
        );
        Ok(())
    }

    async fn select_next(&self, session: &CatSession) -> Result<Selection, CatError> {
        let areas = session.required_areas();
        let candidates = self
            .bank
            .query(&areas, session.exhausted())
            .await
            .map_err(CatError::Backend)?;
        for item in &candidates {
            item.params
                .validate()
                .map_err(|reason| CatError::InvalidItem {
                    item_id: item.id.clone(),
                    reason,
                })?;
        }

        let rates = self.exposure_rates().await;
        let deficits = session.deficits();
        let ctx = SelectionContext {
            theta: session.estimate().theta,
            areas: &areas,
            deficits: &deficits,
            administered: session.exhausted(),
            exposure_rates: &rates,
        };
        Ok(self.selector.select(&candidates, &ctx))
    }

    async fn exposure_rates(&self) -> HashMap<String, f64> {
        let Some(log) = &self.exposure else {
            return HashMap::new();
        };
        if self.config.max_exposure_rate.is_none() {
            return HashMap::new();
        }
        match log.exposure_rates().await {
            Ok(rates) => rates,
            Err(e) => {
                tracing::warn!("exposure rates unavailable, selecting without them: {e:#}");
                HashMap::new()
            }
        }
    }

    async fn note_administration(&self, session: &CatSession) {
        let (Some(log), Some(item)) = (&self.exposure, session.pending_item()) else {
            return;
        };
        if let Err(e) = log.record_administration(&item.id).await {
            tracing::warn!(item = %item.id, "failed to record exposure: {e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryExposureLog, MemoryItemBank, MemorySessionStore};
    use crate::model::IrtParams;

    fn bank(per_area: usize) -> Arc<MemoryItemBank> {
        let mut items = Vec::new();
        for area in ContentArea::ALL {
            for i in 0..per_area {
                let b = -2.0 + 4.0 * i as f64 / per_area.max(1) as f64;
                items.push(CalibratedItem::new(
                    format!("{}-{i:03}", area.as_str()),
                    area,
                    IrtParams::new(1.2, b, 0.2),
                ));
            }
        }
        Arc::new(MemoryItemBank::new("test", items))
    }

    fn engine(per_area: usize) -> CatEngine {
        CatEngine::new(
            bank(per_area),
            Arc::new(MemorySessionStore::new()),
            EngineConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn start_issues_first_item() {
        let engine = engine(10);
        let outcome = engine
            .start(StartRequest::new(ContentArea::ALL, 10, 20, "k1"))
            .await
            .unwrap();
        assert_eq!(outcome.status, SessionStatus::Initializing);
        assert!(outcome.first_item.is_some());
        assert!(!outcome.resumed);

        let resumed = engine.resume(&outcome.session_id).await.unwrap();
        assert_eq!(resumed.status, SessionStatus::Initializing);
        assert_eq!(resumed.pending_item, outcome.first_item);
        assert_eq!(resumed.items_administered, 0);
    }

    #[tokio::test]
    async fn first_response_moves_session_in_progress() {
        let engine = engine(10);
        let started = engine
            .start(StartRequest::new(ContentArea::ALL, 10, 20, "k1"))
            .await
            .unwrap();
        let first = started.first_item.unwrap();

        let outcome = engine
            .submit_response(&started.session_id, &first.id, true)
            .await
            .unwrap();
        assert_eq!(outcome.status, SessionStatus::InProgress);
        assert_eq!(outcome.items_administered, 1);

        let session = engine.session(&started.session_id).await.unwrap();
        assert_eq!(session.status(), SessionStatus::InProgress);
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let engine = engine(10);
        let first = engine
            .start(StartRequest::new(ContentArea::ALL, 10, 20, "k1"))
            .await
            .unwrap();
        let second = engine
            .start(StartRequest::new(ContentArea::ALL, 10, 20, "k1"))
            .await
            .unwrap();
        assert_eq!(first.session_id, second.session_id);
        assert_eq!(first.first_item, second.first_item);
        assert!(second.resumed);
    }

    #[tokio::test]
    async fn start_rejects_bad_requests() {
        let engine = engine(10);
        let no_areas = StartRequest::new(Vec::new(), 1, 2, "k");
        assert!(matches!(
            engine.start(no_areas).await,
            Err(CatError::InvalidConfig(_))
        ));
        let inverted = StartRequest::new(ContentArea::ALL, 5, 2, "k");
        assert!(matches!(
            engine.start(inverted).await,
            Err(CatError::InvalidConfig(_))
        ));
        let blank_key = StartRequest::new(ContentArea::ALL, 1, 2, " ");
        assert!(engine.start(blank_key).await.is_err());
    }

    #[tokio::test]
    async fn empty_bank_completes_at_start() {
        let engine = engine(0);
        let outcome = engine
            .start(StartRequest::new(ContentArea::ALL, 5, 10, "k"))
            .await
            .unwrap();
        assert_eq!(outcome.status, SessionStatus::Complete);
        assert!(outcome.first_item.is_none());
        let report = outcome.score_report.unwrap();
        assert_eq!(report.scaled_score, 500);
        assert_eq!(report.items_administered, 0);

        let session = engine.session(&outcome.session_id).await.unwrap();
        assert!(session.ended_early());
    }

    #[tokio::test]
    async fn unknown_item_is_rejected_without_changes() {
        let engine = engine(10);
        let started = engine
            .start(StartRequest::new(ContentArea::ALL, 5, 10, "k"))
            .await
            .unwrap();
        let err = engine
            .submit_response(&started.session_id, "never-issued", true)
            .await
            .unwrap_err();
        assert!(matches!(err, CatError::UnknownItem { .. }));

        let session = engine.session(&started.session_id).await.unwrap();
        assert!(session.responses().is_empty());
        assert_eq!(session.pending_item(), started.first_item.as_ref());
    }

    #[tokio::test]
    async fn unknown_session_is_reported() {
        let engine = engine(10);
        let err = engine
            .submit_response(&SessionId::from("missing"), "q", true)
            .await
            .unwrap_err();
        assert!(matches!(err, CatError::SessionNotFound(_)));
        assert!(engine.resume(&SessionId::from("missing")).await.is_err());
    }

    #[tokio::test]
    async fn runs_to_max_items_then_rejects_submits() {
        let engine = engine(10);
        let started = engine
            .start(StartRequest::new(ContentArea::ALL, 3, 3, "k"))
            .await
            .unwrap();
        let mut item = started.first_item.unwrap();
        let mut last = None;
        for i in 0..3 {
            let outcome = engine
                .submit_response(&started.session_id, &item.id, i % 2 == 0)
                .await
                .unwrap();
            if let Some(next) = outcome.next_item.clone() {
                item = next;
            }
            last = Some(outcome);
        }
        let last = last.unwrap();
        assert_eq!(last.status, SessionStatus::Complete);
        assert_eq!(last.items_administered, 3);
        assert!(last.next_item.is_none());
        assert!(last.score_report.is_some());

        let session = engine.session(&started.session_id).await.unwrap();
        assert_eq!(session.stop_reason(), Some(StopReason::MaxItems));

        let err = engine
            .submit_response(&started.session_id, &item.id, true)
            .await
            .unwrap_err();
        assert!(matches!(err, CatError::InvalidSession { .. }));
    }

    #[tokio::test]
    async fn bank_exhaustion_ends_early() {
        // One item per area, three areas requested, floor above what the bank holds.
        let engine = engine(1);
        let areas = [
            ContentArea::Cirurgia,
            ContentArea::Pediatria,
            ContentArea::SaudeColetiva,
        ];
        let started = engine
            .start(StartRequest::new(areas, 10, 20, "k"))
            .await
            .unwrap();
        let mut next = started.first_item;
        let mut outcome = None;
        while let Some(item) = next {
            let o = engine
                .submit_response(&started.session_id, &item.id, true)
                .await
                .unwrap();
            next = o.next_item.clone();
            outcome = Some(o);
        }
        let outcome = outcome.unwrap();
        assert_eq!(outcome.items_administered, 3);
        assert_eq!(outcome.status, SessionStatus::Complete);
        let session = engine.session(&started.session_id).await.unwrap();
        assert!(session.ended_early());
    }

    #[tokio::test]
    async fn resume_is_side_effect_free() {
        let engine = engine(10);
        let started = engine
            .start(StartRequest::new(ContentArea::ALL, 5, 10, "k"))
            .await
            .unwrap();
        let before = engine.session(&started.session_id).await.unwrap();
        let first = engine.resume(&started.session_id).await.unwrap();
        let second = engine.resume(&started.session_id).await.unwrap();
        let after = engine.session(&started.session_id).await.unwrap();

        assert_eq!(first.pending_item, started.first_item);
        assert_eq!(first.pending_item, second.pending_item);
        assert_eq!(before, after);
        assert_eq!(first.items_administered, 0);
        assert!(first.estimate.se.is_infinite());
    }

    #[tokio::test]
    async fn exposure_log_counts_administrations() {
        let log = Arc::new(MemoryExposureLog::new());
        let engine = CatEngine::new(
            bank(10),
            Arc::new(MemorySessionStore::new()),
            EngineConfig {
                max_exposure_rate: Some(0.5),
                ..Default::default()
            },
        )
        .unwrap()
        .with_exposure_log(log.clone());

        let first = engine
            .start(StartRequest::new(ContentArea::ALL, 5, 10, "a"))
            .await
            .unwrap()
            .first_item
            .unwrap();
        let second = engine
            .start(StartRequest::new(ContentArea::ALL, 5, 10, "b"))
            .await
            .unwrap()
            .first_item
            .unwrap();
        // Once the second session starts, the first item is at the cap.
        assert_ne!(first.id, second.id);
        let rates = log.exposure_rates().await.unwrap();
        assert!((rates[&first.id] - 0.5).abs() < 1e-12);
    }
}
