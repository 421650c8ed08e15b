//! Batch simulation runner.
//!
//! Runs synthetic examinees through a real [`CatEngine`] with bounded
//! parallelism and collects one [`RunResult`] per examinee.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use uuid::Uuid;

use adaptest_core::memory::{MemoryExposureLog, MemoryItemBank, MemorySessionStore};
use adaptest_core::scoring::{is_passing, scaled_score};
use adaptest_core::traits::ItemBank;
use adaptest_core::{CatEngine, ContentArea, EngineConfig, StartRequest, StopReason, ThetaPoint};

use crate::examinee::SimulatedExaminee;
use crate::report::SimulationReport;
use crate::summary::SimulationSummary;

/// Where each examinee's true ability comes from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThetaSource {
    /// Every examinee has the same ability.
    Fixed { theta: f64 },
    /// Abilities drawn from N(mean, sd).
    Normal { mean: f64, sd: f64 },
}

impl Default for ThetaSource {
    fn default() -> Self {
        ThetaSource::Normal { mean: 0.0, sd: 1.0 }
    }
}

/// Configuration for a simulation batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub examinees: usize,
    pub theta: ThetaSource,
    pub seed: u64,
    /// Maximum sessions in flight at once.
    pub parallelism: usize,
    pub areas: Vec<ContentArea>,
    pub min_items: u32,
    pub max_items: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            examinees: 100,
            theta: ThetaSource::default(),
            seed: 42,
            parallelism: 4,
            areas: ContentArea::ALL.to_vec(),
            min_items: 30,
            max_items: 80,
        }
    }
}

/// Outcome of one simulated session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub examinee: usize,
    pub true_theta: f64,
    pub theta: f64,
    #[serde(with = "adaptest_core::model::serde_se")]
    pub se: f64,
    pub items: u32,
    pub correct: u32,
    pub scaled_score: u16,
    pub passed: bool,
    /// Pass decision the true ability would have earned.
    pub true_pass: bool,
    pub stop_reason: Option<StopReason>,
    pub history: Vec<ThetaPoint>,
}

impl RunResult {
    pub fn error(&self) -> f64 {
        self.theta - self.true_theta
    }

    /// Whether the true ability lies within two standard errors.
    pub fn covered(&self) -> bool {
        self.se.is_finite() && self.error().abs() <= 2.0 * self.se
    }
}

/// Progress reporting trait.
pub trait SimulationReporter: Send + Sync {
    fn on_run_start(&self, examinee: usize, true_theta: f64);
    fn on_run_complete(&self, result: &RunResult);
    fn on_run_error(&self, examinee: usize, error: &str);
    fn on_batch_complete(&self, total: usize, completed: usize, failed: usize, elapsed: Duration);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl SimulationReporter for NoopReporter {
    fn on_run_start(&self, _: usize, _: f64) {}
    fn on_run_complete(&self, _: &RunResult) {}
    fn on_run_error(&self, _: usize, _: &str) {}
    fn on_batch_complete(&self, _: usize, _: usize, _: usize, _: Duration) {}
}

/// Drives simulated examinees through the engine.
pub struct Simulator {
    bank: Arc<MemoryItemBank>,
    engine_config: EngineConfig,
}

impl Simulator {
    pub fn new(bank: Arc<MemoryItemBank>, engine_config: EngineConfig) -> Self {
        Self {
            bank,
            engine_config,
        }
    }

    /// Run a batch. Each batch uses a fresh in-memory session store, and a
    /// fresh exposure log when an exposure cap is configured.
    pub async fn run_batch(
        &self,
        config: &SimulationConfig,
        progress: &dyn SimulationReporter,
    ) -> Result<SimulationReport> {
        let start = Instant::now();
        let mut engine = CatEngine::new(
            self.bank.clone(),
            Arc::new(MemorySessionStore::new()),
            self.engine_config.clone(),
        )
        .context("invalid engine configuration")?;
        if self.engine_config.max_exposure_rate.is_some() {
            engine = engine.with_exposure_log(Arc::new(MemoryExposureLog::new()));
        }
        let engine = Arc::new(engine);
        let thetas = draw_thetas(config)?;
        let semaphore = Arc::new(Semaphore::new(config.parallelism.max(1)));
        let batch_id = Uuid::new_v4();

        let mut futures = FuturesUnordered::new();
        for (index, true_theta) in thetas.into_iter().enumerate() {
            let engine = Arc::clone(&engine);
            let semaphore = Arc::clone(&semaphore);
            let request = StartRequest::new(
                config.areas.iter().copied(),
                config.min_items,
                config.max_items,
                format!("sim-{batch_id}-{index}"),
            );
            let examinee =
                SimulatedExaminee::new(true_theta, config.seed.wrapping_add(index as u64 + 1));
            progress.on_run_start(index, true_theta);

            futures.push(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return Err((index, anyhow::Error::new(e).context("semaphore closed")))
                    }
                };
                run_one(&engine, request, examinee, index).await
            });
        }

        let mut runs = Vec::new();
        let mut failed = 0usize;
        while let Some(outcome) = futures.next().await {
            match outcome {
                Ok(run) => {
                    progress.on_run_complete(&run);
                    runs.push(run);
                }
                Err((index, e)) => {
                    failed += 1;
                    tracing::warn!(examinee = index, "simulated session failed: {e:#}");
                    progress.on_run_error(index, &format!("{e:#}"));
                }
            }
        }
        runs.sort_by_key(|run| run.examinee);

        let elapsed = start.elapsed();
        progress.on_batch_complete(config.examinees, runs.len(), failed, elapsed);

        let summary = SimulationSummary::from_runs(&runs);
        tracing::info!(
            runs = runs.len(),
            failed,
            rmse = summary.rmse,
            coverage = summary.coverage_rate,
            "simulation batch complete"
        );

        Ok(SimulationReport::new(
            self.bank.name().to_string(),
            config.clone(),
            self.engine_config.clone(),
            summary,
            runs,
            failed,
            elapsed,
        ))
    }
}

fn draw_thetas(config: &SimulationConfig) -> Result<Vec<f64>> {
    match config.theta {
        ThetaSource::Fixed { theta } => Ok(vec![theta; config.examinees]),
        ThetaSource::Normal { mean, sd } => {
            let normal = Normal::new(mean, sd)
                .with_context(|| format!("invalid ability distribution N({mean}, {sd})"))?;
            let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
            Ok((0..config.examinees)
                .map(|_| normal.sample(&mut rng))
                .collect())
        }
    }
}

async fn run_one(
    engine: &CatEngine,
    request: StartRequest,
    mut examinee: SimulatedExaminee,
    index: usize,
) -> Result<RunResult, (usize, anyhow::Error)> {
    let fail = |e: adaptest_core::CatError| (index, anyhow::Error::new(e));

    let started = engine.start(request).await.map_err(fail)?;
    let mut next = started.first_item;
    while let Some(item) = next {
        let correct = examinee.answer(&item);
        let outcome = engine
            .submit_response(&started.session_id, &item.id, correct)
            .await
            .map_err(fail)?;
        next = outcome.next_item;
    }

    let session = engine.session(&started.session_id).await.map_err(fail)?;
    let estimate = *session.estimate();
    let scaled = scaled_score(estimate.theta);
    Ok(RunResult {
        examinee: index,
        true_theta: examinee.true_theta(),
        theta: estimate.theta,
        se: estimate.se,
        items: session.item_count(),
        correct: session.correct_count(),
        scaled_score: scaled,
        passed: is_passing(scaled),
        true_pass: is_passing(scaled_score(examinee.true_theta())),
        stop_reason: session.stop_reason(),
        history: session.history().to_vec(),
    })
}
