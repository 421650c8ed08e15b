//! Aggregate statistics over a simulation batch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::runner::RunResult;

/// Recovery and efficiency statistics for a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub runs: usize,
    pub mean_items: f64,
    pub min_items: u32,
    pub max_items: u32,
    /// Mean of (estimate - true theta).
    pub bias: f64,
    pub rmse: f64,
    #[serde(with = "adaptest_core::model::serde_se")]
    pub mean_se: f64,
    /// Share of runs whose true theta lies within 2·SE of the estimate.
    pub coverage_rate: f64,
    pub pass_rate: f64,
    /// Share of runs whose pass decision matches the true-theta decision.
    pub classification_accuracy: f64,
    pub ended_early: usize,
    pub stop_reasons: BTreeMap<String, usize>,
}

impl SimulationSummary {
    pub fn from_runs(runs: &[RunResult]) -> Self {
        if runs.is_empty() {
            return Self::default();
        }
        let n = runs.len() as f64;
        let mean = |f: &dyn Fn(&RunResult) -> f64| runs.iter().map(f).sum::<f64>() / n;
        let share = |f: &dyn Fn(&RunResult) -> bool| runs.iter().filter(|r| f(r)).count() as f64 / n;

        let mut stop_reasons = BTreeMap::new();
        for run in runs {
            let key = run
                .stop_reason
                .map(|reason| reason.to_string())
                .unwrap_or_else(|| "none".to_string());
            *stop_reasons.entry(key).or_insert(0) += 1;
        }

        let finite_se: Vec<f64> = runs.iter().map(|r| r.se).filter(|se| se.is_finite()).collect();
        let mean_se = if finite_se.is_empty() {
            f64::INFINITY
        } else {
            finite_se.iter().sum::<f64>() / finite_se.len() as f64
        };

        Self {
            runs: runs.len(),
            mean_items: mean(&|r| f64::from(r.items)),
            min_items: runs.iter().map(|r| r.items).min().unwrap_or(0),
            max_items: runs.iter().map(|r| r.items).max().unwrap_or(0),
            bias: mean(&|r| r.error()),
            rmse: mean(&|r| r.error().powi(2)).sqrt(),
            mean_se,
            coverage_rate: share(&|r| r.covered()),
            pass_rate: share(&|r| r.passed),
            classification_accuracy: share(&|r| r.passed == r.true_pass),
            ended_early: runs
                .iter()
                .filter(|r| r.stop_reason == Some(adaptest_core::StopReason::BankExhausted))
                .count(),
            stop_reasons,
        }
    }
}
