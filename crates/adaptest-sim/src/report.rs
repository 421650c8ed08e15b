//! Simulation reports with JSON persistence and regression detection.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use adaptest_core::EngineConfig;

use crate::runner::{RunResult, SimulationConfig};
use crate::summary::SimulationSummary;

/// A complete simulation report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    /// Name of the item bank used.
    pub bank: String,
    pub config: SimulationConfig,
    pub engine: EngineConfig,
    pub summary: SimulationSummary,
    /// Per-examinee results, ordered by examinee index.
    pub runs: Vec<RunResult>,
    /// Sessions that ended in an error.
    pub failed: usize,
    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl SimulationReport {
    pub fn new(
        bank: String,
        config: SimulationConfig,
        engine: EngineConfig,
        summary: SimulationSummary,
        runs: Vec<RunResult>,
        failed: usize,
        elapsed: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            bank,
            config,
            engine,
            summary,
            runs,
            failed,
            duration_ms: elapsed.as_millis() as u64,
        }
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: SimulationReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Compare this report's summary against a baseline.
    ///
    /// A metric counts as changed when it moves by more than `threshold`
    /// in absolute terms.
    pub fn compare(&self, baseline: &SimulationReport, threshold: f64) -> RegressionReport {
        let current = metrics(&self.summary);
        let previous = metrics(&baseline.summary);

        let mut regressions = Vec::new();
        let mut improvements = Vec::new();
        let mut unchanged = 0usize;

        for ((name, current, direction), (_, baseline_value, _)) in current.into_iter().zip(previous) {
            if !(current.is_finite() && baseline_value.is_finite()) {
                unchanged += 1;
                continue;
            }
            let delta = current - baseline_value;
            let change = MetricChange {
                metric: name.to_string(),
                baseline: baseline_value,
                current,
                delta,
            };
            let better = match direction {
                Better::Lower => delta < -threshold,
                Better::Higher => delta > threshold,
            };
            let worse = match direction {
                Better::Lower => delta > threshold,
                Better::Higher => delta < -threshold,
            };
            if worse {
                regressions.push(change);
            } else if better {
                improvements.push(change);
            } else {
                unchanged += 1;
            }
        }

        RegressionReport {
            regressions,
            improvements,
            unchanged,
        }
    }
}

#[derive(Clone, Copy)]
enum Better {
    Lower,
    Higher,
}

fn metrics(summary: &SimulationSummary) -> [(&'static str, f64, Better); 6] {
    [
        ("rmse", summary.rmse, Better::Lower),
        ("abs_bias", summary.bias.abs(), Better::Lower),
        ("mean_se", summary.mean_se, Better::Lower),
        ("mean_items", summary.mean_items, Better::Lower),
        ("coverage_rate", summary.coverage_rate, Better::Higher),
        (
            "classification_accuracy",
            summary.classification_accuracy,
            Better::Higher,
        ),
    ]
}

/// Result of comparing two reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionReport {
    pub regressions: Vec<MetricChange>,
    pub improvements: Vec<MetricChange>,
    pub unchanged: usize,
}

/// One metric that moved beyond the threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricChange {
    pub metric: String,
    pub baseline: f64,
    pub current: f64,
    pub delta: f64,
}

impl RegressionReport {
    pub fn has_regressions(&self) -> bool {
        !self.regressions.is_empty()
    }

    /// Format the regression report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "**Summary:** {} regressions, {} improvements, {} unchanged\n\n",
            self.regressions.len(),
            self.improvements.len(),
            self.unchanged
        ));

        for (title, changes) in [
            ("Regressions", &self.regressions),
            ("Improvements", &self.improvements),
        ] {
            if changes.is_empty() {
                continue;
            }
            md.push_str(&format!("### {title}\n\n"));
            md.push_str("| Metric | Baseline | Current | Delta |\n");
            md.push_str("|--------|----------|---------|-------|\n");
            for c in changes {
                md.push_str(&format!(
                    "| {} | {:.4} | {:.4} | {:+.4} |\n",
                    c.metric, c.baseline, c.current, c.delta
                ));
            }
            md.push('\n');
        }

        md
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(rmse: f64, coverage: f64) -> SimulationReport {
        SimulationReport::new(
            "bank".into(),
            SimulationConfig::default(),
            EngineConfig::default(),
            SimulationSummary {
                runs: 10,
                rmse,
                coverage_rate: coverage,
                mean_se: 0.3,
                mean_items: 50.0,
                classification_accuracy: 0.9,
                ..Default::default()
            },
            Vec::new(),
            0,
            Duration::from_millis(1500),
        )
    }

    #[test]
    fn json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.json");
        let original = report(0.3, 0.95);
        original.save_json(&path).unwrap();
        let loaded = SimulationReport::load_json(&path).unwrap();
        assert_eq!(loaded.id, original.id);
        assert_eq!(loaded.summary, original.summary);
        assert_eq!(loaded.duration_ms, 1500);
    }

    #[test]
    fn compare_detects_direction() {
        let baseline = report(0.30, 0.95);
        let worse = report(0.40, 0.80);
        let diff = worse.compare(&baseline, 0.02);
        assert!(diff.has_regressions());
        let names: Vec<_> = diff.regressions.iter().map(|c| c.metric.as_str()).collect();
        assert!(names.contains(&"rmse"));
        assert!(names.contains(&"coverage_rate"));
        assert!(diff.improvements.is_empty());

        let better = report(0.20, 0.96);
        let diff = better.compare(&baseline, 0.02);
        assert!(!diff.has_regressions());
        assert_eq!(diff.improvements.len(), 1);
        assert!(diff.to_markdown().contains("### Improvements"));
    }
}
