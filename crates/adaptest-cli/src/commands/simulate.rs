//! The `adaptest simulate` command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use adaptest_core::memory::MemoryItemBank;
use adaptest_core::traits::ItemBank;
use adaptest_report::write_html_report;
use adaptest_sim::{
    generate_bank, BankSpec, RunResult, SimulationConfig, SimulationReport, SimulationReporter,
    Simulator, ThetaSource,
};
use adaptest_store::{load_bank, load_config_from};

use super::parse_areas;

pub struct SimulateArgs {
    pub examinees: usize,
    pub theta: Option<f64>,
    pub theta_mean: f64,
    pub theta_sd: f64,
    pub seed: u64,
    pub parallelism: usize,
    pub bank: Option<PathBuf>,
    pub areas: Option<String>,
    pub min_items: Option<u32>,
    pub max_items: Option<u32>,
    pub output: PathBuf,
    pub format: String,
    pub baseline: Option<PathBuf>,
    pub threshold: f64,
    pub fail_on_regression: bool,
    pub config: Option<PathBuf>,
}

/// Console progress reporter.
struct ConsoleReporter;

impl SimulationReporter for ConsoleReporter {
    fn on_run_start(&self, examinee: usize, true_theta: f64) {
        tracing::debug!(examinee, true_theta, "examinee queued");
    }

    fn on_run_complete(&self, result: &RunResult) {
        let stop = result
            .stop_reason
            .map(|reason| reason.to_string())
            .unwrap_or_else(|| "-".to_string());
        eprintln!(
            "  Done: #{} true {:+.2} est {:+.2} ({} items, score {}, {})",
            result.examinee,
            result.true_theta,
            result.theta,
            result.items,
            result.scaled_score,
            stop,
        );
    }

    fn on_run_error(&self, examinee: usize, error: &str) {
        eprintln!("  ERROR: #{examinee}: {error}");
    }

    fn on_batch_complete(&self, total: usize, completed: usize, failed: usize, elapsed: Duration) {
        eprintln!(
            "\nComplete: {completed}/{total} succeeded, {failed} failed ({:.1}s)",
            elapsed.as_secs_f64()
        );
    }
}

pub async fn execute(args: SimulateArgs) -> Result<()> {
    anyhow::ensure!(args.examinees >= 1, "examinees must be at least 1");
    anyhow::ensure!(args.parallelism >= 1, "parallelism must be at least 1");
    anyhow::ensure!(
        args.threshold.is_finite() && args.threshold >= 0.0,
        "threshold must be a non-negative number"
    );

    let config = load_config_from(args.config.as_deref())?;
    let areas = parse_areas(args.areas.as_deref(), &config.default_areas)?;

    let bank = match args.bank.as_deref().or(config.bank.as_deref()) {
        Some(path) => load_bank(path)?,
        None => {
            let spec = BankSpec {
                seed: args.seed,
                ..Default::default()
            };
            MemoryItemBank::new("synthetic", generate_bank(&spec)?)
        }
    };

    let theta = match args.theta {
        Some(theta) => ThetaSource::Fixed { theta },
        None => ThetaSource::Normal {
            mean: args.theta_mean,
            sd: args.theta_sd,
        },
    };
    let sim_config = SimulationConfig {
        examinees: args.examinees,
        theta,
        seed: args.seed,
        parallelism: args.parallelism,
        areas,
        min_items: args.min_items.unwrap_or(config.engine.min_items),
        max_items: args.max_items.unwrap_or(config.engine.max_items),
    };

    eprintln!(
        "adaptest v{} simulating {} examinees on '{}' ({} items)",
        env!("CARGO_PKG_VERSION"),
        sim_config.examinees,
        bank.name(),
        bank.len()
    );
    eprintln!();

    let simulator = Simulator::new(Arc::new(bank), config.engine.clone());
    let report = simulator.run_batch(&sim_config, &ConsoleReporter).await?;

    print_summary(&report);

    std::fs::create_dir_all(&args.output)?;
    let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H%M%S");

    let formats: Vec<&str> = if args.format == "all" {
        vec!["json", "html"]
    } else {
        args.format.split(',').map(str::trim).collect()
    };

    for fmt in &formats {
        match *fmt {
            "json" => {
                let path = args.output.join(format!("simulation-{timestamp}.json"));
                report.save_json(&path)?;
                eprintln!("Results saved to: {}", path.display());
            }
            "html" => {
                let path = args.output.join(format!("simulation-{timestamp}.html"));
                write_html_report(&report, &path)?;
                eprintln!("HTML report: {}", path.display());
            }
            _ => {
                eprintln!("Unknown format: {fmt}");
            }
        }
    }

    if let Some(baseline_path) = &args.baseline {
        let baseline = SimulationReport::load_json(baseline_path)?;
        let comparison = report.compare(&baseline, args.threshold);
        println!("{}", comparison.to_markdown());
        if args.fail_on_regression && comparison.has_regressions() {
            anyhow::bail!(
                "{} metric(s) regressed against {}",
                comparison.regressions.len(),
                baseline_path.display()
            );
        }
    }

    Ok(())
}

fn print_summary(report: &SimulationReport) {
    use comfy_table::{Cell, Table};

    let s = &report.summary;
    let mut table = Table::new();
    table.set_header(vec![
        "Runs", "Items", "Bias", "RMSE", "Mean SE", "Coverage", "Pass", "Accuracy", "Early",
    ]);
    let mean_se = if s.mean_se.is_finite() {
        format!("{:.3}", s.mean_se)
    } else {
        "-".to_string()
    };
    table.add_row(vec![
        Cell::new(s.runs),
        Cell::new(format!("{:.1} ({}..{})", s.mean_items, s.min_items, s.max_items)),
        Cell::new(format!("{:+.3}", s.bias)),
        Cell::new(format!("{:.3}", s.rmse)),
        Cell::new(mean_se),
        Cell::new(format!("{:.1}%", s.coverage_rate * 100.0)),
        Cell::new(format!("{:.1}%", s.pass_rate * 100.0)),
        Cell::new(format!("{:.1}%", s.classification_accuracy * 100.0)),
        Cell::new(s.ended_early),
    ]);

    eprintln!("\n{table}");
}
