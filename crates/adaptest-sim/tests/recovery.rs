use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use adaptest_core::memory::MemoryItemBank;
use adaptest_core::{ContentArea, EngineConfig, StopReason};
use adaptest_sim::{
    generate_bank, BankSpec, NoopReporter, RunResult, SimulationConfig, SimulationReporter,
    Simulator, ThetaSource,
};

fn simulator(items_per_area: usize) -> Simulator {
    let items = generate_bank(&BankSpec {
        items_per_area,
        areas: ContentArea::ALL.to_vec(),
        seed: 2024,
    })
    .unwrap();
    Simulator::new(
        Arc::new(MemoryItemBank::new("synthetic", items)),
        EngineConfig {
            target_se: 0.3,
            ..Default::default()
        },
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn high_ability_examinee_is_recovered() {
    let config = SimulationConfig {
        examinees: 40,
        theta: ThetaSource::Fixed { theta: 1.2 },
        seed: 7,
        parallelism: 4,
        areas: ContentArea::ALL.to_vec(),
        min_items: 45,
        max_items: 75,
    };
    let report = simulator(60).run_batch(&config, &NoopReporter).await.unwrap();

    assert_eq!(report.failed, 0);
    assert_eq!(report.runs.len(), 40);
    for run in &report.runs {
        assert!((45..=75).contains(&run.items), "{} items", run.items);
        assert_eq!(run.passed, run.scaled_score >= 600);
        assert!(run.se.is_finite());
        assert_ne!(run.stop_reason, Some(StopReason::BankExhausted));
    }
    // True theta inside 2·SE for the large majority of runs.
    assert!(
        report.summary.coverage_rate >= 0.8,
        "coverage {}",
        report.summary.coverage_rate
    );
    assert!(report.summary.bias.abs() < 0.3, "bias {}", report.summary.bias);
}

#[tokio::test]
async fn small_bank_ends_early() {
    let config = SimulationConfig {
        examinees: 3,
        theta: ThetaSource::Fixed { theta: 0.0 },
        min_items: 30,
        max_items: 40,
        ..Default::default()
    };
    let report = simulator(4).run_batch(&config, &NoopReporter).await.unwrap();
    assert_eq!(report.summary.ended_early, 3);
    assert!(report.runs.iter().all(|r| r.items == 20));
}

#[tokio::test]
async fn batches_are_reproducible() {
    let config = SimulationConfig {
        examinees: 6,
        seed: 99,
        min_items: 10,
        max_items: 20,
        ..Default::default()
    };
    let sim = simulator(20);
    let first = sim.run_batch(&config, &NoopReporter).await.unwrap();
    let second = sim.run_batch(&config, &NoopReporter).await.unwrap();
    let key = |runs: &[RunResult]| -> Vec<(u32, u16)> {
        runs.iter().map(|r| (r.items, r.scaled_score)).collect()
    };
    assert_eq!(key(&first.runs), key(&second.runs));
    assert_eq!(first.summary, second.summary);
}

#[derive(Default)]
struct CountingReporter {
    started: AtomicUsize,
    completed: AtomicUsize,
    batches: AtomicUsize,
}

impl SimulationReporter for CountingReporter {
    fn on_run_start(&self, _: usize, _: f64) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }
    fn on_run_complete(&self, _: &RunResult) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
    fn on_run_error(&self, _: usize, _: &str) {}
    fn on_batch_complete(&self, _: usize, _: usize, _: usize, _: Duration) {
        self.batches.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn reporter_sees_every_run() {
    let reporter = CountingReporter::default();
    let config = SimulationConfig {
        examinees: 5,
        min_items: 5,
        max_items: 8,
        ..Default::default()
    };
    simulator(10).run_batch(&config, &reporter).await.unwrap();
    assert_eq!(reporter.started.load(Ordering::SeqCst), 5);
    assert_eq!(reporter.completed.load(Ordering::SeqCst), 5);
    assert_eq!(reporter.batches.load(Ordering::SeqCst), 1);
}

fn distinct_first_estimates(runs: &[RunResult]) -> usize {
    let mut values: Vec<i64> = runs
        .iter()
        .filter_map(|r| r.history.first())
        .map(|point| (point.theta * 1e6).round() as i64)
        .collect();
    values.sort_unstable();
    values.dedup();
    values.len()
}

#[tokio::test]
async fn exposure_cap_spreads_first_items() {
    let items = generate_bank(&BankSpec {
        items_per_area: 30,
        areas: ContentArea::ALL.to_vec(),
        seed: 2024,
    })
    .unwrap();
    let bank = Arc::new(MemoryItemBank::new("synthetic", items));
    let config = SimulationConfig {
        examinees: 10,
        theta: ThetaSource::Fixed { theta: 0.0 },
        parallelism: 1,
        min_items: 5,
        max_items: 5,
        ..Default::default()
    };

    // Everyone starts at the prior, so without a cap the first item is shared.
    let uncapped = Simulator::new(bank.clone(), EngineConfig::default())
        .run_batch(&config, &NoopReporter)
        .await
        .unwrap();
    assert!(distinct_first_estimates(&uncapped.runs) <= 2);

    let capped = Simulator::new(
        bank,
        EngineConfig {
            max_exposure_rate: Some(0.3),
            ..Default::default()
        },
    )
    .run_batch(&config, &NoopReporter)
    .await
    .unwrap();
    assert!(distinct_first_estimates(&capped.runs) > 2);
}
