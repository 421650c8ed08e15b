//! adaptest-sim: Monte Carlo simulation of adaptive sessions.
//!
//! Generates synthetic item banks and examinees, runs them through a real
//! [`adaptest_core::CatEngine`] and reports how well ability is recovered.

pub mod bank;
pub mod examinee;
pub mod report;
pub mod runner;
pub mod summary;

pub use bank::{generate_bank, BankSpec};
pub use examinee::SimulatedExaminee;
pub use report::{RegressionReport, SimulationReport};
pub use runner::{
    NoopReporter, RunResult, SimulationConfig, SimulationReporter, Simulator, ThetaSource,
};
pub use summary::SimulationSummary;
