//! The `adaptest score` command.

use anyhow::Result;

use adaptest_core::scoring::score_report;
use adaptest_core::AbilityEstimate;

use super::print_json;

pub fn execute(theta: f64, se: Option<f64>, items: u32) -> Result<()> {
    anyhow::ensure!(theta.is_finite(), "theta must be a finite number");
    if let Some(se) = se {
        anyhow::ensure!(se >= 0.0, "se must not be negative");
    }
    let estimate = AbilityEstimate {
        theta,
        se: se.unwrap_or(f64::INFINITY),
    };
    print_json(&score_report(&estimate, items))
}
