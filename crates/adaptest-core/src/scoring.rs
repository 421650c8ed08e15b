//! Score transformation: theta to the reporting scale.
//!
//! The mapping is fixed: `round(500 + 100·θ)` clamped to `[0, 1000]`, with
//! a pass at 600 or above (one standard deviation above the mean).

use serde::{Deserialize, Serialize};

use crate::model::{serde_se, AbilityEstimate};

pub const SCALE_MEAN: f64 = 500.0;
pub const SCALE_SD: f64 = 100.0;
pub const SCALE_MIN: u16 = 0;
pub const SCALE_MAX: u16 = 1000;
/// Lowest passing scaled score.
pub const PASS_THRESHOLD: u16 = 600;
/// Theta at the pass threshold.
pub const CUT_THETA: f64 = 1.0;

/// Final result of a completed session. Immutable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub theta: f64,
    #[serde(with = "serde_se")]
    pub se: f64,
    pub scaled_score: u16,
    pub passed: bool,
    pub items_administered: u32,
    /// Probability that the true ability is at or above the cut.
    pub pass_probability: f64,
    /// Display precision in `[0, 100]`.
    pub precision: f64,
}

/// Build a score report from a final estimate.
pub fn score_report(estimate: &AbilityEstimate, items_administered: u32) -> ScoreReport {
    let scaled = scaled_score(estimate.theta);
    ScoreReport {
        theta: estimate.theta,
        se: estimate.se,
        scaled_score: scaled,
        passed: is_passing(scaled),
        items_administered,
        pass_probability: pass_probability(estimate.theta, estimate.se),
        precision: precision_percentage(estimate.se),
    }
}

pub fn scaled_score(theta: f64) -> u16 {
    if theta.is_nan() {
        return SCALE_MEAN as u16;
    }
    let raw = (SCALE_MEAN + SCALE_SD * theta).round();
    raw.clamp(SCALE_MIN as f64, SCALE_MAX as f64) as u16
}

pub fn is_passing(scaled: u16) -> bool {
    scaled >= PASS_THRESHOLD
}

/// Inverse of [`scaled_score`] (exact for unclamped scores).
pub fn scaled_score_to_theta(score: u16) -> f64 {
    (f64::from(score) - SCALE_MEAN) / SCALE_SD
}

/// Progress-display precision: `100 - 300·SE`, clamped to `[0, 100]`.
pub fn precision_percentage(se: f64) -> f64 {
    if !se.is_finite() {
        return 0.0;
    }
    (100.0 - 300.0 * se).clamp(0.0, 100.0)
}

/// Probability that ability is at or above [`CUT_THETA`], treating the
/// estimate as normal with the given SE.
pub fn pass_probability(theta: f64, se: f64) -> f64 {
    if se <= 0.0 {
        return if is_passing(scaled_score(theta)) { 1.0 } else { 0.0 };
    }
    if !se.is_finite() {
        return 0.5;
    }
    normal_cdf((theta - CUT_THETA) / se)
}

/// Standard normal CDF (Abramowitz and Stegun 26.2.17, error < 7.5e-8).
pub fn normal_cdf(x: f64) -> f64 {
    const P: f64 = 0.231_641_9;
    const B: [f64; 5] = [
        0.319_381_530,
        -0.356_563_782,
        1.781_477_937,
        -1.821_255_978,
        1.330_274_429,
    ];

    let z = x.abs();
    let t = 1.0 / (1.0 + P * z);
    let poly = B.iter().rev().fold(0.0, |acc, b| acc * t + b) * t;
    let density = (-0.5 * z * z).exp() / (2.0 * std::f64::consts::PI).sqrt();
    let upper = density * poly;
    if x >= 0.0 {
        1.0 - upper
    } else {
        upper
    }
}
