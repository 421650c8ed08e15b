//! Engine configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CatError;
use crate::model::ContentArea;

/// Tunable engine parameters.
///
/// `target_se` is a configuration constant, not a derived one: it sets the
/// precision at which a session may stop once the item floor is met.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Default item floor when a start request does not give one.
    #[serde(default = "default_min_items")]
    pub min_items: u32,
    /// Default item ceiling when a start request does not give one.
    #[serde(default = "default_max_items")]
    pub max_items: u32,
    /// Stop once SE falls to this value (after `min_items`).
    #[serde(default = "default_target_se")]
    pub target_se: f64,
    /// Number of quadrature points on the theta grid.
    #[serde(default = "default_quadrature_points")]
    pub quadrature_points: usize,
    /// Lower edge of the theta grid.
    #[serde(default = "default_theta_min")]
    pub theta_min: f64,
    /// Upper edge of the theta grid.
    #[serde(default = "default_theta_max")]
    pub theta_max: f64,
    /// Probabilities are clamped into `[floor, 1 - floor]`.
    #[serde(default = "default_probability_floor")]
    pub probability_floor: f64,
    /// Exposure cap; `None` disables exposure control.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_exposure_rate: Option<f64>,
    /// Explicit per-area minimum coverage; areas not listed get an even
    /// share of `min_items`.
    #[serde(default)]
    pub area_minimums: BTreeMap<ContentArea, u32>,
}

fn default_min_items() -> u32 {
    30
}
fn default_max_items() -> u32 {
    80
}
fn default_target_se() -> f64 {
    0.30
}
fn default_quadrature_points() -> usize {
    81
}
fn default_theta_min() -> f64 {
    -4.0
}
fn default_theta_max() -> f64 {
    4.0
}
fn default_probability_floor() -> f64 {
    crate::irt::PROBABILITY_FLOOR
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_items: default_min_items(),
            max_items: default_max_items(),
            target_se: default_target_se(),
            quadrature_points: default_quadrature_points(),
            theta_min: default_theta_min(),
            theta_max: default_theta_max(),
            probability_floor: default_probability_floor(),
            max_exposure_rate: None,
            area_minimums: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    /// Check internal consistency.
    pub fn validate(&self) -> Result<(), CatError> {
        validate_bounds(self.min_items, self.max_items)?;
        if !(self.target_se.is_finite() && self.target_se > 0.0) {
            return Err(CatError::InvalidConfig(format!(
                "target_se must be a positive number, got {}",
                self.target_se
            )));
        }
        if self.quadrature_points < 2 {
            return Err(CatError::InvalidConfig(
                "quadrature_points must be at least 2".into(),
            ));
        }
        if !(self.theta_min.is_finite() && self.theta_max.is_finite())
            || self.theta_min >= self.theta_max
        {
            return Err(CatError::InvalidConfig(format!(
                "theta grid [{}, {}] is empty",
                self.theta_min, self.theta_max
            )));
        }
        if !(self.probability_floor > 0.0 && self.probability_floor < 0.5) {
            return Err(CatError::InvalidConfig(format!(
                "probability_floor must be in (0, 0.5), got {}",
                self.probability_floor
            )));
        }
        if let Some(rate) = self.max_exposure_rate {
            if !(rate > 0.0 && rate <= 1.0) {
                return Err(CatError::InvalidConfig(format!(
                    "max_exposure_rate must be in (0, 1], got {rate}"
                )));
            }
        }
        Ok(())
    }
}

/// Check a (min, max) item-count pair.
pub fn validate_bounds(min_items: u32, max_items: u32) -> Result<(), CatError> {
    if max_items == 0 {
        return Err(CatError::InvalidConfig("max_items must be at least 1".into()));
    }
    if min_items > max_items {
        return Err(CatError::InvalidConfig(format!(
            "min_items ({min_items}) exceeds max_items ({max_items})"
        )));
    }
    Ok(())
}
