//! Expected A Posteriori (EAP) ability estimation.
//!
//! The posterior is evaluated on a fixed quadrature grid with a standard
//! normal prior:
//!
//! posterior(θ_k) ∝ φ(θ_k) · Π_i P(u_i | θ_k, item_i)
//!
//! Theta is the posterior mean and SE the posterior standard deviation.
//! Every call recomputes from the full response list; there is no
//! incremental state to drift over a long session.

use crate::config::EngineConfig;
use crate::error::CatError;
use crate::irt::{log_likelihood, PROBABILITY_FLOOR};
use crate::model::{AbilityEstimate, ResponseRecord};

/// Posterior mass in an outermost grid cell above which the estimate is
/// considered pinned to the edge of the grid.
const EDGE_MASS_THRESHOLD: f64 = 0.01;

/// Which edge of the theta grid a degenerate posterior piled up against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridEdge {
    Lower,
    Upper,
}

/// Result of one estimation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimation {
    pub estimate: AbilityEstimate,
    /// Set when the posterior is pinned to a grid boundary (e.g. long
    /// all-correct or all-incorrect histories). The reported values are
    /// already clamped to the grid; this is for logging only.
    pub edge: Option<GridEdge>,
}

/// EAP estimator over a fixed quadrature grid.
#[derive(Debug, Clone)]
pub struct EapEstimator {
    grid: Vec<f64>,
    log_prior: Vec<f64>,
    probability_floor: f64,
}

impl EapEstimator {
    /// Build an estimator with `points` evenly spaced nodes on
    /// `[theta_min, theta_max]`.
    pub fn new(
        theta_min: f64,
        theta_max: f64,
        points: usize,
        probability_floor: f64,
    ) -> Result<Self, CatError> {
        if points < 2 {
            return Err(CatError::InvalidConfig(
                "quadrature grid needs at least 2 points".into(),
            ));
        }
        if !(theta_min.is_finite() && theta_max.is_finite()) || theta_min >= theta_max {
            return Err(CatError::InvalidConfig(format!(
                "theta grid [{theta_min}, {theta_max}] is empty"
            )));
        }

        let step = (theta_max - theta_min) / (points - 1) as f64;
        let grid: Vec<f64> = (0..points).map(|k| theta_min + k as f64 * step).collect();
        // Standard normal log-density; the constant cancels on normalization.
        let log_prior = grid.iter().map(|t| -0.5 * t * t).collect();

        Ok(Self {
            grid,
            log_prior,
            probability_floor,
        })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, CatError> {
        Self::new(
            config.theta_min,
            config.theta_max,
            config.quadrature_points,
            config.probability_floor,
        )
    }

    /// The quadrature nodes.
    pub fn grid(&self) -> &[f64] {
        &self.grid
    }

    /// Estimate ability from the full ordered response history.
    pub fn estimate(&self, responses: &[ResponseRecord]) -> Estimation {
        if responses.is_empty() {
            return Estimation {
                estimate: AbilityEstimate::prior(),
                edge: None,
            };
        }

        // Work in log space and shift by the maximum before exponentiating
        // so long histories do not underflow every node to zero.
        let log_posterior: Vec<f64> = self
            .grid
            .iter()
            .zip(&self.log_prior)
            .map(|(&theta, &log_prior)| {
                log_prior
                    + responses
                        .iter()
                        .map(|r| log_likelihood(theta, &r.params, r.correct, self.probability_floor))
                        .sum::<f64>()
            })
            .collect();

        let max = log_posterior
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        let weights: Vec<f64> = log_posterior.iter().map(|lp| (lp - max).exp()).collect();
        let total: f64 = weights.iter().sum();

        let mean = self
            .grid
            .iter()
            .zip(&weights)
            .map(|(t, w)| t * w)
            .sum::<f64>()
            / total;
        let variance = self
            .grid
            .iter()
            .zip(&weights)
            .map(|(t, w)| (t - mean).powi(2) * w)
            .sum::<f64>()
            / total;

        let lower = self.grid[0];
        let upper = self.grid[self.grid.len() - 1];
        let theta = mean.clamp(lower, upper);
        let se = variance.max(0.0).sqrt();

        let edge = if weights[0] / total > EDGE_MASS_THRESHOLD {
            Some(GridEdge::Lower)
        } else if weights[weights.len() - 1] / total > EDGE_MASS_THRESHOLD {
            Some(GridEdge::Upper)
        } else {
            None
        };

        Estimation {
            estimate: AbilityEstimate { theta, se },
            edge,
        }
    }
}

impl Default for EapEstimator {
    fn default() -> Self {
        let step = 0.1;
        let grid: Vec<f64> = (0..81).map(|k| -4.0 + k as f64 * step).collect();
        let log_prior = grid.iter().map(|t| -0.5 * t * t).collect();
        Self {
            grid,
            log_prior,
            probability_floor: PROBABILITY_FLOOR,
        }
    }
}
