//! Three-parameter logistic (3PL) response model.

use crate::model::IrtParams;

/// Default bound keeping probabilities away from exactly 0 and 1.
pub const PROBABILITY_FLOOR: f64 = 1e-10;

/// Probability of a correct response under the 3PL model.
///
/// P(θ) = c + (1 - c) / (1 + exp(-a(θ - b)))
pub fn probability_3pl(theta: f64, params: &IrtParams) -> f64 {
    let IrtParams { a, b, c } = *params;
    c + (1.0 - c) / (1.0 + (-a * (theta - b)).exp())
}

/// Clamp a probability into `[floor, 1 - floor]`.
pub fn clamp_probability(p: f64, floor: f64) -> f64 {
    p.clamp(floor, 1.0 - floor)
}

/// Log-likelihood of one observed outcome at `theta`.
pub fn log_likelihood(theta: f64, params: &IrtParams, correct: bool, floor: f64) -> f64 {
    let p = clamp_probability(probability_3pl(theta, params), floor);
    if correct {
        p.ln()
    } else {
        (1.0 - p).ln()
    }
}

/// Fisher information of an item at `theta`.
///
/// I(θ) = a² (P - c)² (1 - P) / ((1 - c)² P)
pub fn item_information(theta: f64, params: &IrtParams) -> f64 {
    let IrtParams { a, c, .. } = *params;
    let p = clamp_probability(probability_3pl(theta, params), PROBABILITY_FLOOR);
    let denominator = (1.0 - c).powi(2) * p;
    if denominator <= 0.0 {
        return 0.0;
    }
    a * a * (p - c).powi(2) * (1.0 - p) / denominator
}

/// Test information: the sum of item information.
pub fn test_information<'a>(theta: f64, items: impl IntoIterator<Item = &'a IrtParams>) -> f64 {
    items
        .into_iter()
        .map(|params| item_information(theta, params))
        .sum()
}
