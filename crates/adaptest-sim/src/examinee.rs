//! Synthetic examinees that answer according to the 3PL model.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use adaptest_core::irt::probability_3pl;
use adaptest_core::CalibratedItem;

/// An examinee with a known true ability.
#[derive(Debug, Clone)]
pub struct SimulatedExaminee {
    true_theta: f64,
    rng: ChaCha8Rng,
}

impl SimulatedExaminee {
    pub fn new(true_theta: f64, seed: u64) -> Self {
        Self {
            true_theta,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn true_theta(&self) -> f64 {
        self.true_theta
    }

    /// Answer `item`: correct with probability P(θ_true).
    pub fn answer(&mut self, item: &CalibratedItem) -> bool {
        let p = probability_3pl(self.true_theta, &item.params);
        self.rng.gen::<f64>() < p
    }
}
