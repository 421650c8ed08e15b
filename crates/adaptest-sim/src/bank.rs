//! Synthetic calibrated item banks.

use anyhow::{Context, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal, Uniform};
use serde::{Deserialize, Serialize};

use adaptest_core::{CalibratedItem, ContentArea, IrtParams};

/// Shape of a generated bank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankSpec {
    pub items_per_area: usize,
    pub areas: Vec<ContentArea>,
    pub seed: u64,
}

impl Default for BankSpec {
    fn default() -> Self {
        Self {
            items_per_area: 60,
            areas: ContentArea::ALL.to_vec(),
            seed: 42,
        }
    }
}

fn id_prefix(area: ContentArea) -> &'static str {
    match area {
        ContentArea::ClinicaMedica => "cm",
        ContentArea::Cirurgia => "cir",
        ContentArea::GinecologiaObstetricia => "go",
        ContentArea::Pediatria => "ped",
        ContentArea::SaudeColetiva => "sc",
    }
}

/// Generate a bank: a ~ U[0.6, 2.0], b ~ N(0, 1.2) clipped to [-3, 3],
/// c ~ U[0, 0.3].
pub fn generate_bank(spec: &BankSpec) -> Result<Vec<CalibratedItem>> {
    let mut rng = ChaCha8Rng::seed_from_u64(spec.seed);
    let discrimination = Uniform::new_inclusive(0.6, 2.0);
    let guessing = Uniform::new_inclusive(0.0, 0.3);
    let difficulty = Normal::<f64>::new(0.0, 1.2).context("invalid difficulty distribution")?;

    let mut items = Vec::with_capacity(spec.items_per_area * spec.areas.len());
    for &area in &spec.areas {
        for i in 1..=spec.items_per_area {
            let params = IrtParams::new(
                discrimination.sample(&mut rng),
                difficulty.sample(&mut rng).clamp(-3.0, 3.0),
                guessing.sample(&mut rng),
            );
            items.push(CalibratedItem::new(
                format!("{}-{i:03}", id_prefix(area)),
                area,
                params,
            ));
        }
    }
    Ok(items)
}
