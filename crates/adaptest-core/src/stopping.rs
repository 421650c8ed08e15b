//! Stopping rule evaluation.

use crate::model::{AbilityEstimate, StopReason};

/// Decision after a response has been scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopDecision {
    Continue,
    Stop(StopReason),
}

impl StopDecision {
    pub fn is_stop(&self) -> bool {
        matches!(self, StopDecision::Stop(_))
    }
}

/// Item-count bounds plus the precision target.
///
/// Checked in order: the ceiling always stops, the floor always continues,
/// and in between the session stops once SE reaches `target_se`. Bank
/// exhaustion is reported by the selector, not here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoppingRule {
    pub min_items: u32,
    pub max_items: u32,
    pub target_se: f64,
}

impl StoppingRule {
    pub fn new(min_items: u32, max_items: u32, target_se: f64) -> Self {
        Self {
            min_items,
            max_items,
            target_se,
        }
    }

    pub fn evaluate(&self, items_administered: u32, estimate: &AbilityEstimate) -> StopDecision {
        if items_administered >= self.max_items {
            return StopDecision::Stop(StopReason::MaxItems);
        }
        if items_administered < self.min_items {
            return StopDecision::Continue;
        }
        if estimate.se <= self.target_se {
            StopDecision::Stop(StopReason::SeThreshold)
        } else {
            StopDecision::Continue
        }
    }
}
