//! Maximum-information item selection with content balancing.

use std::collections::{BTreeSet, HashMap};

use crate::irt::item_information;
use crate::model::{CalibratedItem, ContentArea};

/// Outcome of a selection.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// The next item to administer.
    Next {
        item: CalibratedItem,
        /// Fisher information of the item at the current theta.
        information: f64,
    },
    /// No unused item remains in any requested area.
    BankExhausted,
}

impl Selection {
    pub fn item(&self) -> Option<&CalibratedItem> {
        match self {
            Selection::Next { item, .. } => Some(item),
            Selection::BankExhausted => None,
        }
    }
}

/// Inputs for one selection.
#[derive(Debug, Clone, Copy)]
pub struct SelectionContext<'a> {
    /// Current theta estimate.
    pub theta: f64,
    /// Areas the session must draw from.
    pub areas: &'a BTreeSet<ContentArea>,
    /// Areas whose minimum coverage is not yet met.
    pub deficits: &'a BTreeSet<ContentArea>,
    /// Ids already administered in this session.
    pub administered: &'a BTreeSet<String>,
    /// Population exposure rates by item id (empty when exposure control is off).
    pub exposure_rates: &'a HashMap<String, f64>,
}

/// Picks the most informative unused item.
///
/// Pool order: unused items in the requested areas, minus over-exposed
/// items (when a cap is set and something remains), restricted to deficit
/// areas (when any deficit area still has items). Ties go to the lowest id.
#[derive(Debug, Clone, Default)]
pub struct ItemSelector {
    max_exposure_rate: Option<f64>,
}

impl ItemSelector {
    pub fn new(max_exposure_rate: Option<f64>) -> Self {
        Self { max_exposure_rate }
    }

    pub fn select(&self, candidates: &[CalibratedItem], ctx: &SelectionContext<'_>) -> Selection {
        let unused: Vec<&CalibratedItem> = candidates
            .iter()
            .filter(|item| ctx.areas.contains(&item.area))
            .filter(|item| !ctx.administered.contains(&item.id))
            .collect();

        if unused.is_empty() {
            return Selection::BankExhausted;
        }

        let pool = apply_content_balance(unused, ctx.deficits);
        let pool = self.apply_exposure_cap(pool, ctx.exposure_rates);

        let mut best: Option<(&CalibratedItem, f64)> = None;
        for item in pool {
            let info = item_information(ctx.theta, &item.params);
            let better = match best {
                None => true,
                Some((current, current_info)) => {
                    info > current_info || (info == current_info && item.id < current.id)
                }
            };
            if better {
                best = Some((item, info));
            }
        }

        match best {
            Some((item, information)) => Selection::Next {
                item: item.clone(),
                information,
            },
            None => Selection::BankExhausted,
        }
    }

    fn apply_exposure_cap<'a>(
        &self,
        pool: Vec<&'a CalibratedItem>,
        rates: &HashMap<String, f64>,
    ) -> Vec<&'a CalibratedItem> {
        let Some(cap) = self.max_exposure_rate else {
            return pool;
        };
        let allowed: Vec<&CalibratedItem> = pool
            .iter()
            .copied()
            .filter(|item| rates.get(&item.id).copied().unwrap_or(0.0) < cap)
            .collect();
        if allowed.is_empty() {
            tracing::debug!("every candidate is over the exposure cap {cap}, ignoring the cap");
            pool
        } else {
            allowed
        }
    }
}

fn apply_content_balance<'a>(
    pool: Vec<&'a CalibratedItem>,
    deficits: &BTreeSet<ContentArea>,
) -> Vec<&'a CalibratedItem> {
    if deficits.is_empty() {
        return pool;
    }
    let balanced: Vec<&CalibratedItem> = pool
        .iter()
        .copied()
        .filter(|item| deficits.contains(&item.area))
        .collect();
    if balanced.is_empty() {
        tracing::warn!(
            ?deficits,
            "no items left in areas below minimum coverage, selecting from all requested areas"
        );
        pool
    } else {
        balanced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IrtParams;

    fn item(id: &str, area: ContentArea, b: f64) -> CalibratedItem {
        CalibratedItem::new(id, area, IrtParams::new(1.0, b, 0.2))
    }

    fn bank() -> Vec<CalibratedItem> {
        vec![
            item("q1", ContentArea::ClinicaMedica, 1.0),
            item("q2", ContentArea::Cirurgia, 0.0),
            item("q3", ContentArea::Pediatria, -1.5),
        ]
    }

    fn all_areas() -> BTreeSet<ContentArea> {
        ContentArea::ALL.into_iter().collect()
    }

    fn select(
        selector: &ItemSelector,
        items: &[CalibratedItem],
        theta: f64,
        administered: &[&str],
        deficits: &[ContentArea],
        rates: &HashMap<String, f64>,
    ) -> Selection {
        let areas = all_areas();
        let administered: BTreeSet<String> = administered.iter().map(|s| s.to_string()).collect();
        let deficits: BTreeSet<ContentArea> = deficits.iter().copied().collect();
        selector.select(
            items,
            &SelectionContext {
                theta,
                areas: &areas,
                deficits: &deficits,
                administered: &administered,
                exposure_rates: rates,
            },
        )
    }

    #[test]
    fn picks_most_informative() {
        let rates = HashMap::new();
        let selection = select(&ItemSelector::default(), &bank(), 0.0, &[], &[], &rates);
        assert_eq!(selection.item().unwrap().id, "q2");
    }

    #[test]
    fn skips_administered_items() {
        let rates = HashMap::new();
        let selection = select(
            &ItemSelector::default(),
            &bank(),
            0.0,
            &["q1", "q2"],
            &[],
            &rates,
        );
        assert_eq!(selection.item().unwrap().id, "q3");
    }

    #[test]
    fn exhausted_when_everything_used() {
        let rates = HashMap::new();
        let selection = select(
            &ItemSelector::default(),
            &bank(),
            0.0,
            &["q1", "q2", "q3"],
            &[],
            &rates,
        );
        assert_eq!(selection, Selection::BankExhausted);
    }

    #[test]
    fn ties_break_on_lowest_id() {
        let items = vec![
            item("q9", ContentArea::Cirurgia, 0.0),
            item("q4", ContentArea::Cirurgia, 0.0),
            item("q7", ContentArea::Cirurgia, 0.0),
        ];
        let rates = HashMap::new();
        let selection = select(&ItemSelector::default(), &items, 0.0, &[], &[], &rates);
        assert_eq!(selection.item().unwrap().id, "q4");
    }

    #[test]
    fn deficit_areas_take_priority() {
        let rates = HashMap::new();
        let selection = select(
            &ItemSelector::default(),
            &bank(),
            0.0,
            &[],
            &[ContentArea::Pediatria],
            &rates,
        );
        assert_eq!(selection.item().unwrap().id, "q3");
    }

    #[test]
    fn deficit_without_items_falls_back() {
        let rates = HashMap::new();
        let selection = select(
            &ItemSelector::default(),
            &bank(),
            0.0,
            &[],
            &[ContentArea::SaudeColetiva],
            &rates,
        );
        assert_eq!(selection.item().unwrap().id, "q2");
    }

    #[test]
    fn ignores_items_outside_requested_areas() {
        let areas: BTreeSet<ContentArea> = [ContentArea::ClinicaMedica].into_iter().collect();
        let empty: BTreeSet<ContentArea> = BTreeSet::new();
        let rates = HashMap::new();
        let selection = ItemSelector::default().select(
            &bank(),
            &SelectionContext {
                theta: 0.0,
                areas: &areas,
                deficits: &empty,
                administered: &BTreeSet::new(),
                exposure_rates: &rates,
            },
        );
        assert_eq!(selection.item().unwrap().id, "q1");
    }

    #[test]
    fn exposure_cap_skips_overexposed() {
        let items = vec![
            item("q1", ContentArea::ClinicaMedica, 0.0),
            item("q2", ContentArea::Cirurgia, 0.0),
        ];
        let rates: HashMap<String, f64> = [("q1".to_string(), 0.5), ("q2".to_string(), 0.1)]
            .into_iter()
            .collect();
        let selection = select(&ItemSelector::new(Some(0.25)), &items, 0.0, &[], &[], &rates);
        assert_eq!(selection.item().unwrap().id, "q2");
    }

    #[test]
    fn exposure_cap_falls_back_when_all_overexposed() {
        let items = vec![
            item("q1", ContentArea::ClinicaMedica, 0.0),
            item("q2", ContentArea::Cirurgia, 0.0),
        ];
        let rates: HashMap<String, f64> = [("q1".to_string(), 0.5), ("q2".to_string(), 0.5)]
            .into_iter()
            .collect();
        let selection = select(&ItemSelector::new(Some(0.25)), &items, 0.0, &[], &[], &rates);
        assert_eq!(selection.item().unwrap().id, "q1");
    }

    #[test]
    fn overexposed_deficit_item_beats_other_areas() {
        let items = vec![
            item("p1", ContentArea::Pediatria, 0.0),
            item("c1", ContentArea::Cirurgia, 0.0),
        ];
        let rates: HashMap<String, f64> = [("p1".to_string(), 0.9)].into_iter().collect();
        let selection = select(
            &ItemSelector::new(Some(0.25)),
            &items,
            0.0,
            &[],
            &[ContentArea::Pediatria],
            &rates,
        );
        assert_eq!(selection.item().unwrap().id, "p1");
    }

    #[test]
    fn exposure_cap_applies_within_deficit_areas() {
        let items = vec![
            item("p1", ContentArea::Pediatria, 0.0),
            item("p2", ContentArea::Pediatria, 0.5),
            item("c1", ContentArea::Cirurgia, 0.0),
        ];
        let rates: HashMap<String, f64> = [("p1".to_string(), 0.9)].into_iter().collect();
        let selection = select(
            &ItemSelector::new(Some(0.25)),
            &items,
            0.0,
            &[],
            &[ContentArea::Pediatria],
            &rates,
        );
        assert_eq!(selection.item().unwrap().id, "p2");
    }
}
