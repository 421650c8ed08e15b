//! TOML item-bank files.
//!
//! ```toml
//! [bank]
//! id = "enamed-sample"
//! name = "ENAMED sample bank"
//!
//! [[items]]
//! id = "cm-001"
//! area = "clinica_medica"
//! a = 1.1
//! b = -0.4
//! c = 0.2
//! ```
//!
//! Out-of-model parameters and unknown areas are hard errors. Anything that
//! is legal but suspicious is reported by [`validate_bank`].

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use adaptest_core::memory::MemoryItemBank;
use adaptest_core::session::coverage_plan;
use adaptest_core::{CalibratedItem, ContentArea, EngineConfig, IrtParams};

/// Discrimination above which an item is flagged as atypical.
const ATYPICAL_DISCRIMINATION: f64 = 2.5;
/// Guessing above which an item is flagged as atypical.
const ATYPICAL_GUESSING: f64 = 0.35;

/// A parsed item bank.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemBankFile {
    pub id: String,
    pub name: String,
    pub items: Vec<CalibratedItem>,
}

impl ItemBankFile {
    /// Convert into an in-memory bank. Later duplicates of an id are dropped.
    pub fn into_memory_bank(self) -> MemoryItemBank {
        let mut seen = HashSet::new();
        let items: Vec<CalibratedItem> = self
            .items
            .into_iter()
            .filter(|item| {
                let fresh = seen.insert(item.id.clone());
                if !fresh {
                    tracing::warn!("dropping duplicate item id '{}'", item.id);
                }
                fresh
            })
            .collect();
        MemoryItemBank::new(self.name, items)
    }

    /// Serialize back to the TOML file format.
    pub fn to_toml(&self) -> Result<String> {
        let file = TomlBankFile {
            bank: TomlBankHeader {
                id: self.id.clone(),
                name: self.name.clone(),
            },
            items: self
                .items
                .iter()
                .map(|item| TomlItem {
                    id: item.id.clone(),
                    area: item.area.to_string(),
                    a: item.params.a,
                    b: item.params.b,
                    c: item.params.c,
                })
                .collect(),
        };
        toml::to_string_pretty(&file).context("failed to serialize item bank")
    }

    /// Write the bank to `path` in TOML form.
    pub fn write(&self, path: &Path) -> Result<()> {
        let content = self.to_toml()?;
        std::fs::write(path, content)
            .with_context(|| format!("failed to write item bank: {}", path.display()))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TomlBankFile {
    bank: TomlBankHeader,
    #[serde(default)]
    items: Vec<TomlItem>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TomlBankHeader {
    id: String,
    name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct TomlItem {
    id: String,
    area: String,
    a: f64,
    b: f64,
    #[serde(default)]
    c: f64,
}

/// Parse a bank file.
pub fn parse_bank(path: &Path) -> Result<ItemBankFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read item bank: {}", path.display()))?;
    parse_bank_str(&content, path)
}

/// Parse bank TOML from a string; `source_path` is only used in messages.
pub fn parse_bank_str(content: &str, source_path: &Path) -> Result<ItemBankFile> {
    let parsed: TomlBankFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let items = parsed
        .items
        .into_iter()
        .map(|raw| {
            let area: ContentArea = raw
                .area
                .parse()
                .map_err(|e: String| anyhow::anyhow!("item '{}': {}", raw.id, e))?;
            let params = IrtParams::new(raw.a, raw.b, raw.c);
            params
                .validate()
                .map_err(|e| anyhow::anyhow!("item '{}': {}", raw.id, e))?;
            Ok(CalibratedItem::new(raw.id, area, params))
        })
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("invalid item bank: {}", source_path.display()))?;

    Ok(ItemBankFile {
        id: parsed.bank.id,
        name: parsed.bank.name,
        items,
    })
}

/// Parse a bank file straight into a [`MemoryItemBank`].
pub fn load_bank(path: &Path) -> Result<MemoryItemBank> {
    let bank = parse_bank(path)?;
    tracing::debug!(
        "loaded item bank '{}' with {} items from {}",
        bank.id,
        bank.items.len(),
        path.display()
    );
    Ok(bank.into_memory_bank())
}

/// A warning from bank validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The item ID (if applicable).
    pub item_id: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Check a bank against the engine configuration and the areas a session
/// would require.
pub fn validate_bank(
    bank: &ItemBankFile,
    config: &EngineConfig,
    required_areas: &BTreeSet<ContentArea>,
) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let mut seen_ids = HashSet::new();
    for item in &bank.items {
        if !seen_ids.insert(&item.id) {
            warnings.push(ValidationWarning {
                item_id: Some(item.id.clone()),
                message: format!("duplicate item ID: {}", item.id),
            });
        }
    }

    for item in &bank.items {
        let IrtParams { a, b, c } = item.params;
        if b < config.theta_min || b > config.theta_max {
            warnings.push(ValidationWarning {
                item_id: Some(item.id.clone()),
                message: format!(
                    "difficulty {b} is outside the theta grid [{}, {}]",
                    config.theta_min, config.theta_max
                ),
            });
        }
        if a > ATYPICAL_DISCRIMINATION {
            warnings.push(ValidationWarning {
                item_id: Some(item.id.clone()),
                message: format!("unusually high discrimination {a}"),
            });
        }
        if c > ATYPICAL_GUESSING {
            warnings.push(ValidationWarning {
                item_id: Some(item.id.clone()),
                message: format!("unusually high guessing parameter {c}"),
            });
        }
    }

    let mut per_area: HashMap<ContentArea, u32> = HashMap::new();
    for item in &bank.items {
        *per_area.entry(item.area).or_insert(0) += 1;
    }
    let plan = coverage_plan(required_areas, config.min_items, &config.area_minimums);
    for (area, coverage) in &plan {
        let available = per_area.get(area).copied().unwrap_or(0);
        if available < coverage.minimum {
            warnings.push(ValidationWarning {
                item_id: None,
                message: format!(
                    "area {area} has {available} items but sessions need at least {}",
                    coverage.minimum
                ),
            });
        }
    }

    let eligible: u32 = required_areas
        .iter()
        .map(|area| per_area.get(area).copied().unwrap_or(0))
        .sum();
    if eligible < config.max_items {
        warnings.push(ValidationWarning {
            item_id: None,
            message: format!(
                "only {eligible} items in the required areas, sessions may end before max_items ({})",
                config.max_items
            ),
        });
    }

    warnings
}
