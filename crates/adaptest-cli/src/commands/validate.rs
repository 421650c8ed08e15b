//! The `adaptest validate` command.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};

use adaptest_store::{load_config_from, parse_bank, validate_bank};

pub fn execute(bank_path: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let bank_path = bank_path
        .or_else(|| config.bank.clone())
        .context("no item bank given: pass --bank or set `bank` in adaptest.toml")?;

    let bank = parse_bank(&bank_path)?;
    println!("Item bank: {} ({} items)", bank.name, bank.items.len());

    let areas: BTreeSet<_> = config.default_areas.iter().copied().collect();
    let warnings = validate_bank(&bank, &config.engine, &areas);
    for w in &warnings {
        let prefix = w
            .item_id
            .as_ref()
            .map(|id| format!("  [{id}]"))
            .unwrap_or_else(|| "  ".to_string());
        println!("{prefix} WARNING: {}", w.message);
    }

    if warnings.is_empty() {
        println!("Item bank valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
