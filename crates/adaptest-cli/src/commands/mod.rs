//! Subcommand implementations and the helpers they share.

pub mod init;
pub mod score;
pub mod session;
pub mod simulate;
pub mod validate;

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use adaptest_core::{CatEngine, ContentArea};
use adaptest_store::{load_bank, AdaptestConfig, JsonFileSessionStore};

/// Build an engine over the configured bank and the JSON session store.
pub async fn open_engine(config: &AdaptestConfig) -> Result<CatEngine> {
    let bank_path = config.bank.as_deref().context(
        "no item bank configured: set `bank` in adaptest.toml, set ADAPTEST_BANK, or run `adaptest init`",
    )?;
    let bank = load_bank(bank_path)?;
    let store = JsonFileSessionStore::open(&config.store_dir)
        .await
        .with_context(|| format!("failed to open session store at {}", config.store_dir.display()))?;
    tracing::debug!(
        bank = %bank_path.display(),
        store = %config.store_dir.display(),
        "engine ready"
    );
    Ok(CatEngine::new(
        Arc::new(bank),
        Arc::new(store),
        config.engine.clone(),
    )?)
}

/// Parse a comma-separated area list, falling back to `defaults`.
pub fn parse_areas(areas: Option<&str>, defaults: &[ContentArea]) -> Result<Vec<ContentArea>> {
    let Some(list) = areas else {
        return Ok(defaults.to_vec());
    };
    let parsed = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<ContentArea>().map_err(anyhow::Error::msg))
        .collect::<Result<Vec<_>>>()?;
    anyhow::ensure!(!parsed.is_empty(), "--areas must name at least one area");
    Ok(parsed)
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
