//! The `adaptest start`, `answer`, `resume` and `report` commands.

use std::path::PathBuf;

use anyhow::Result;

use adaptest_core::{SessionId, StartRequest};
use adaptest_report::session_report;
use adaptest_store::load_config_from;

use super::{open_engine, parse_areas, print_json};

pub async fn start(
    config_path: Option<PathBuf>,
    areas: Option<String>,
    min_items: Option<u32>,
    max_items: Option<u32>,
    key: Option<String>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let areas = parse_areas(areas.as_deref(), &config.default_areas)?;
    let engine = open_engine(&config).await?;

    let request = StartRequest {
        required_areas: areas.into_iter().collect(),
        min_items,
        max_items,
        idempotency_key: key.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
    };
    let outcome = engine.start(request).await?;
    print_json(&outcome)
}

pub async fn answer(
    config_path: Option<PathBuf>,
    session: String,
    item: String,
    correct: bool,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let engine = open_engine(&config).await?;
    let outcome = engine
        .submit_response(&SessionId::from(session), &item, correct)
        .await?;
    print_json(&outcome)
}

pub async fn resume(config_path: Option<PathBuf>, session: String) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let engine = open_engine(&config).await?;
    let outcome = engine.resume(&SessionId::from(session)).await?;
    print_json(&outcome)
}

pub async fn report(config_path: Option<PathBuf>, session: String) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let engine = open_engine(&config).await?;
    let session = engine.session(&SessionId::from(session)).await?;
    print!("{}", session_report(&session, None));
    Ok(())
}
