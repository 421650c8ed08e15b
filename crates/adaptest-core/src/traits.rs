//! Collaborator traits for the CAT engine.
//!
//! Item storage, session persistence and exposure tracking live outside
//! the engine. In-memory implementations are in [`crate::memory`]; the
//! `adaptest-store` crate provides file-backed ones.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;

use crate::model::{CalibratedItem, ContentArea};
use crate::session::{CatSession, SessionId};

// ---------------------------------------------------------------------------
// Item bank
// ---------------------------------------------------------------------------

/// Read-only access to calibrated items.
#[async_trait]
pub trait ItemBank: Send + Sync {
    /// Human-readable bank name.
    fn name(&self) -> &str;

    /// Items in any of `areas`, excluding the ids in `exclude`.
    async fn query(
        &self,
        areas: &BTreeSet<ContentArea>,
        exclude: &BTreeSet<String>,
    ) -> anyhow::Result<Vec<CalibratedItem>>;
}

// ---------------------------------------------------------------------------
// Session store
// ---------------------------------------------------------------------------

/// Durable storage for session state.
///
/// The engine serializes access per session id, so implementations only
/// need to make individual calls atomic.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &SessionId) -> anyhow::Result<Option<CatSession>>;

    /// Look up the session created with a start idempotency key.
    async fn find_by_idempotency_key(&self, key: &str) -> anyhow::Result<Option<CatSession>>;

    /// Persist a new session. Fails if the id or key is already taken.
    async fn insert(&self, session: &CatSession) -> anyhow::Result<()>;

    /// Overwrite an existing session.
    async fn save(&self, session: &CatSession) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// Exposure log
// ---------------------------------------------------------------------------

/// Population-level item exposure tracking.
#[async_trait]
pub trait ExposureLog: Send + Sync {
    async fn record_session_start(&self) -> anyhow::Result<()>;

    async fn record_administration(&self, item_id: &str) -> anyhow::Result<()>;

    /// Current exposure rate per item id. Items never administered may be
    /// absent and count as 0.
    async fn exposure_rates(&self) -> anyhow::Result<HashMap<String, f64>>;
}
