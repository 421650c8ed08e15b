//! In-memory collaborators, used by the simulator and in tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, PoisonError};

use anyhow::bail;
use async_trait::async_trait;

use crate::model::{CalibratedItem, ContentArea};
use crate::session::{CatSession, SessionId};
use crate::traits::{ExposureLog, ItemBank, SessionStore};

/// An item bank held in memory, sorted by item id.
#[derive(Debug, Clone)]
pub struct MemoryItemBank {
    name: String,
    items: Vec<CalibratedItem>,
}

impl MemoryItemBank {
    pub fn new(name: impl Into<String>, mut items: Vec<CalibratedItem>) -> Self {
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Self {
            name: name.into(),
            items,
        }
    }

    pub fn items(&self) -> &[CalibratedItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of items per content area.
    pub fn area_counts(&self) -> HashMap<ContentArea, usize> {
        let mut counts = HashMap::new();
        for item in &self.items {
            *counts.entry(item.area).or_insert(0) += 1;
        }
        counts
    }
}

#[async_trait]
impl ItemBank for MemoryItemBank {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(
        &self,
        areas: &BTreeSet<ContentArea>,
        exclude: &BTreeSet<String>,
    ) -> anyhow::Result<Vec<CalibratedItem>> {
        Ok(self
            .items
            .iter()
            .filter(|item| areas.contains(&item.area) && !exclude.contains(&item.id))
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    sessions: HashMap<SessionId, CatSession>,
    keys: HashMap<String, SessionId>,
}

/// A session store held in memory. State is lost on drop.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    inner: Mutex<StoreInner>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sessions
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every stored session.
    pub fn sessions(&self) -> Vec<CatSession> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.sessions.values().cloned().collect()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &SessionId) -> anyhow::Result<Option<CatSession>> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.sessions.get(id).cloned())
    }

    async fn find_by_idempotency_key(&self, key: &str) -> anyhow::Result<Option<CatSession>> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(inner
            .keys
            .get(key)
            .and_then(|id| inner.sessions.get(id))
            .cloned())
    }

    async fn insert(&self, session: &CatSession) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.sessions.contains_key(session.id()) {
            bail!("session {} already exists", session.id());
        }
        if inner.keys.contains_key(session.idempotency_key()) {
            bail!(
                "idempotency key '{}' is already bound to a session",
                session.idempotency_key()
            );
        }
        inner
            .keys
            .insert(session.idempotency_key().to_string(), session.id().clone());
        inner.sessions.insert(session.id().clone(), session.clone());
        Ok(())
    }

    async fn save(&self, session: &CatSession) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match inner.sessions.get_mut(session.id()) {
            Some(slot) => {
                *slot = session.clone();
                Ok(())
            }
            None => bail!("session {} does not exist", session.id()),
        }
    }
}

#[derive(Debug, Default)]
struct ExposureInner {
    sessions: u64,
    administrations: HashMap<String, u64>,
}

/// Exposure counts held in memory: rate = administrations / sessions.
#[derive(Debug, Default)]
pub struct MemoryExposureLog {
    inner: Mutex<ExposureInner>,
}

impl MemoryExposureLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExposureLog for MemoryExposureLog {
    async fn record_session_start(&self) -> anyhow::Result<()> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sessions += 1;
        Ok(())
    }

    async fn record_administration(&self, item_id: &str) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        *inner
            .administrations
            .entry(item_id.to_string())
            .or_insert(0) += 1;
        Ok(())
    }

    async fn exposure_rates(&self) -> anyhow::Result<HashMap<String, f64>> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.sessions == 0 {
            return Ok(HashMap::new());
        }
        let sessions = inner.sessions as f64;
        Ok(inner
            .administrations
            .iter()
            .map(|(id, count)| (id.clone(), *count as f64 / sessions))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IrtParams;
    use crate::session::coverage_plan;
    use std::collections::BTreeMap;

    fn item(id: &str, area: ContentArea) -> CalibratedItem {
        CalibratedItem::new(id, area, IrtParams::new(1.0, 0.0, 0.2))
    }

    fn session(id: &str, key: &str) -> CatSession {
        let areas: BTreeSet<_> = [ContentArea::Cirurgia].into_iter().collect();
        CatSession::new(
            SessionId::from(id),
            key.into(),
            coverage_plan(&areas, 1, &BTreeMap::new()),
            1,
            3,
        )
    }

    #[tokio::test]
    async fn bank_query_filters_and_excludes() {
        let bank = MemoryItemBank::new(
            "test",
            vec![
                item("b", ContentArea::Cirurgia),
                item("a", ContentArea::Cirurgia),
                item("c", ContentArea::Pediatria),
            ],
        );
        assert_eq!(bank.items()[0].id, "a");

        let areas: BTreeSet<_> = [ContentArea::Cirurgia].into_iter().collect();
        let exclude: BTreeSet<_> = ["a".to_string()].into_iter().collect();
        let found = bank.query(&areas, &exclude).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "b");
        assert_eq!(bank.area_counts()[&ContentArea::Cirurgia], 2);
    }

    #[tokio::test]
    async fn store_insert_load_save() {
        let store = MemorySessionStore::new();
        let s = session("s1", "k1");
        store.insert(&s).await.unwrap();
        assert!(store.insert(&s).await.is_err());
        assert!(store.insert(&session("s2", "k1")).await.is_err());

        let loaded = store.load(&SessionId::from("s1")).await.unwrap().unwrap();
        assert_eq!(loaded.id().as_str(), "s1");
        let by_key = store.find_by_idempotency_key("k1").await.unwrap().unwrap();
        assert_eq!(by_key.id(), s.id());

        store.save(&s).await.unwrap();
        assert!(store.save(&session("missing", "k9")).await.is_err());
        assert!(store
            .load(&SessionId::from("nope"))
            .await
            .unwrap()
            .is_none());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn exposure_rates_divide_by_sessions() {
        let log = MemoryExposureLog::new();
        assert!(log.exposure_rates().await.unwrap().is_empty());
        for _ in 0..4 {
            log.record_session_start().await.unwrap();
        }
        log.record_administration("q1").await.unwrap();
        log.record_administration("q1").await.unwrap();
        log.record_administration("q2").await.unwrap();
        let rates = log.exposure_rates().await.unwrap();
        assert!((rates["q1"] - 0.5).abs() < 1e-12);
        assert!((rates["q2"] - 0.25).abs() < 1e-12);
    }
}
