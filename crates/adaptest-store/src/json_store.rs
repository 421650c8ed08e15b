//! Session store backed by JSON files.
//!
//! Layout under the store directory:
//!
//! - `sessions/<session-id>.json`: one document per session
//! - `idempotency.json`: start key to session id index
//!
//! Every write goes to a temporary file first and is renamed into place,
//! so readers never see a half-written document.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use adaptest_core::traits::SessionStore;
use adaptest_core::{CatSession, SessionId};

use crate::error::StoreError;

const SESSIONS_DIR: &str = "sessions";
const INDEX_FILE: &str = "idempotency.json";

/// A [`SessionStore`] that keeps one JSON file per session.
#[derive(Debug)]
pub struct JsonFileSessionStore {
    root: PathBuf,
    // Serializes index updates within this process.
    index_lock: Mutex<()>,
}

impl JsonFileSessionStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        let sessions = root.join(SESSIONS_DIR);
        tokio::fs::create_dir_all(&sessions)
            .await
            .map_err(|e| StoreError::io(&sessions, e))?;
        Ok(Self {
            root,
            index_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn session_path(&self, id: &SessionId) -> Result<PathBuf, StoreError> {
        let raw = id.as_str();
        let valid = !raw.is_empty()
            && raw
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
        if !valid {
            return Err(StoreError::InvalidId(raw.to_string()));
        }
        Ok(self.root.join(SESSIONS_DIR).join(format!("{raw}.json")))
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    async fn read_index(&self) -> Result<BTreeMap<String, SessionId>, StoreError> {
        let path = self.index_path();
        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|source| StoreError::Corrupt { path, source }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    async fn read_session(&self, path: &Path) -> Result<Option<CatSession>, StoreError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|source| StoreError::Corrupt {
                    path: path.to_path_buf(),
                    source,
                }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    /// Every stored session id.
    pub async fn list(&self) -> Result<Vec<SessionId>, StoreError> {
        let dir = self.root.join(SESSIONS_DIR);
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;
        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&dir, e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(SessionId::from(stem));
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| StoreError::io(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| StoreError::io(path, e))
}

fn encode<T: serde::Serialize>(value: &T, path: &Path) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec_pretty(value).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

#[async_trait]
impl SessionStore for JsonFileSessionStore {
    async fn load(&self, id: &SessionId) -> Result<Option<CatSession>> {
        let path = match self.session_path(id) {
            Ok(path) => path,
            Err(StoreError::InvalidId(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(self.read_session(&path).await?)
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<CatSession>> {
        let index = self.read_index().await?;
        match index.get(key) {
            Some(id) => self.load(id).await,
            None => Ok(None),
        }
    }

    async fn insert(&self, session: &CatSession) -> Result<()> {
        let path = self.session_path(session.id())?;
        let _guard = self.index_lock.lock().await;

        let mut index = self.read_index().await?;
        if index.contains_key(session.idempotency_key()) {
            return Err(StoreError::Conflict(format!(
                "idempotency key '{}' is already bound to a session",
                session.idempotency_key()
            ))
            .into());
        }
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StoreError::Conflict(format!("session {} already exists", session.id())).into());
        }

        write_atomic(&path, &encode(session, &path)?).await?;
        index.insert(session.idempotency_key().to_string(), session.id().clone());
        let index_path = self.index_path();
        write_atomic(&index_path, &encode(&index, &index_path)?).await?;

        tracing::debug!(session = %session.id(), "session inserted at {}", path.display());
        Ok(())
    }

    async fn save(&self, session: &CatSession) -> Result<()> {
        let path = self.session_path(session.id())?;
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StoreError::Missing(session.id().to_string()).into());
        }
        write_atomic(&path, &encode(session, &path)?).await?;
        Ok(())
    }
}
