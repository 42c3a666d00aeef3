//! In-memory session storage.

use crate::config::SessionConfig;
use crate::error::SessionResult;
use crate::traits::SessionStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

/// Upper bound on how long expired blobs linger before a write sweeps them.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct Entry {
    blob: String,
    expires_at: DateTime<Utc>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

#[derive(Debug)]
struct Entries {
    map: HashMap<String, Entry>,
    next_sweep: DateTime<Utc>,
}

impl Entries {
    fn sweep(&mut self) -> usize {
        let before = self.map.len();
        self.map.retain(|_, entry| !entry.is_expired());
        before - self.map.len()
    }
}

/// Process-local session store. Blobs are lost on restart.
///
/// Expired blobs are swept by writes, at most once per TTL (capped at a
/// minute), so the map stays bounded by the live sessions.
#[derive(Debug)]
pub struct MemorySessionStore {
    entries: RwLock<Entries>,
    config: SessionConfig,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::memory())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            entries: RwLock::new(Entries {
                map: HashMap::new(),
                next_sweep: Utc::now(),
            }),
            config,
        }
    }

    /// Number of stored blobs, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop expired blobs, returning how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        self.entries.write().await.sweep()
    }

    fn sweep_interval(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.config.ttl.min(SWEEP_INTERVAL)).unwrap_or_default()
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, session_id: &str, name: &str) -> SessionResult<Option<String>> {
        let key = self.config.entry_key(session_id, name);
        let entries = self.entries.read().await;

        Ok(entries
            .map
            .get(&key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.blob.clone()))
    }

    async fn save(&self, session_id: &str, name: &str, blob: String) -> SessionResult<()> {
        let key = self.config.entry_key(session_id, name);
        let now = Utc::now();
        let expires_at = now + chrono::Duration::from_std(self.config.ttl).unwrap_or_default();

        let mut entries = self.entries.write().await;
        if now >= entries.next_sweep {
            let removed = entries.sweep();
            entries.next_sweep = now + self.sweep_interval();
            if removed > 0 {
                tracing::debug!(removed, remaining = entries.map.len(), "Swept expired sessions");
            }
        }
        entries.map.insert(key, Entry { blob, expires_at });
        Ok(())
    }

    async fn delete(&self, session_id: &str, name: &str) -> SessionResult<()> {
        let key = self.config.entry_key(session_id, name);
        self.entries.write().await.map.remove(&key);
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> SessionResult<()> {
        let prefix = self.config.entry_key(session_id, "");
        self.entries
            .write()
            .await
            .map
            .retain(|key, _| !key.starts_with(&prefix));
        Ok(())
    }
}
