//! Redis session storage implementation.

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::traits::SessionStore;
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

/// Redis-backed session store.
///
/// Every blob is its own key, `{namespace}:{session_id}:{name}`, written
/// with the configured TTL.
///
/// # Examples
///
/// ```no_run
/// use tessera_session::{RedisSessionStore, SessionConfig, SessionStoreExt};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = SessionConfig::redis("redis://localhost:6379")?
///         .with_namespace("myapp:session")
///         .with_ttl(Duration::from_secs(3600));
///
///     let store = RedisSessionStore::new(config).await?;
///     store.save_value("abc", "user_id", &123).await?;
///
///     Ok(())
/// }
/// ```
pub struct RedisSessionStore {
    conn: ConnectionManager,
    config: SessionConfig,
}

impl RedisSessionStore {
    /// Connect to the server named by `config.url`.
    pub async fn new(config: SessionConfig) -> SessionResult<Self> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| SessionError::Connection(e.to_string()))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| SessionError::Connection(e.to_string()))?;

        tracing::debug!(url = %config.url, namespace = %config.namespace, "Connected Redis session store");
        Ok(Self { conn, config })
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, session_id: &str, name: &str) -> SessionResult<Option<String>> {
        let key = self.config.entry_key(session_id, name);
        let mut conn = self.conn.clone();

        let blob: Option<String> = conn.get(&key).await?;
        Ok(blob)
    }

    async fn save(&self, session_id: &str, name: &str, blob: String) -> SessionResult<()> {
        let key = self.config.entry_key(session_id, name);
        let mut conn = self.conn.clone();

        let ttl = self.config.ttl.as_secs().max(1);
        let _: () = conn.set_ex(&key, blob, ttl).await?;

        Ok(())
    }

    async fn delete(&self, session_id: &str, name: &str) -> SessionResult<()> {
        let key = self.config.entry_key(session_id, name);
        let mut conn = self.conn.clone();

        let _: () = conn.del(&key).await?;

        Ok(())
    }

    async fn clear(&self, session_id: &str) -> SessionResult<()> {
        let mut conn = self.conn.clone();
        let pattern = self.config.session_pattern(session_id);

        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(&pattern)
            .query_async(&mut conn)
            .await?;

        if !keys.is_empty() {
            let _: () = conn.del(keys).await?;
        }

        Ok(())
    }
}
