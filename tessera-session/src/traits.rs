//! Session store trait definition.

use crate::error::{SessionError, SessionResult};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Storage for opaque JSON blobs keyed by (session id, name).
///
/// # Examples
///
/// ```
/// use tessera_session::{MemorySessionStore, SessionStore, SessionStoreExt};
///
/// # async fn example() -> tessera_session::SessionResult<()> {
/// let store = MemorySessionStore::new();
/// store.save_value("abc", "cart", &vec![1, 2, 3]).await?;
///
/// let mut cart: Vec<i32> = Vec::new();
/// assert!(store.load_into("abc", "cart", &mut cart).await?);
/// assert_eq!(cart, vec![1, 2, 3]);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Last saved blob, `None` if nothing was saved or it expired.
    async fn load(&self, session_id: &str, name: &str) -> SessionResult<Option<String>>;

    /// Persist `blob`, replacing any previous one.
    async fn save(&self, session_id: &str, name: &str, blob: String) -> SessionResult<()>;

    /// Remove one blob.
    async fn delete(&self, session_id: &str, name: &str) -> SessionResult<()>;

    /// Remove every blob of a session.
    async fn clear(&self, session_id: &str) -> SessionResult<()>;
}

/// Typed access on top of [`SessionStore`].
#[async_trait]
pub trait SessionStoreExt: SessionStore {
    /// Populate `out` from the stored blob. Leaves `out` untouched and
    /// returns `false` when there is none.
    async fn load_into<T>(&self, session_id: &str, name: &str, out: &mut T) -> SessionResult<bool>
    where
        T: DeserializeOwned + Send,
    {
        let Some(blob) = self.load(session_id, name).await? else {
            return Ok(false);
        };

        *out = serde_json::from_str(&blob)
            .map_err(|e| SessionError::Deserialization(e.to_string()))?;
        Ok(true)
    }

    /// Serialize `value` and save it.
    async fn save_value<T>(&self, session_id: &str, name: &str, value: &T) -> SessionResult<()>
    where
        T: Serialize + Sync + ?Sized,
    {
        let blob =
            serde_json::to_string(value).map_err(|e| SessionError::Serialization(e.to_string()))?;
        self.save(session_id, name, blob).await
    }
}

impl<S: SessionStore + ?Sized> SessionStoreExt for S {}

/// Reject ids that cannot be part of a storage key.
pub fn validate_session_id(session_id: &str) -> SessionResult<()> {
    if session_id.is_empty() || !session_id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(SessionError::InvalidSessionId(session_id.to_string()));
    }
    Ok(())
}
