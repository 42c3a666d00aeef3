//! Session storage for Tessera applications.
//!
//! A session is identified by the id carried in the session cookie. Within
//! a session, handlers persist named JSON blobs: `save` writes one under
//! (session id, name), `load` reads the last one back. Loading a name that
//! was never saved is not an error.
//!
//! # Features
//!
//! - `redis` - Redis session storage
//!
//! The in-memory store is always available.
//!
//! # Examples
//!
//! ```
//! use tessera_session::*;
//!
//! # async fn example() -> SessionResult<()> {
//! let store = MemorySessionStore::new();
//! store.save_value("abc", "theme", "dark").await?;
//!
//! let mut theme = String::new();
//! store.load_into("abc", "theme", &mut theme).await?;
//! assert_eq!(theme, "dark");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod memory_session;
pub mod traits;

#[cfg(feature = "redis")]
pub mod redis_session;

pub use config::{SessionBackend, SessionConfig};
pub use error::{SessionError, SessionResult};
pub use memory_session::MemorySessionStore;
pub use traits::{SessionStore, SessionStoreExt, validate_session_id};

#[cfg(feature = "redis")]
pub use redis_session::RedisSessionStore;

use std::sync::Arc;

/// Build the store described by `config`.
pub async fn connect(config: SessionConfig) -> SessionResult<Arc<dyn SessionStore>> {
    match config.backend {
        SessionBackend::Memory => Ok(Arc::new(MemorySessionStore::with_config(config))),
        #[cfg(feature = "redis")]
        SessionBackend::Redis => Ok(Arc::new(RedisSessionStore::new(config).await?)),
        #[cfg(not(feature = "redis"))]
        SessionBackend::Redis => Err(SessionError::Config(
            "Redis sessions require the `redis` feature".to_string(),
        )),
    }
}
