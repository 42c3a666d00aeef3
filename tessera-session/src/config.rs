//! Session configuration.

use crate::error::{SessionError, SessionResult};
use std::env;
use std::time::Duration;

/// Session backend type.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionBackend {
    /// Process-local map
    Memory,
    /// Redis backend
    Redis,
}

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Backend type
    pub backend: SessionBackend,
    /// Connection URL (Redis only)
    pub url: String,
    /// Key namespace/prefix
    pub namespace: String,
    /// How long a saved blob lives
    pub ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: SessionBackend::Memory,
            url: String::new(),
            namespace: "session".to_string(),
            ttl: Duration::from_secs(86400), // 1 day
        }
    }
}

impl SessionConfig {
    /// In-memory configuration.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Create a Redis session configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use tessera_session::SessionConfig;
    ///
    /// let config = SessionConfig::redis("redis://localhost:6379").unwrap();
    /// ```
    pub fn redis(url: &str) -> SessionResult<Self> {
        if !url.starts_with("redis://") && !url.starts_with("rediss://") {
            return Err(SessionError::InvalidUrl(
                "Redis URL must start with redis:// or rediss://".to_string(),
            ));
        }

        Ok(Self {
            backend: SessionBackend::Redis,
            url: url.to_string(),
            ..Default::default()
        })
    }

    /// Read `TESSERA_SESSION_URL`, `TESSERA_SESSION_NAMESPACE` and
    /// `TESSERA_SESSION_TTL_SECS`. Without a URL the memory backend is used.
    pub fn from_env() -> SessionResult<Self> {
        let mut config = match env::var("TESSERA_SESSION_URL") {
            Ok(url) => Self::redis(&url)?,
            Err(_) => Self::memory(),
        };

        if let Ok(namespace) = env::var("TESSERA_SESSION_NAMESPACE") {
            config.namespace = namespace;
        }

        if let Ok(ttl) = env::var("TESSERA_SESSION_TTL_SECS") {
            let secs: u64 = ttl
                .parse()
                .map_err(|_| SessionError::Config(format!("invalid TESSERA_SESSION_TTL_SECS: {ttl}")))?;
            config.ttl = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Set the key namespace/prefix.
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }

    /// Set how long saved blobs live.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Storage key of blob `name` for `session_id`.
    pub fn entry_key(&self, session_id: &str, name: &str) -> String {
        format!("{}:{}:{}", self.namespace, session_id, name)
    }

    /// Pattern matching every blob of `session_id`.
    pub fn session_pattern(&self, session_id: &str) -> String {
        format!("{}:{}:*", self.namespace, session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_url_validation() {
        assert!(SessionConfig::redis("redis://localhost:6379").is_ok());
        assert!(SessionConfig::redis("rediss://localhost:6379").is_ok());
        assert!(matches!(
            SessionConfig::redis("http://localhost"),
            Err(SessionError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_keys() {
        let config = SessionConfig::memory().with_namespace("app");
        assert_eq!(config.entry_key("abc", "cart"), "app:abc:cart");
        assert_eq!(config.session_pattern("abc"), "app:abc:*");
    }

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.backend, SessionBackend::Memory);
        assert_eq!(config.ttl, Duration::from_secs(86400));
    }
}
