//! Application configuration.
//!
//! Every setting has a working default; [`AppConfig::from_env`] overrides
//! them from `TESSERA_*` environment variables.
//!
//! | variable | setting |
//! |----------|---------|
//! | `TESSERA_HOST` | bind address |
//! | `TESSERA_PORT` | bind port |
//! | `TESSERA_BASE_PATH` | prefix for derived action routes |
//! | `TESSERA_LANGUAGE` | `lang` attribute of rendered documents |
//! | `TESSERA_SESSION_COOKIE` | session cookie name |
//! | `TESSERA_COOKIE_SECURE` | whether the session cookie is `Secure` |
//! | `TESSERA_LOADER_DELAY_MS` | delay before the loading overlay appears |
//! | `TESSERA_MAX_BODY_BYTES` | largest request body the server reads |

use crate::Error;
use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "TESSERA";

/// Default request body limit, 1 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Cookie SameSite attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Session cookie settings.
#[derive(Debug, Clone)]
pub struct CookieConfig {
    /// Cookie name
    pub name: String,
    /// Cookie path
    pub path: String,
    /// Cookie secure flag (HTTPS only)
    pub secure: bool,
    /// Cookie HttpOnly flag
    pub http_only: bool,
    /// Cookie SameSite policy
    pub same_site: SameSite,
    /// Length of freshly minted session tokens
    pub token_length: usize,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: "session_id".to_string(),
            path: "/".to_string(),
            secure: true,
            http_only: true,
            same_site: SameSite::Strict,
            token_length: 30,
        }
    }
}

impl CookieConfig {
    /// Render a `Set-Cookie` header value for `value`.
    pub fn header_value(&self, value: &str) -> String {
        let mut cookie = format!("{}={}; Path={}", self.name, value, self.path);

        if self.secure {
            cookie.push_str("; Secure");
        }

        if self.http_only {
            cookie.push_str("; HttpOnly");
        }

        cookie.push_str(&format!("; SameSite={}", self.same_site.as_str()));
        cookie
    }
}

/// Client runtime presentation settings.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// How long a request may run before the loading overlay appears
    pub loader_delay: Duration,
    /// Markup shown inside the loading overlay
    pub loader_text: String,
    /// Classes of the loading overlay
    pub loader_class: String,
    /// How long toast messages stay on screen
    pub toast_duration: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            loader_delay: Duration::from_millis(100),
            loader_text: "Loading ...".to_string(),
            loader_class: "fixed inset-0 flex gap-4 items-center justify-center z-50 bg-white opacity-75 font-bold text-3xl".to_string(),
            toast_duration: Duration::from_secs(5),
        }
    }
}

/// Top-level configuration of a Tessera application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the server binds to
    pub addr: SocketAddr,
    /// Prefix for derived action routes
    pub base_path: String,
    /// Document language
    pub language: String,
    /// Session cookie settings
    pub cookie: CookieConfig,
    /// Client runtime settings
    pub runtime: RuntimeConfig,
    /// Bodies longer than this are not read
    pub max_body_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 1422),
            base_path: "/".to_string(),
            language: "en".to_string(),
            cookie: CookieConfig::default(),
            runtime: RuntimeConfig::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from `TESSERA_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self, Error> {
        let mut config = Self::default();

        if let Some(host) = var("HOST") {
            let ip: IpAddr = host
                .parse()
                .map_err(|_| Error::Config(format!("invalid {ENV_PREFIX}_HOST: {host}")))?;
            config.addr.set_ip(ip);
        }

        if let Some(port) = var("PORT") {
            let port: u16 = port
                .parse()
                .map_err(|_| Error::Config(format!("invalid {ENV_PREFIX}_PORT: {port}")))?;
            config.addr.set_port(port);
        }

        if let Some(base_path) = var("BASE_PATH") {
            config.base_path = base_path;
        }

        if let Some(language) = var("LANGUAGE") {
            config.language = language;
        }

        if let Some(name) = var("SESSION_COOKIE") {
            config.cookie.name = name;
        }

        if let Some(secure) = var("COOKIE_SECURE") {
            config.cookie.secure = flag(&secure);
        }

        if let Some(delay) = var("LOADER_DELAY_MS") {
            let millis: u64 = delay.parse().map_err(|_| {
                Error::Config(format!("invalid {ENV_PREFIX}_LOADER_DELAY_MS: {delay}"))
            })?;
            config.runtime.loader_delay = Duration::from_millis(millis);
        }

        if let Some(limit) = var("MAX_BODY_BYTES") {
            config.max_body_bytes = limit.parse().map_err(|_| {
                Error::Config(format!("invalid {ENV_PREFIX}_MAX_BODY_BYTES: {limit}"))
            })?;
        }

        Ok(config)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.addr.set_port(port);
        self
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie.name = name.into();
        self
    }

    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie.secure = secure;
        self
    }

    pub fn with_loader_delay(mut self, delay: Duration) -> Self {
        self.runtime.loader_delay = delay;
        self
    }

    pub fn with_toast_duration(mut self, duration: Duration) -> Self {
        self.runtime.toast_duration = duration;
        self
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }
}

fn var(key: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{key}")).ok()
}

fn flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.addr.port(), 1422);
        assert_eq!(config.base_path, "/");
        assert_eq!(config.cookie.name, "session_id");
        assert_eq!(config.cookie.token_length, 30);
        assert_eq!(config.runtime.loader_delay, Duration::from_millis(100));
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    }

    #[test]
    fn test_cookie_header_value() {
        let header = CookieConfig::default().header_value("tok");
        assert_eq!(
            header,
            "session_id=tok; Path=/; Secure; HttpOnly; SameSite=Strict"
        );
    }

    #[test]
    fn test_insecure_cookie() {
        let cookie = CookieConfig {
            secure: false,
            same_site: SameSite::Lax,
            ..CookieConfig::default()
        };
        let header = cookie.header_value("tok");
        assert!(!header.contains("Secure"));
        assert!(header.ends_with("SameSite=Lax"));
    }

    #[test]
    fn test_builder() {
        let config = AppConfig::new()
            .with_port(8080)
            .with_base_path("/ui")
            .with_language("sk")
            .with_cookie_secure(false);

        assert_eq!(config.addr.port(), 8080);
        assert_eq!(config.base_path, "/ui");
        assert_eq!(config.language, "sk");
        assert!(!config.cookie.secure);
    }

    #[test]
    fn test_flag_parsing() {
        assert!(flag("1"));
        assert!(flag("TRUE"));
        assert!(!flag("0"));
        assert!(!flag("no"));
    }
}
