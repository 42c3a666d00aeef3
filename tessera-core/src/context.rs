//! Per-request context handed to every handler.

use crate::action::{self, trim};
use crate::client::js_string;
use crate::codec::{self, BodyItem, DecodeReport, Field};
use crate::config::AppConfig;
use crate::http::HttpRequest;
use crate::registry::{Action, Registry};
use crate::Error;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use tessera_session::{SessionStore, SessionStoreExt};

/// Id of the element toast messages are appended to.
pub const MESSAGES_ID: &str = "__messages__";

const SUCCESS_CLASS: &str = "bg-green-700 text-white";
const ERROR_CLASS: &str = "bg-red-700 text-white";

/// Request scope: the inbound request, the session, and the out-of-band
/// fragments queued while the handler runs.
///
/// Cloning is cheap; clones share the same queue.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

struct Inner {
    request: HttpRequest,
    session_id: String,
    registry: Arc<Registry>,
    sessions: Arc<dyn SessionStore>,
    config: Arc<AppConfig>,
    effects: Mutex<Vec<String>>,
}

impl Context {
    pub fn new(
        request: HttpRequest,
        session_id: impl Into<String>,
        registry: Arc<Registry>,
        sessions: Arc<dyn SessionStore>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                request,
                session_id: session_id.into(),
                registry,
                sessions,
                config,
                effects: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn request(&self) -> &HttpRequest {
        &self.inner.request
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Address of the connected peer.
    pub fn ip(&self) -> Option<IpAddr> {
        self.inner.request.remote_addr.map(|addr| addr.ip())
    }

    /// Decode the request payload into `out`, in place.
    ///
    /// Items that do not fit `out` are skipped; see [`codec::decode`]. A
    /// failed body read or a payload that is not a list of body items is
    /// returned as an error for the handler to present.
    pub fn body(&self, out: &mut dyn Field) -> Result<DecodeReport, Error> {
        let items = self.body_items()?;
        let report = codec::decode(&items, out);

        tracing::debug!(
            path = %self.inner.request.path,
            applied = report.applied,
            skipped = report.skipped,
            "Decoded request body"
        );

        Ok(report)
    }

    /// The raw payload.
    pub fn body_items(&self) -> Result<Vec<BodyItem>, Error> {
        let request = &self.inner.request;

        if let Some(err) = &request.body_error {
            return Err(Error::BodyRead(err.clone()));
        }

        if request.body.is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_slice(&request.body).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Session storage scoped to this request's session id.
    pub fn session(&self) -> Session<'_> {
        Session {
            id: &self.inner.session_id,
            store: self.inner.sessions.as_ref(),
        }
    }

    /// Register `func` under its derived route, or return the existing
    /// registration.
    ///
    /// # Panics
    ///
    /// Panics on a route collision.
    pub fn callable<F, Fut>(&self, func: F) -> Action
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = String> + Send + 'static,
    {
        self.inner.registry.callable(func)
    }

    /// Register `func` under an explicit name.
    ///
    /// # Panics
    ///
    /// Panics on a route collision.
    pub fn action<F, Fut>(&self, name: &str, func: F) -> Action
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = String> + Send + 'static,
    {
        self.inner.registry.action(name, func)
    }

    /// Client-side navigation attribute.
    pub fn load(&self, href: &str) -> String {
        action::load(href)
    }

    /// Queue a green toast.
    pub fn success(&self, message: &str) {
        self.toast(message, SUCCESS_CLASS);
    }

    /// Queue a red toast.
    pub fn error(&self, message: &str) {
        self.toast(message, ERROR_CLASS);
    }

    /// Queue a full page reload.
    pub fn reload(&self) {
        self.append("<script>window.location.reload();</script>");
    }

    /// Queue a navigation to `href`.
    pub fn redirect(&self, href: &str) {
        self.append(format!(
            "<script>window.location.href = {};</script>",
            js_string(href)
        ));
    }

    /// Queue a browser download of `bytes`.
    pub fn download_as(&self, bytes: &[u8], content_type: &str, file_name: &str) {
        let payload = STANDARD.encode(bytes);

        self.append(trim(&format!(
            r#"<script>
            (function () {{
                const chars = atob("{payload}");
                const bytes = new Uint8Array(chars.length);
                for (let i = 0; i < chars.length; i++) {{
                    bytes[i] = chars.charCodeAt(i);
                }}
                const blob = new Blob([bytes], {{ type: {content_type} }});
                const url = URL.createObjectURL(blob);
                const a = document.createElement("a");
                a.href = url;
                a.download = {file_name};
                a.click();
                URL.revokeObjectURL(url);
            }})();
            </script>"#,
            content_type = js_string(content_type),
            file_name = js_string(file_name),
        )));
    }

    /// Queue an arbitrary out-of-band fragment.
    pub fn append(&self, fragment: impl Into<String>) {
        self.inner.effects.lock().push(fragment.into());
    }

    /// Fragments queued so far, in order.
    pub fn effects(&self) -> Vec<String> {
        self.inner.effects.lock().clone()
    }

    pub(crate) fn take_effects(&self) -> Vec<String> {
        std::mem::take(&mut *self.inner.effects.lock())
    }

    fn toast(&self, message: &str, class: &str) {
        let millis = self.inner.config.runtime.toast_duration.as_millis();

        self.append(trim(&format!(
            r#"<script>
            (function () {{
                let box = document.getElementById("{MESSAGES_ID}");
                if (box == null) {{
                    box = document.createElement("div");
                    box.id = "{MESSAGES_ID}";
                    box.classList = "fixed top-0 right-0 p-2 z-40";
                    document.body.appendChild(box);
                }}
                const toast = document.createElement("div");
                toast.classList = "p-4 m-2 rounded text-center border border-gray-700 shadow-xl text-xl w-64 {class}";
                toast.innerHTML = {message};
                box.appendChild(toast);
                setTimeout(() => toast.remove(), {millis});
            }})();
            </script>"#,
            message = js_string(message),
        )));
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("path", &self.inner.request.path)
            .field("session_id", &self.inner.session_id)
            .finish()
    }
}

/// Session storage bound to one session id.
pub struct Session<'a> {
    id: &'a str,
    store: &'a dyn SessionStore,
}

impl Session<'_> {
    pub fn id(&self) -> &str {
        self.id
    }

    /// Populate `out` from the blob last saved under `name`. Returns
    /// `false`, leaving `out` untouched, when nothing was saved.
    pub async fn load<T>(&self, name: &str, out: &mut T) -> Result<bool, Error>
    where
        T: DeserializeOwned + Send,
    {
        Ok(self.store.load_into(self.id, name, out).await?)
    }

    /// Persist `value` under `name`.
    pub async fn save<T>(&self, name: &str, value: &T) -> Result<(), Error>
    where
        T: Serialize + Sync + ?Sized,
    {
        Ok(self.store.save_value(self.id, name, value).await?)
    }

    pub async fn delete(&self, name: &str) -> Result<(), Error> {
        Ok(self.store.delete(self.id, name).await?)
    }

    /// Drop everything saved for this session.
    pub async fn clear(&self) -> Result<(), Error> {
        Ok(self.store.clear(self.id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Field;
    use std::net::SocketAddr;
    use tessera_session::MemorySessionStore;

    #[derive(Debug, Default, Field)]
    struct Login {
        #[field(rename = "Name")]
        name: String,
        #[field(rename = "Remember")]
        remember: bool,
    }

    fn context(request: HttpRequest) -> Context {
        Context::new(
            request,
            "sid",
            Arc::new(Registry::new()),
            Arc::new(MemorySessionStore::new()),
            Arc::new(AppConfig::default()),
        )
    }

    #[test]
    fn test_body_decodes_items() {
        let ctx = context(HttpRequest::new("POST", "/login").with_body(
            r#"[{"name":"Name","type":"string","value":"ada"},{"name":"Remember","type":"checkbox","value":"true"}]"#,
        ));

        let mut login = Login::default();
        let report = ctx.body(&mut login).unwrap();

        assert_eq!(report.applied, 2);
        assert_eq!(login.name, "ada");
        assert!(login.remember);
    }

    #[test]
    fn test_empty_body_is_no_items() {
        let ctx = context(HttpRequest::new("GET", "/"));
        let mut login = Login::default();
        assert_eq!(ctx.body(&mut login).unwrap(), DecodeReport::default());
    }

    #[test]
    fn test_body_read_failure_is_surfaced() {
        let mut request = HttpRequest::new("POST", "/login");
        request.body_error = Some("connection reset".into());
        let ctx = context(request);

        let err = ctx.body(&mut Login::default()).unwrap_err();
        assert!(matches!(err, Error::BodyRead(_)));
    }

    #[test]
    fn test_malformed_payload_is_surfaced() {
        let ctx = context(HttpRequest::new("POST", "/login").with_body("{not json"));
        let err = ctx.body(&mut Login::default()).unwrap_err();
        assert!(matches!(err, Error::Deserialization(_)));
    }

    #[test]
    fn test_effects_are_ordered() {
        let ctx = context(HttpRequest::new("POST", "/"));
        ctx.success("saved");
        ctx.redirect("/home");
        ctx.reload();

        let effects = ctx.effects();
        assert_eq!(effects.len(), 3);
        assert!(effects[0].contains("bg-green-700"));
        assert!(effects[1].contains(r#"window.location.href = "/home""#));
        assert_eq!(effects[2], "<script>window.location.reload();</script>");
    }

    #[test]
    fn test_toast_cannot_break_out_of_script() {
        let ctx = context(HttpRequest::new("POST", "/"));
        ctx.error("</script><script>alert(1)</script>\"");

        let effect = &ctx.effects()[0];
        assert_eq!(effect.matches("</script>").count(), 1);
        assert!(effect.contains("bg-red-700"));
        assert!(effect.contains("5000"));
    }

    #[test]
    fn test_download_is_base64() {
        let ctx = context(HttpRequest::new("POST", "/"));
        ctx.download_as(b"a,b\n1,2", "text/csv", "report.csv");

        let effect = &ctx.effects()[0];
        assert!(effect.contains(r#"atob("YSxiCjEsMg==")"#));
        assert!(effect.contains(r#"type: "text/csv""#));
        assert!(effect.contains(r#"a.download = "report.csv""#));
    }

    #[test]
    fn test_clones_share_effects() {
        let ctx = context(HttpRequest::new("POST", "/"));
        ctx.clone().append("<script>1</script>");
        assert_eq!(ctx.take_effects().len(), 1);
        assert!(ctx.effects().is_empty());
    }

    #[test]
    fn test_ip() {
        let addr: SocketAddr = "10.0.0.7:5555".parse().unwrap();
        let ctx = context(HttpRequest::new("GET", "/").with_remote_addr(addr));
        assert_eq!(ctx.ip(), Some(addr.ip()));
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let ctx = context(HttpRequest::new("POST", "/"));
        let session = ctx.session();

        let mut visits = 0u32;
        assert!(!session.load("visits", &mut visits).await.unwrap());

        session.save("visits", &3u32).await.unwrap();
        assert!(session.load("visits", &mut visits).await.unwrap());
        assert_eq!(visits, 3);
    }

    #[test]
    fn test_lazy_registration() {
        async fn open(_ctx: Context) -> String {
            String::new()
        }

        let ctx = context(HttpRequest::new("GET", "/"));
        let first = ctx.callable(open);
        let second = ctx.callable(open);
        assert_eq!(first.route(), second.route());
        assert_eq!(ctx.registry().len(), 1);
    }
}
