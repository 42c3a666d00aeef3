// In-process test client

use parking_lot::Mutex;
use std::collections::HashMap;
use tessera_core::{App, BodyItem, Dispatcher, HttpRequest, HttpResponse, Invocation};

/// Drives a [`Dispatcher`] the way the browser runtime would, without a
/// socket. Remembers cookies set by responses so consecutive requests share
/// one session.
pub struct TestClient {
    dispatcher: Dispatcher,
    cookies: Mutex<HashMap<String, String>>,
}

impl TestClient {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            cookies: Mutex::new(HashMap::new()),
        }
    }

    /// Client for everything registered on `app` so far and after.
    pub fn from_app(app: &App) -> Self {
        Self::new(app.dispatcher())
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Make a GET request, as `__load` does
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, Vec::new()).await
    }

    /// POST a JSON array of body items
    pub async fn post(&self, path: &str, items: &[BodyItem]) -> TestResponse {
        let body = serde_json::to_vec(items).unwrap_or_default();
        self.request("POST", path, body).await
    }

    /// Fire an invocation with only its bound values, as a click on an
    /// unnamed element does.
    pub async fn invoke(&self, invocation: &Invocation) -> TestResponse {
        self.post(invocation.route().as_str(), invocation.values()).await
    }

    /// Fire an invocation the way `__submit` does: every `fields` entry
    /// overrides a bound value of the same name.
    pub async fn submit(&self, invocation: &Invocation, fields: &[BodyItem]) -> TestResponse {
        let items = merge(invocation.values(), fields);
        self.post(invocation.route().as_str(), &items).await
    }

    /// Make a request with a custom method and raw body
    pub async fn request(&self, method: &str, path: &str, body: Vec<u8>) -> TestResponse {
        let mut request = HttpRequest::new(method, path).with_body(body);
        if let Some(cookie) = self.cookie_header() {
            request = request.with_header("Cookie", cookie);
        }

        let response = self.dispatcher.dispatch(request).await;
        self.remember(&response);
        TestResponse::new(response)
    }

    /// Current value of cookie `name`
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.lock().get(name).cloned()
    }

    /// Session id assigned by the server, if any request minted one yet
    pub fn session_id(&self) -> Option<String> {
        self.cookie(&self.dispatcher.config().cookie.name)
    }

    pub fn set_cookie(&self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.lock().insert(name.into(), value.into());
    }

    /// Forget all cookies; the next request starts a fresh session
    pub fn clear_cookies(&self) {
        self.cookies.lock().clear();
    }

    fn cookie_header(&self) -> Option<String> {
        let cookies = self.cookies.lock();
        if cookies.is_empty() {
            return None;
        }
        let mut pairs: Vec<String> = cookies.iter().map(|(k, v)| format!("{k}={v}")).collect();
        pairs.sort();
        Some(pairs.join("; "))
    }

    fn remember(&self, response: &HttpResponse) {
        let Some(header) = response.headers.get("Set-Cookie") else {
            return;
        };
        let first = header.split(';').next().unwrap_or_default();
        if let Some((name, value)) = first.trim().split_once('=') {
            self.set_cookie(name, value);
        }
    }
}

/// Later items replace earlier ones with the same name and move to the end.
pub fn merge(values: &[BodyItem], fields: &[BodyItem]) -> Vec<BodyItem> {
    let mut merged = values.to_vec();
    for field in fields {
        merged.retain(|item| item.name != field.name);
        merged.push(field.clone());
    }
    merged
}

/// A dispatched response.
#[derive(Debug, Clone)]
pub struct TestResponse {
    response: HttpResponse,
}

impl TestResponse {
    pub fn new(response: HttpResponse) -> Self {
        Self { response }
    }

    pub fn status(&self) -> u16 {
        self.response.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.response.status)
    }

    pub fn body_string(&self) -> String {
        self.response.body_string()
    }

    /// Get a header by name, ignoring ASCII case
    pub fn header(&self, key: &str) -> Option<&String> {
        self.response
            .headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value)
    }

    /// The body up to the first out-of-band `<script>`
    pub fn fragment(&self) -> String {
        let body = self.body_string();
        match body.find("<script>") {
            Some(at) => body[..at].to_string(),
            None => body,
        }
    }

    /// Every `<script>...</script>` block in the body, in order
    pub fn scripts(&self) -> Vec<String> {
        let body = self.body_string();
        let mut scripts = Vec::new();
        let mut rest = body.as_str();
        while let Some(start) = rest.find("<script>") {
            let tail = &rest[start..];
            let Some(end) = tail.find("</script>") else {
                break;
            };
            let close = end + "</script>".len();
            scripts.push(tail[..close].to_string());
            rest = &tail[close..];
        }
        scripts
    }

    pub fn into_inner(self) -> HttpResponse {
        self.response
    }
}

impl AsRef<HttpResponse> for TestResponse {
    fn as_ref(&self) -> &HttpResponse {
        &self.response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{AppConfig, Context, Field};

    async fn whoami(ctx: Context) -> String {
        ctx.session_id().to_string()
    }

    async fn echo(ctx: Context) -> String {
        let items = ctx.body_items().unwrap_or_default();
        items
            .iter()
            .map(|item| format!("{}={}", item.name, item.value))
            .collect::<Vec<_>>()
            .join("&")
    }

    async fn toast(ctx: Context) -> String {
        ctx.success("saved");
        "<p>ok</p>".to_string()
    }

    fn item(name: &str, kind: &str, value: &str) -> BodyItem {
        BodyItem::new(name, kind, value)
    }

    #[tokio::test]
    async fn test_session_cookie_is_kept_between_requests() {
        let app = App::new(AppConfig::default());
        app.page("/me", whoami);
        let client = TestClient::from_app(&app);

        let first = client.get("/me").await;
        let second = client.get("/me").await;

        assert_eq!(first.body_string(), second.body_string());
        assert_eq!(client.session_id(), Some(first.body_string()));
        assert!(second.header("set-cookie").is_none());
    }

    #[tokio::test]
    async fn test_clear_cookies_starts_new_session() {
        let app = App::new(AppConfig::default());
        app.page("/me", whoami);
        let client = TestClient::from_app(&app);

        let first = client.get("/me").await;
        client.clear_cookies();
        let second = client.get("/me").await;

        assert_ne!(first.body_string(), second.body_string());
    }

    #[derive(Default, Field)]
    #[field(crate = "tessera_core")]
    struct Row {
        id: i64,
        name: String,
    }

    #[tokio::test]
    async fn test_submit_overrides_bound_values() {
        let app = App::new(AppConfig::default());
        let action = app.action("echo", echo);
        let client = TestClient::from_app(&app);

        let row = Row {
            id: 7,
            name: "old".to_string(),
        };
        let invocation = action.send(&[&row]);

        let response = client.submit(&invocation, &[item("name", "text", "new")]).await;
        assert_eq!(response.body_string(), "id=7&name=new");
    }

    #[test]
    fn test_merge_replaces_and_appends() {
        let values = vec![item("a", "int", "1"), item("b", "text", "x")];
        let merged = merge(&values, &[item("a", "int", "2"), item("c", "bool", "true")]);

        let names: Vec<_> = merged.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["b", "a", "c"]);
        assert_eq!(merged[1].value, "2");
    }

    #[tokio::test]
    async fn test_fragment_and_scripts_split() {
        let app = App::new(AppConfig::default());
        let action = app.action("toast", toast);
        let client = TestClient::from_app(&app);

        let response = client.invoke(&action.call(&[])).await;

        assert_eq!(response.fragment(), "<p>ok</p>");
        assert_eq!(response.scripts().len(), 1);
        assert!(response.scripts()[0].contains("saved"));
    }
}
