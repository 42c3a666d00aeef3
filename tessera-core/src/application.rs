// Application bootstrapper and HTTP server

use crate::client::Document;
use crate::{
    Action, AppConfig, Context, Dispatcher, Error, HttpRequest, HttpResponse, Registry,
};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, body::Incoming as IncomingBody};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tessera_session::{MemorySessionStore, SessionStore};
use tokio::net::TcpListener;

/// The main application struct: one registry, one session store and one
/// document shell per running server.
pub struct App {
    registry: Arc<Registry>,
    sessions: Arc<dyn SessionStore>,
    config: Arc<AppConfig>,
    document: Arc<Document>,
}

impl App {
    /// Create an application with in-memory sessions.
    pub fn new(config: AppConfig) -> Self {
        Self {
            registry: Arc::new(Registry::with_base_path(config.base_path.clone())),
            sessions: Arc::new(MemorySessionStore::new()),
            document: Arc::new(Document::new(&config)),
            config: Arc::new(config),
        }
    }

    /// Create an application configured from `TESSERA_*` variables.
    pub fn from_env() -> Result<Self, Error> {
        Ok(Self::new(AppConfig::from_env()?))
    }

    /// Use `store` for session blobs.
    pub fn with_sessions(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.sessions = store;
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Bind a page handler to `path`.
    ///
    /// # Panics
    ///
    /// Panics when `path` is already bound to another handler.
    pub fn page<F, Fut>(&self, path: &str, func: F) -> Action
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = String> + Send + 'static,
    {
        self.registry.page(path, func)
    }

    /// Register a handler under its derived route.
    ///
    /// # Panics
    ///
    /// Panics on a route collision.
    pub fn callable<F, Fut>(&self, func: F) -> Action
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = String> + Send + 'static,
    {
        self.registry.callable(func)
    }

    /// Register a handler under an explicit name.
    ///
    /// # Panics
    ///
    /// Panics on a route collision.
    pub fn action<F, Fut>(&self, name: &str, func: F) -> Action
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = String> + Send + 'static,
    {
        self.registry.action(name, func)
    }

    /// Add a `<meta name="description">` to every document.
    pub fn description(&mut self, description: &str) {
        Arc::make_mut(&mut self.document).description(description);
    }

    /// Add a raw head entry to every document.
    pub fn head(&mut self, entry: impl Into<String>) {
        Arc::make_mut(&mut self.document).head(entry);
    }

    /// Shared document shell, for handlers that render whole pages.
    pub fn document(&self) -> Arc<Document> {
        self.document.clone()
    }

    /// Render a full document around `body`.
    pub fn html(&self, title: &str, body: &str) -> String {
        self.document.render(title, body)
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            self.registry.clone(),
            self.sessions.clone(),
            self.config.clone(),
        )
    }

    /// Start the HTTP server on the configured address
    pub async fn listen(self) -> Result<(), Error> {
        let listener = TcpListener::bind(self.config.addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener
    pub async fn serve(self, listener: TcpListener) -> Result<(), Error> {
        tracing::info!(addr = %listener.local_addr()?, routes = self.registry.len(), "Listening");

        let dispatcher = Arc::new(self.dispatcher());

        loop {
            let (stream, remote) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let dispatcher = dispatcher.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<IncomingBody>| {
                    let dispatcher = dispatcher.clone();
                    async move { handle_request(req, remote, dispatcher).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    tracing::debug!(error = %err, remote = %remote, "Error serving connection");
                }
            });
        }
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}

/// Handle an incoming HTTP request
async fn handle_request(
    req: Request<IncomingBody>,
    remote: SocketAddr,
    dispatcher: Arc<Dispatcher>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().to_string();
    let target = req
        .uri()
        .path_and_query()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let mut request = HttpRequest::new(method, target).with_remote_addr(remote);

    for (name, value) in req.headers() {
        if let Ok(value) = value.to_str() {
            request.headers.insert(name.to_string(), value.to_string());
        }
    }

    // A failed read is the handler's to report.
    match read_body(req.into_body(), dispatcher.config().max_body_bytes).await {
        Ok(body) => request.body = body,
        Err(err) => {
            tracing::warn!(error = %err, path = %request.path, "Failed to read request body");
            request.body_error = Some(err);
        }
    }

    Ok(into_hyper(dispatcher.dispatch(request).await))
}

/// Collect at most `limit` bytes of `body`.
async fn read_body<B>(body: B, limit: usize) -> Result<Vec<u8>, String>
where
    B: hyper::body::Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes().to_vec()),
        Err(err) => Err(err.to_string()),
    }
}

fn into_hyper(response: HttpResponse) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(response.status);

    for (key, value) in response.headers {
        builder = builder.header(key, value);
    }

    builder
        .body(Full::new(Bytes::from(response.body)))
        .unwrap_or_else(|err| {
            tracing::error!(error = %err, "Failed to build response");
            let mut fallback = Response::new(Full::new(Bytes::new()));
            *fallback.status_mut() = hyper::StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn home(_ctx: Context) -> String {
        "home".to_string()
    }

    #[test]
    fn test_registry_uses_base_path() {
        let app = App::new(AppConfig::default().with_base_path("/ui"));
        async fn save(_ctx: Context) -> String {
            String::new()
        }
        let action = app.action("save", save);
        assert_eq!(action.route().as_str(), "/ui/save");
    }

    #[test]
    fn test_html_includes_description() {
        let mut app = App::new(AppConfig::default());
        app.description("Demo");
        let html = app.html("Title", "<main></main>");
        assert!(html.contains(r#"<meta name="description" content="Demo">"#));
        assert!(html.contains("<title>Title</title>"));
    }

    #[test]
    fn test_into_hyper_keeps_status_and_headers() {
        let response = into_hyper(HttpResponse::not_found());
        assert_eq!(response.status(), 404);
        assert_eq!(
            response.headers().get("Content-Type").unwrap(),
            "text/plain; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn test_read_body_within_limit() {
        let body = Full::new(Bytes::from_static(b"[]"));
        assert_eq!(read_body(body, 2).await.unwrap(), b"[]");
    }

    #[tokio::test]
    async fn test_read_body_over_limit_fails() {
        let body = Full::new(Bytes::from(vec![b'x'; 65]));
        assert!(read_body(body, 64).await.is_err());
    }

    async fn count(ctx: Context) -> String {
        match ctx.body_items() {
            Ok(items) => items.len().to_string(),
            Err(err) => err.to_string(),
        }
    }

    #[tokio::test]
    async fn test_oversized_body_is_reported_to_handler() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let app = App::new(AppConfig::default().with_max_body_bytes(16));
        let action = app.action("count", count);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(app.serve(listener));

        let body = r#"[{"name":"a","type":"int","value":"1"}]"#;
        let request = format!(
            "POST {} HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            action.route(),
            body.len(),
        );

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();

        assert!(raw.starts_with("HTTP/1.1 200 OK"));
        assert!(raw.contains("Failed to read request body"));
    }

    #[tokio::test]
    async fn test_serves_over_tcp() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let app = App::new(AppConfig::default());
        app.page("/", home);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(app.serve(listener));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();

        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();

        assert!(raw.starts_with("HTTP/1.1 200 OK"));
        assert!(raw.to_ascii_lowercase().contains("set-cookie: session_id="));
        assert!(raw.ends_with("home"));
    }
}
