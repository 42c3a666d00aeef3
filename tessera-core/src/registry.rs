//! Handler registry.
//!
//! Binds handlers to routes for the lifetime of the process. Every handler
//! is wrapped in a [`Handler`] before registration; registration returns an
//! [`Action`], the token that render code embeds into markup and the
//! dispatcher invokes.
//!
//! Handler identity is the handler's Rust type together with the name its
//! route is derived from. Function items each have their own type, so
//! registering `increment` on every render returns the same route without
//! any runtime comparison of function pointers. Closures created by the
//! same expression share a type; give them explicit names when one
//! expression must serve several routes.

use crate::{Context, RegistryError};
use parking_lot::RwLock;
use regex::Regex;
use std::any::{TypeId, type_name};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, LazyLock};

/// Future returned by an erased handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = String> + Send>>;

/// Type alias for erased handler functions
pub type HandlerFn = Arc<dyn Fn(Context) -> HandlerFuture + Send + Sync>;

static REMOVE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[*()\[\]{}<>&',\s]").expect("valid regex"));
static REPLACE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[./:\-]+").expect("valid regex"));

/// A route a handler is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Route(Arc<str>);

impl Route {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Route {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A handler wrapped for registration.
pub struct Handler {
    type_id: TypeId,
    symbol: Cow<'static, str>,
    func: HandlerFn,
}

impl Handler {
    /// Wrap a handler. Its symbolic name is the Rust path of `F`.
    pub fn new<F, Fut>(func: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = String> + Send + 'static,
    {
        Self {
            type_id: TypeId::of::<F>(),
            symbol: Cow::Borrowed(type_name::<F>()),
            func: Arc::new(move |ctx| -> HandlerFuture { Box::pin(func(ctx)) }),
        }
    }

    /// Override the symbolic name the implicit route is derived from.
    pub fn symbol(mut self, symbol: impl Into<Cow<'static, str>>) -> Self {
        self.symbol = symbol.into();
        self
    }

    pub fn symbol_name(&self) -> &str {
        &self.symbol
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").field("symbol", &self.symbol).finish()
    }
}

/// Registration token: a handler bound to its route.
#[derive(Clone)]
pub struct Action {
    route: Route,
    name: Arc<str>,
    func: HandlerFn,
}

impl Action {
    pub fn route(&self) -> &Route {
        &self.route
    }

    /// The name the handler was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the handler for one request.
    pub fn invoke(&self, ctx: Context) -> HandlerFuture {
        (self.func)(ctx)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("route", &self.route)
            .field("name", &self.name)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct HandlerKey {
    type_id: TypeId,
    name: String,
}

enum Naming<'a> {
    Implicit,
    Explicit(&'a str),
    Page(&'a str),
}

#[derive(Default)]
struct Entries {
    routes: HashMap<Route, Action>,
    keys: HashMap<HandlerKey, Route>,
}

/// Append-only map between handlers and routes.
///
/// One registry is owned by each running application and shared by
/// reference with everything that renders actions.
pub struct Registry {
    base_path: String,
    entries: RwLock<Entries>,
}

impl Registry {
    /// Create a registry whose derived routes live under `/`.
    pub fn new() -> Self {
        Self::with_base_path("/")
    }

    pub fn with_base_path(base_path: impl Into<String>) -> Self {
        let mut base_path = base_path.into();
        if !base_path.starts_with('/') {
            base_path.insert(0, '/');
        }

        Self {
            base_path,
            entries: RwLock::new(Entries::default()),
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Bind `handler` to a route, or return the route it already has.
    ///
    /// The route is `explicit_name` when given, otherwise it is derived from
    /// the handler's symbolic name. A route already held by a different
    /// handler is an error.
    pub fn try_register(
        &self,
        explicit_name: Option<&str>,
        handler: Handler,
    ) -> Result<Action, RegistryError> {
        match explicit_name {
            Some(name) => self.insert(Naming::Explicit(name), handler),
            None => self.insert(Naming::Implicit, handler),
        }
    }

    /// Bind `handler` to an explicit page path, used verbatim.
    pub fn try_page(&self, path: &str, handler: Handler) -> Result<Action, RegistryError> {
        self.insert(Naming::Page(path), handler)
    }

    /// Fail-fast form of [`try_register`](Self::try_register).
    ///
    /// # Panics
    ///
    /// Panics when the route collides with another handler's or the name is
    /// empty. Both are defects in the calling code.
    pub fn register(&self, explicit_name: Option<&str>, handler: Handler) -> Action {
        self.try_register(explicit_name, handler)
            .unwrap_or_else(|err| fail(err))
    }

    /// Register a handler under the route derived from its Rust path.
    ///
    /// # Panics
    ///
    /// See [`register`](Self::register).
    pub fn callable<F, Fut>(&self, func: F) -> Action
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = String> + Send + 'static,
    {
        self.register(None, Handler::new(func))
    }

    /// Register a handler under an explicit action name.
    ///
    /// # Panics
    ///
    /// See [`register`](Self::register).
    pub fn action<F, Fut>(&self, name: &str, func: F) -> Action
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = String> + Send + 'static,
    {
        self.register(Some(name), Handler::new(func))
    }

    /// Register a page handler at `path`.
    ///
    /// # Panics
    ///
    /// See [`register`](Self::register).
    pub fn page<F, Fut>(&self, path: &str, func: F) -> Action
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = String> + Send + 'static,
    {
        self.try_page(path, Handler::new(func))
            .unwrap_or_else(|err| fail(err))
    }

    /// Route of a handler registered under its derived name.
    pub fn resolve<F: 'static>(&self, _func: &F) -> Result<Route, RegistryError> {
        self.resolve_key(&HandlerKey {
            type_id: TypeId::of::<F>(),
            name: type_name::<F>().to_string(),
        })
    }

    /// Route of a handler registered under an explicit name.
    pub fn resolve_named<F: 'static>(&self, name: &str, _func: &F) -> Result<Route, RegistryError> {
        self.resolve_key(&HandlerKey {
            type_id: TypeId::of::<F>(),
            name: name.to_string(),
        })
    }

    /// Fail-fast form of [`resolve`](Self::resolve).
    ///
    /// # Panics
    ///
    /// Panics when the handler was never registered.
    pub fn route_of<F: 'static>(&self, func: &F) -> Route {
        self.resolve(func).unwrap_or_else(|err| fail(err))
    }

    /// Exact-match lookup used by the dispatcher.
    pub fn lookup(&self, path: &str) -> Option<Action> {
        let entries = self.entries.read();
        entries.routes.get(path).cloned()
    }

    /// All registered routes, sorted.
    pub fn routes(&self) -> Vec<Route> {
        let mut routes: Vec<Route> = self.entries.read().routes.keys().cloned().collect();
        routes.sort();
        routes
    }

    pub fn len(&self) -> usize {
        self.entries.read().routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn resolve_key(&self, key: &HandlerKey) -> Result<Route, RegistryError> {
        self.entries
            .read()
            .keys
            .get(key)
            .cloned()
            .ok_or_else(|| RegistryError::Unregistered(key.name.clone()))
    }

    fn insert(&self, naming: Naming<'_>, handler: Handler) -> Result<Action, RegistryError> {
        let name = match naming {
            Naming::Implicit => handler.symbol.to_string(),
            Naming::Explicit(name) | Naming::Page(name) => name.trim().to_string(),
        };

        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }

        let key = HandlerKey {
            type_id: handler.type_id,
            name,
        };

        // Steady state: the handler is already bound.
        if let Some(action) = self.existing(&key) {
            return Ok(action);
        }

        let route = match naming {
            Naming::Implicit => normalize(&self.base_path, &key.name),
            Naming::Explicit(_) => prefix(&self.base_path, &key.name.to_lowercase()),
            Naming::Page(_) => prefix("/", &key.name),
        };

        let mut entries = self.entries.write();

        // A concurrent first use may have bound it in the meantime.
        if let Some(route) = entries.keys.get(&key) {
            return Ok(entries.routes[route].clone());
        }

        if let Some(existing) = entries.routes.get(route.as_str()) {
            return Err(RegistryError::RouteCollision {
                route,
                existing: existing.name.to_string(),
                incoming: key.name,
            });
        }

        let route = Route(Arc::from(route));
        let action = Action {
            route: route.clone(),
            name: Arc::from(key.name.as_str()),
            func: handler.func,
        };

        tracing::debug!(route = %route, handler = %key.name, "Registered handler");

        entries.routes.insert(route.clone(), action.clone());
        entries.keys.insert(key, route);

        Ok(action)
    }

    fn existing(&self, key: &HandlerKey) -> Option<Action> {
        let entries = self.entries.read();
        let route = entries.keys.get(key)?;
        entries.routes.get(route).cloned()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("base_path", &self.base_path)
            .field("routes", &self.routes())
            .finish()
    }
}

impl std::borrow::Borrow<str> for Route {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Derive a route from a symbolic handler name.
///
/// Lower-cases, strips characters that are unsafe in a path, collapses
/// separator runs into `-` and prefixes the base path.
pub fn normalize(base_path: &str, symbol: &str) -> String {
    let lowered = symbol.to_lowercase();
    let stripped = REMOVE_CHARS.replace_all(&lowered, "");
    let joined = REPLACE_CHARS.replace_all(&stripped, "-");
    prefix(base_path, &joined)
}

fn prefix(base_path: &str, name: &str) -> String {
    if name.starts_with(base_path) {
        return name.to_string();
    }

    let base = base_path.trim_end_matches('/');
    format!("{}/{}", base, name.trim_start_matches('/'))
}

fn fail(err: RegistryError) -> ! {
    tracing::error!(error = %err, "Handler registration failed");
    panic!("{err}")
}
