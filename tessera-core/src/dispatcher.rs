//! Request dispatch.
//!
//! One call to [`Dispatcher::dispatch`] handles one request: method filter,
//! exact route lookup, session continuity, handler invocation and response
//! assembly. The HTTP server loop in [`crate::application`] calls it once per
//! request on its own task; tests call it directly.

use crate::action::random_token;
use crate::config::AppConfig;
use crate::context::Context;
use crate::http::{HttpRequest, HttpResponse};
use crate::registry::Registry;
use std::sync::Arc;
use std::time::Instant;
use tessera_session::{SessionStore, validate_session_id};

/// Routes requests to registered handlers.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    sessions: Arc<dyn SessionStore>,
    config: Arc<AppConfig>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<Registry>,
        sessions: Arc<dyn SessionStore>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            registry,
            sessions,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Handle one request.
    ///
    /// The response body is the handler's fragment followed by every
    /// out-of-band fragment it queued, in order.
    pub async fn dispatch(&self, request: HttpRequest) -> HttpResponse {
        let started = Instant::now();

        if request.method != "GET" && request.method != "POST" {
            tracing::debug!(method = %request.method, path = %request.path, "Method not allowed");
            return HttpResponse::method_not_allowed();
        }

        let Some(action) = self.registry.lookup(&request.path) else {
            tracing::debug!(method = %request.method, path = %request.path, "No handler for path");
            return HttpResponse::not_found();
        };

        // Concurrent first requests from one client may each mint an id.
        let (session_id, minted) = match request.cookie(&self.config.cookie.name) {
            Some(id) if validate_session_id(id).is_ok() => (id.to_string(), false),
            _ => (random_token(self.config.cookie.token_length), true),
        };

        let method = request.method.clone();
        let ctx = Context::new(
            request,
            session_id.clone(),
            self.registry.clone(),
            self.sessions.clone(),
            self.config.clone(),
        );

        let mut body = action.invoke(ctx.clone()).await;
        let effects = ctx.take_effects();
        for effect in &effects {
            body.push_str(effect);
        }

        tracing::info!(
            method = %method,
            route = %action.route(),
            effects = effects.len(),
            new_session = minted,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Dispatched"
        );

        let response = HttpResponse::html(body);
        if minted {
            response.with_header("Set-Cookie", self.config.cookie.header_value(&session_id))
        } else {
            response
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .finish()
    }
}
