// Core library for the Tessera runtime
// Handlers become endpoints, the browser invokes them, returned fragments
// are spliced back into the live document.

// `#[derive(Field)]` expands to `::tessera::codec` paths.
extern crate self as tessera;

pub mod action;
pub mod application;
pub mod client;
pub mod codec;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod logging;
pub mod registry;
pub mod status;

// Re-export commonly used types
pub use action::{Invocation, Swap, Target, Verb, load};
pub use application::App;
pub use client::{CONTENT_ID, Document, runtime_script};
pub use codec::{BodyItem, DecodeReport, Field, TypeTag, decode, encode};
pub use config::{AppConfig, CookieConfig, RuntimeConfig, SameSite};
pub use context::{Context, Session};
pub use dispatcher::Dispatcher;
pub use error::*;
pub use http::*;
pub use registry::{Action, Handler, HandlerFn, HandlerFuture, Registry, Route};
pub use status::*;

/// `#[derive(Field)]` for request payload records.
pub use tessera_macros::Field;
