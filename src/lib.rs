// Tessera - server-rendered interactive HTML for Rust
//
// Handlers become endpoints, the browser invokes them through generated
// expressions, and returned fragments are spliced back into the page.

// Re-export core functionality
pub use tessera_core::*;

// Session storage backends
pub use tessera_session as session;

#[cfg(feature = "testing")]
pub use tessera_testing as testing;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        Action,
        App,
        AppConfig,
        BodyItem,
        Context,
        Error,
        Field,
        Invocation,
        Swap,
        Target,
        load,
        // Session types
        session::{SessionStore, SessionStoreExt},
    };
}
