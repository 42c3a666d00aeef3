//! Testing utilities for Tessera applications.
//!
//! [`TestClient`] dispatches requests in-process, keeps the session cookie
//! between calls and replays invocations the way the browser runtime sends
//! them.
//!
//! ```no_run
//! use tessera_core::{App, AppConfig, Context};
//! use tessera_testing::*;
//!
//! async fn hello(_ctx: Context) -> String {
//!     "<p>Hello!</p>".to_string()
//! }
//!
//! # tokio_test::block_on(async {
//! let app = App::new(AppConfig::default());
//! let action = app.action("hello", hello);
//!
//! let client = TestClient::from_app(&app);
//! let response = client.invoke(&action.call(&[])).await;
//! assert_status(&response, 200);
//! assert_fragment(&response, "<p>Hello!</p>");
//! # });
//! ```

mod assertions;
mod test_client;

pub use assertions::{
    assert_body_contains, assert_fragment, assert_header, assert_http_status, assert_new_session,
    assert_script_count, assert_status,
};
pub use test_client::{TestClient, TestResponse, merge};
