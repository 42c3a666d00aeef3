//! End-to-end tests of the invocation protocol: an action rendered into
//! markup, replayed by the test client, decoded by the handler and
//! answered with a fragment plus out-of-band effects.

use chrono::NaiveDate;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tessera::prelude::*;
use tessera_testing::*;
use tessera::{CONTENT_ID, Handler, Registry, RegistryError};

#[derive(Debug, Default, Clone, PartialEq, Field)]
struct Dates {
    #[field(rename = "From")]
    from: NaiveDate,
    #[field(rename = "To")]
    to: NaiveDate,
}

#[derive(Debug, Default, Clone, PartialEq, Field)]
struct Filter {
    #[field(rename = "Field")]
    field: String,
    #[field(rename = "Dates")]
    dates: Dates,
}

#[derive(Debug, Default, Field)]
struct Query {
    #[field(rename = "Filter")]
    filter: Vec<Filter>,
    #[field(rename = "Limit")]
    limit: i64,
}

async fn search(ctx: Context) -> String {
    let mut query = Query::default();
    if let Err(err) = ctx.body(&mut query) {
        return format!("<p class=\"error\">{err}</p>");
    }

    let from = query
        .filter
        .get(1)
        .map(|f| f.dates.from.to_string())
        .unwrap_or_default();
    format!("<p>{} filters, second from {from}</p>", query.filter.len())
}

// =============================================================================
// Decode through the dispatcher
// =============================================================================

#[tokio::test]
async fn test_indexed_path_reaches_handler() {
    let app = App::new(AppConfig::default());
    let action = app.action("search", search);
    let client = TestClient::from_app(&app);

    let response = client
        .post(
            action.route().as_str(),
            &[BodyItem::new("Filter[1].Dates.From", "date", "2024-03-01")],
        )
        .await;

    assert_status(&response, 200);
    assert_fragment(&response, "<p>2 filters, second from 2024-03-01</p>");
}

#[tokio::test]
async fn test_bad_items_are_skipped_not_fatal() {
    let app = App::new(AppConfig::default());
    let action = app.action("search", search);
    let client = TestClient::from_app(&app);

    let response = client
        .post(
            action.route().as_str(),
            &[
                BodyItem::new("Limit", "int", "many"),
                BodyItem::new("Nope", "string", "x"),
                BodyItem::new("Filter[1].Dates.From", "date", "2024-03-01"),
            ],
        )
        .await;

    assert_fragment(&response, "<p>2 filters, second from 2024-03-01</p>");
}

#[tokio::test]
async fn test_malformed_payload_is_reported_to_handler() {
    let app = App::new(AppConfig::default());
    let action = app.action("search", search);
    let client = TestClient::from_app(&app);

    let response = client
        .request("POST", action.route().as_str(), b"not json".to_vec())
        .await;

    assert_status(&response, 200);
    assert_body_contains(&response, "class=\"error\"");
}

#[tokio::test]
async fn test_bound_values_round_trip_through_client() {
    let app = App::new(AppConfig::default());
    let action = app.action("search", search);
    let client = TestClient::from_app(&app);

    let query = Query {
        filter: vec![
            Filter::default(),
            Filter {
                field: "created".to_string(),
                dates: Dates {
                    from: NaiveDate::from_ymd_opt(2023, 12, 24).unwrap(),
                    to: NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
                },
            },
        ],
        limit: 10,
    };

    let response = client.invoke(&action.call(&[&query])).await;
    assert_fragment(&response, "<p>2 filters, second from 2023-12-24</p>");
}

// =============================================================================
// Swap modes and out-of-band effects
// =============================================================================

struct Counter {
    target: Target,
    count: Arc<AtomicI64>,
}

fn counter_view(app: &App, counter: &Counter) -> String {
    let count = counter.count.clone();
    let increment = app.action("increment", move |_ctx: Context| {
        let count = count.clone();
        async move {
            let value = count.fetch_add(1, Ordering::SeqCst) + 1;
            format!("<span>{value}</span>")
        }
    });

    format!(
        r#"<div {}><button {}>+</button></div>"#,
        counter.target.attr(),
        increment.click(&[]).replace(&counter.target),
    )
}

#[tokio::test]
async fn test_replace_expression_names_target_and_route() {
    let app = App::new(AppConfig::default());
    let counter = Counter {
        target: Target::new(),
        count: Arc::new(AtomicI64::new(0)),
    };

    let html = counter_view(&app, &counter);

    assert!(html.contains(&format!(r#"id="{}""#, counter.target.id())));
    assert!(html.contains(&format!(
        "__post(event, &quot;outline&quot;, &quot;{}&quot;, &quot;/increment&quot;, [])",
        counter.target.id()
    )));
}

#[tokio::test]
async fn test_replace_fragment_keeps_target_id() {
    let app = App::new(AppConfig::default());
    let target = Target::new();
    let view_target = target.clone();

    let action = app.action("refresh", move |_ctx: Context| {
        let target = view_target.clone();
        async move { format!("<div {}>fresh</div>", target.attr()) }
    });
    let client = TestClient::from_app(&app);

    let response = client.invoke(&action.call(&[])).await;
    assert!(
        response
            .fragment()
            .starts_with(&format!(r#"<div id="{}""#, target.id()))
    );
}

#[tokio::test]
async fn test_none_swap_still_delivers_scripts() {
    let app = App::new(AppConfig::default());
    let action = app.action("ping", |ctx: Context| async move {
        ctx.success("pong");
        String::new()
    });
    let client = TestClient::from_app(&app);

    let invocation = action.call(&[]);
    assert!(invocation.none().contains("&quot;none&quot;, &quot;&quot;"));

    let response = client.invoke(&invocation).await;
    assert_fragment(&response, "");
    assert_script_count(&response, 1);
    assert_body_contains(&response, "pong");
}

#[tokio::test]
async fn test_effects_keep_queue_order() {
    let app = App::new(AppConfig::default());
    let action = app.action("save", |ctx: Context| async move {
        ctx.error("first");
        ctx.redirect("/done");
        "<form></form>".to_string()
    });
    let client = TestClient::from_app(&app);

    let response = client.invoke(&action.call(&[])).await;
    let scripts = response.scripts();

    assert_fragment(&response, "<form></form>");
    assert_eq!(scripts.len(), 2);
    assert!(scripts[0].contains("first"));
    assert!(scripts[1].contains("/done"));
}

// =============================================================================
// Registry through the facade
// =============================================================================

#[test]
fn test_colliding_names_report_both_handlers() {
    let registry = Registry::new();
    registry
        .try_register(None, Handler::new(|_ctx: Context| async { String::new() }).symbol("pkg.Show"))
        .unwrap();

    let err = registry
        .try_register(None, Handler::new(|_ctx: Context| async { String::new() }).symbol("pkg/Show"))
        .unwrap_err();

    match err {
        RegistryError::RouteCollision {
            route,
            existing,
            incoming,
        } => {
            assert_eq!(route, "/pkg-show");
            assert_eq!(existing, "pkg.Show");
            assert_eq!(incoming, "pkg/Show");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn test_page_document_carries_runtime_and_content_id() {
    let app = App::new(AppConfig::default());
    let document = app.document();
    app.page("/", move |_ctx: Context| {
        let document = document.clone();
        async move { document.render("Home", "<h1>Home</h1>") }
    });
    let client = TestClient::from_app(&app);

    let response = client.get("/").await;

    assert_status(&response, 200);
    assert_new_session(&response);
    assert_body_contains(&response, &format!(r#"id="{CONTENT_ID}""#));
    assert_body_contains(&response, "function __post(");
    assert_body_contains(&response, "<h1>Home</h1>");
}

#[tokio::test]
async fn test_unknown_route_and_method() {
    let app = App::new(AppConfig::default());
    app.page("/", |_ctx: Context| async { "home".to_string() });
    let client = TestClient::from_app(&app);

    assert_status(&client.get("/missing").await, 404);
    assert_status(&client.request("DELETE", "/", Vec::new()).await, 405);
}
