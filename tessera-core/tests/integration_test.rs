//! Dispatcher, registry and codec working together without a socket.

use chrono::NaiveDate;
use std::sync::Arc;
use tessera_core::*;
use tessera_session::MemorySessionStore;

#[derive(Debug, Default, PartialEq, Field)]
#[field(crate = "tessera_core")]
struct Period {
    #[field(rename = "From")]
    from: NaiveDate,
    #[field(rename = "Until")]
    until: Option<NaiveDate>,
}

#[derive(Debug, Default, Field)]
#[field(crate = "tessera_core")]
struct Report {
    #[field(rename = "Title")]
    title: String,
    #[field(rename = "Periods")]
    periods: Vec<Period>,
    #[field(skip)]
    cached: bool,
}

fn dispatcher(config: AppConfig) -> Dispatcher {
    let registry = Arc::new(Registry::with_base_path(config.base_path.clone()));
    Dispatcher::new(registry, Arc::new(MemorySessionStore::new()), Arc::new(config))
}

async fn summarize(ctx: Context) -> String {
    let mut report = Report::default();
    match ctx.body(&mut report) {
        Ok(decoded) => format!(
            "{}|{}|{}|{}",
            report.title,
            report.periods.len(),
            decoded.applied,
            decoded.skipped
        ),
        Err(err) => format!("error: {err}"),
    }
}

#[tokio::test]
async fn test_base_path_applies_to_actions() {
    let dispatcher = dispatcher(AppConfig::default().with_base_path("/app"));
    let action = dispatcher.registry().action("Summarize", summarize);
    assert_eq!(action.route().as_str(), "/app/summarize");

    let response = dispatcher
        .dispatch(HttpRequest::new("POST", "/app/summarize").with_body(
            r#"[{"name":"Title","type":"string","value":"Q1"},{"name":"Periods[2].From","type":"date","value":"2024-01-01"}]"#,
        ))
        .await;

    assert_eq!(response.status, 200);
    assert_eq!(response.body_string(), "Q1|3|2|0");
}

#[tokio::test]
async fn test_skipped_fields_are_counted() {
    let dispatcher = dispatcher(AppConfig::default());
    let action = dispatcher.registry().action("summarize", summarize);

    let response = dispatcher
        .dispatch(HttpRequest::new("POST", action.route().as_str()).with_body(
            r#"[{"name":"cached","type":"bool","value":"true"},{"name":"Periods[x].From","type":"date","value":"2024-01-01"}]"#,
        ))
        .await;

    assert_eq!(response.body_string(), "|0|0|2");
}

#[tokio::test]
async fn test_body_read_failure_reaches_handler() {
    let dispatcher = dispatcher(AppConfig::default());
    let action = dispatcher.registry().action("summarize", summarize);

    let mut request = HttpRequest::new("POST", action.route().as_str());
    request.body_error = Some("connection reset".to_string());

    let response = dispatcher.dispatch(request).await;
    assert_eq!(response.status, 200);
    assert!(response.body_string().starts_with("error: "));
    assert!(response.body_string().contains("connection reset"));
}

#[tokio::test]
async fn test_encoded_invocation_decodes_back() {
    let dispatcher = dispatcher(AppConfig::default());
    let action = dispatcher.registry().action("summarize", summarize);

    let report = Report {
        title: "Year".to_string(),
        periods: vec![
            Period {
                from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                until: Some(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()),
            },
            Period::default(),
        ],
        cached: true,
    };
    let invocation = action.call(&[&report]);
    assert!(invocation.values().iter().all(|item| item.name != "cached"));

    let body = serde_json::to_vec(invocation.values()).unwrap();
    let response = dispatcher
        .dispatch(HttpRequest::new("POST", invocation.route().as_str()).with_body(body))
        .await;

    let applied = invocation.values().len();
    assert_eq!(response.body_string(), format!("Year|2|{applied}|0"));
}

#[tokio::test]
async fn test_custom_cookie_name() {
    let dispatcher = dispatcher(
        AppConfig::default()
            .with_cookie_name("sid")
            .with_cookie_secure(false),
    );
    dispatcher
        .registry()
        .page("/", |ctx: Context| async move { ctx.session_id().to_string() });

    let response = dispatcher.dispatch(HttpRequest::new("GET", "/")).await;
    let cookie = response.headers.get("Set-Cookie").unwrap();
    assert!(cookie.starts_with("sid="));
    assert!(!cookie.contains("Secure"));

    let again = dispatcher
        .dispatch(HttpRequest::new("GET", "/").with_header("Cookie", "theme=dark; sid=abc"))
        .await;
    assert_eq!(again.body_string(), "abc");
}
