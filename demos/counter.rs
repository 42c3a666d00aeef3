/// Counter demo
///
/// A page with a counter whose buttons call back into the server. Each
/// click posts to a registered action, the count lives in the session and
/// the returned fragment replaces the counter in place.
///
/// Run with `cargo run --example counter` and open http://127.0.0.1:1422
/// (or the port in `TESSERA_PORT`).
use tessera::logging::{LogConfig, info};
use tessera::prelude::*;
use tessera::session::{self, SessionConfig};

const COUNTER_ID: &str = "counter";

#[derive(Debug, Default, Field)]
struct Step {
    #[field(rename = "By")]
    by: i64,
}

async fn count(ctx: &Context) -> i64 {
    let mut value = 0i64;
    if let Err(err) = ctx.session().load("count", &mut value).await {
        ctx.error(&err.to_string());
    }
    value
}

async fn change(ctx: Context) -> String {
    let mut step = Step::default();
    if let Err(err) = ctx.body(&mut step) {
        ctx.error(&err.to_string());
        let value = count(&ctx).await;
        return counter(&ctx, value);
    }

    let value = count(&ctx).await + step.by;
    if let Err(err) = ctx.session().save("count", &value).await {
        ctx.error(&err.to_string());
    }
    if value % 10 == 0 && value != 0 {
        ctx.success(&format!("Reached {value}"));
    }

    counter(&ctx, value)
}

async fn reset(ctx: Context) -> String {
    if let Err(err) = ctx.session().delete("count").await {
        ctx.error(&err.to_string());
    }
    counter(&ctx, 0)
}

fn counter(ctx: &Context, value: i64) -> String {
    let target = Target::from_id(COUNTER_ID);
    let change = ctx.action("counter/change", change);
    let reset = ctx.action("counter/reset", reset);

    format!(
        r#"<div {} class="flex gap-4 items-center p-4 bg-white rounded">
            <button class="px-3 py-1 bg-red-600 text-white rounded" {}>-1</button>
            <span class="text-2xl font-bold">{value}</span>
            <button class="px-3 py-1 bg-green-600 text-white rounded" {}>+1</button>
            <button class="px-3 py-1 border rounded" {}>Reset</button>
        </div>"#,
        target.attr(),
        change.click(&[&Step { by: -1 }]).replace(&target),
        change.click(&[&Step { by: 1 }]).replace(&target),
        reset.click(&[]).replace(&target),
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _guard = LogConfig::from_env().init()?;

    // Redis when TESSERA_SESSION_URL is set, memory otherwise.
    let sessions = session::connect(SessionConfig::from_env()?).await?;
    let mut app = App::from_env()?.with_sessions(sessions);
    app.description("Tessera counter demo");

    let document = app.document();
    app.page("/", move |ctx: Context| {
        let document = document.clone();
        async move {
            let value = count(&ctx).await;
            let body = format!(
                r#"<main class="max-w-md mx-auto mt-16">{}</main>"#,
                counter(&ctx, value)
            );
            document.render("Counter", &body)
        }
    });

    info!(addr = %app.config().addr, "Counter demo");
    app.listen().await?;
    Ok(())
}
