/// Login form demo
///
/// A form submitted with the FORM verb: every named input of the form is
/// sent, overriding the values bound at render time. Failed logins re-render
/// the form with an error banner; success redirects to a page that reads the
/// user back from the session.
///
/// Run with `cargo run --example login` and open http://127.0.0.1:1422
/// (or the port in `TESSERA_PORT`).
use serde::{Deserialize, Serialize};
use tessera::logging::{LogConfig, info, warn};
use tessera::prelude::*;

#[derive(Debug, Default, Clone, Field)]
struct Credentials {
    #[field(rename = "Email")]
    email: String,
    #[field(rename = "Password")]
    password: String,
    #[field(rename = "Remember")]
    remember: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct User {
    email: String,
}

fn form(ctx: &Context, target: &Target, credentials: &Credentials, error: Option<&str>) -> String {
    let login = ctx.action("login/submit", submit);
    let banner = error
        .map(|e| format!(r#"<p class="p-2 mb-4 bg-red-100 text-red-800 rounded">{e}</p>"#))
        .unwrap_or_default();

    // The password is never bound back into the page.
    let bound = Credentials {
        password: String::new(),
        ..credentials.clone()
    };

    format!(
        r#"<form {} class="flex flex-col gap-3 p-6 bg-white rounded" {}>
            {banner}
            <input name="Email" type="email" value="{}" required>
            <input name="Password" type="password" required>
            <label><input name="Remember" type="checkbox" {}> Remember me</label>
            <button type="submit" class="px-3 py-2 bg-blue-700 text-white rounded">Sign in</button>
        </form>"#,
        target.attr(),
        login.submit(&[&bound]).replace(target),
        tessera::client::escape_html(&credentials.email),
        if credentials.remember { "checked" } else { "" },
    )
}

async fn submit(ctx: Context) -> String {
    let target = Target::new();
    let mut credentials = Credentials::default();

    if let Err(err) = ctx.body(&mut credentials) {
        warn!(error = %err, "Unreadable login form");
        return form(&ctx, &target, &credentials, Some("Could not read the form, try again."));
    }

    if credentials.password != "tessera" {
        info!(email = %credentials.email, ip = ?ctx.ip(), "Rejected login");
        return form(&ctx, &target, &credentials, Some("Wrong email or password."));
    }

    let user = User {
        email: credentials.email.clone(),
    };
    if let Err(err) = ctx.session().save("user", &user).await {
        ctx.error(&err.to_string());
        return form(&ctx, &target, &credentials, None);
    }

    ctx.redirect("/welcome");
    String::new()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _guard = LogConfig::from_env().init()?;

    let app = App::from_env()?;

    let document = app.document();
    app.page("/", move |ctx: Context| {
        let document = document.clone();
        async move {
            let body = format!(
                r#"<main class="max-w-sm mx-auto mt-16">{}</main>"#,
                form(&ctx, &Target::new(), &Credentials::default(), None)
            );
            document.render("Sign in", &body)
        }
    });

    let document = app.document();
    app.page("/welcome", move |ctx: Context| {
        let document = document.clone();
        async move {
            let mut user = User::default();
            let body = match ctx.session().load("user", &mut user).await {
                Ok(true) => format!(
                    r#"<main class="p-8">Welcome, {}. <a href="/" {}>Sign out</a></main>"#,
                    tessera::client::escape_html(&user.email),
                    tessera::load("/"),
                ),
                _ => format!(r#"<main class="p-8"><a href="/" {}>Sign in</a></main>"#, tessera::load("/")),
            };
            document.render("Welcome", &body)
        }
    });

    info!(addr = %app.config().addr, "Login demo");
    app.listen().await?;
    Ok(())
}
