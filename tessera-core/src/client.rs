//! Client runtime and document shell.
//!
//! The runtime is a small script shipped once per document in its head.
//! It defines the entry points invocation expressions call:
//!
//! - `__post(event, swap, targetId, path, values)`
//! - `__submit(event, swap, targetId, path, values)`
//! - `__load(href)`
//!
//! Responses are applied in two steps: the swap first (`inline` replaces the
//! target's content, `outline` the target itself, anything else or a missing
//! target leaves the document alone), then every script in the response is
//! re-executed. Out-of-band fragments trail the primary fragment, so they
//! always see the swapped document.
//!
//! This order is the reverse of runtimes that execute response scripts
//! before swapping: a script here may look up elements the fragment just
//! inserted, but cannot act on the document as it was before the swap.

use crate::action::trim;
use crate::config::{AppConfig, RuntimeConfig};

/// Id of the `<body>` element, the target of whole-page renders.
pub const CONTENT_ID: &str = "__content__";

/// Id of the loading overlay.
pub const LOADER_ID: &str = "__loader__";

const STYLESHEET: &str = r#"<link rel="stylesheet" href="https://cdnjs.cloudflare.com/ajax/libs/tailwindcss/2.2.19/tailwind.min.css" integrity="sha512-wnea99uKIC3TJF7v4eKk4Y+lMz2Mklv18+r4na2Gn1abDRPPOeef95xTzdwGD9e6zXJBteMIhZ1+68QC5byJZw==" crossorigin="anonymous" referrerpolicy="no-referrer" />"#;

const STYLE: &str = r#"<style>
    html {
        scroll-behavior: smooth;
    }
    .invalid, select:invalid, textarea:invalid, input:invalid {
        border-bottom-width: 2px;
        border-bottom-color: red;
        border-bottom-style: dashed;
    }
</style>"#;

const RUNTIME: &str = r#"
    function __loading() {
        const state = { loader: null };
        state.timer = setTimeout(() => {
            const loader = document.createElement("div");
            loader.id = "__LOADER_ID__";
            loader.classList = __LOADER_CLASS__;
            loader.innerHTML = __LOADER_TEXT__;
            document.body.appendChild(loader);
            state.loader = loader;
        }, __LOADER_DELAY__);
        return state;
    }

    function __loaded(state) {
        clearTimeout(state.timer);
        if (state.loader) {
            state.loader.remove();
        }
    }

    function __scripts(doc) {
        const scripts = [...doc.body.querySelectorAll("script"), ...doc.head.querySelectorAll("script")];
        for (let i = 0; i < scripts.length; i++) {
            const script = document.createElement("script");
            script.textContent = scripts[i].textContent;
            document.body.appendChild(script);
        }
    }

    function __swap(html, swap, target_id) {
        const doc = new DOMParser().parseFromString(html, "text/html");
        const el = target_id ? document.getElementById(target_id) : null;
        if (el != null) {
            if (swap === "inline") {
                el.innerHTML = html;
            } else if (swap === "outline") {
                el.outerHTML = html;
            }
        }
        __scripts(doc);
    }

    function __merge(body, name, type, value) {
        const merged = body.filter(item => item.name !== name);
        merged.push({ name, type, value });
        return merged;
    }

    function __send(path, body, swap, target_id) {
        const state = __loading();
        return fetch(path, { method: "POST", body: JSON.stringify(body) })
            .then(response => response.text())
            .then(html => __swap(html, swap, target_id))
            .finally(() => __loaded(state));
    }

    function __post(event, swap, target_id, path, values) {
        const el = event.target;
        const name = el.getAttribute("name");
        let body = values;
        if (name != null) {
            body = __merge(body, name, el.getAttribute("type"), el.value);
        }
        return __send(path, body, swap, target_id);
    }

    function __submit(event, swap, target_id, path, values) {
        event.preventDefault();
        const el = event.target;
        const form = el.tagName.toLowerCase() === "form" ? el : el.closest("form");
        let body = values;
        if (form != null) {
            const id = form.getAttribute("id");
            let found = id ? Array.from(document.querySelectorAll('[form="' + id + '"][name]')) : [];
            if (found.length === 0) {
                found = Array.from(form.querySelectorAll("[name]"));
            }
            found.forEach(item => {
                const type = item.getAttribute("type");
                const value = type === "checkbox" ? String(item.checked) : item.value;
                body = __merge(body, item.getAttribute("name"), type, value);
            });
        }
        return __send(path, body, swap, target_id);
    }

    function __load(href) {
        if (window.event) {
            window.event.preventDefault();
        }
        const state = __loading();
        return fetch(href, { method: "GET" })
            .then(response => response.text())
            .then(html => {
                const doc = new DOMParser().parseFromString(html, "text/html");
                document.title = doc.title;
                document.body.innerHTML = doc.body.innerHTML;
                __scripts(doc);
                window.history.pushState({}, doc.title, href);
            })
            .finally(() => __loaded(state));
    }
"#;

/// The runtime script, with loader presentation from `config`.
pub fn runtime_script(config: &RuntimeConfig) -> String {
    let script = RUNTIME
        .replace("__LOADER_ID__", LOADER_ID)
        .replace("__LOADER_CLASS__", &js_string(&config.loader_class))
        .replace("__LOADER_TEXT__", &js_string(&config.loader_text))
        .replace("__LOADER_DELAY__", &config.loader_delay.as_millis().to_string());

    format!("<script>{}</script>", trim(&script).trim())
}

/// A JavaScript string literal that cannot close the surrounding script.
pub fn js_string(text: &str) -> String {
    serde_json::Value::from(text)
        .to_string()
        .replace("</", r"<\/")
}

/// Escape text for element content and quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Full HTML document around rendered content.
#[derive(Debug, Clone)]
pub struct Document {
    language: String,
    class: String,
    head: Vec<String>,
}

impl Document {
    /// Head entries: charset, viewport, base styles and the runtime.
    pub fn new(config: &AppConfig) -> Self {
        Self {
            language: config.language.clone(),
            class: "bg-gray-200 h-full".to_string(),
            head: vec![
                r#"<meta charset="UTF-8">"#.to_string(),
                r#"<meta name="viewport" content="width=device-width, initial-scale=1.0">"#
                    .to_string(),
                STYLE.to_string(),
                STYLESHEET.to_string(),
                runtime_script(&config.runtime),
            ],
        }
    }

    /// `<meta name="description">`.
    pub fn description(&mut self, description: &str) {
        self.head.push(format!(
            r#"<meta name="description" content="{}">"#,
            escape_html(description)
        ));
    }

    /// Append a raw head entry.
    pub fn head(&mut self, entry: impl Into<String>) {
        self.head.push(entry.into());
    }

    /// Classes of the `<html>` element.
    pub fn class(&mut self, class: impl Into<String>) {
        self.class = class.into();
    }

    pub fn render(&self, title: &str, body: &str) -> String {
        trim(&format!(
            r#"<!DOCTYPE html><html lang="{lang}" class="{class}"><head><title>{title}</title> {head}</head><body id="{CONTENT_ID}" class="relative">{body}</body></html>"#,
            lang = escape_html(&self.language),
            class = escape_html(&self.class),
            title = escape_html(title),
            head = self.head.join(" "),
        ))
    }
}
