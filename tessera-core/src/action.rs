//! Action descriptors and their wire encoding.
//!
//! Render code turns an [`Action`] into a client invocation expression and
//! embeds it in an event attribute:
//!
//! ```ignore
//! let target = Target::new();
//! let button = format!(
//!     r#"<button {}>+1</button>"#,
//!     increment.click(&[&counter]).replace(&target),
//! );
//! ```
//!
//! The expression calls one of the client runtime entry points with the
//! swap mode, the target id, the route and the bound values flattened to
//! body items.

use crate::client::js_string;
use crate::codec::{self, BodyItem, Field};
use crate::registry::{Action, Route};
use rand::Rng;
use rand::distr::Alphanumeric;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Length of the random part of a target id.
pub const TARGET_ID_LENGTH: usize = 15;

static NEWLINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\t\n]+").expect("valid regex"));
static WIDE_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{4,}").expect("valid regex"));

/// How the returned fragment is applied to the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Swap {
    /// Replace the target's inner content.
    Render,
    /// Replace the target element itself.
    Replace,
    /// Leave the document alone; returned scripts still run.
    None,
}

impl Swap {
    /// Name the client runtime understands.
    pub fn as_str(&self) -> &'static str {
        match self {
            Swap::Render => "inline",
            Swap::Replace => "outline",
            Swap::None => "none",
        }
    }
}

impl fmt::Display for Swap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which client entry point collects the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// Bound values plus the triggering element.
    Post,
    /// Bound values overridden by every named field of the enclosing form.
    Form,
}

impl Verb {
    pub fn function(&self) -> &'static str {
        match self {
            Verb::Post => "__post",
            Verb::Form => "__submit",
        }
    }
}

/// A DOM anchor for swaps.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target(String);

impl Target {
    /// A fresh, random id.
    pub fn new() -> Self {
        Self(format!("i{}", random_token(TARGET_ID_LENGTH)))
    }

    /// Wrap an id that already exists in the document.
    pub fn from_id(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }

    /// `id="…"` attribute for the anchored element.
    pub fn attr(&self) -> String {
        format!(r#"id="{}""#, self.0)
    }
}

impl Default for Target {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An action bound to its values, waiting for a swap mode and target.
#[derive(Debug, Clone)]
pub struct Invocation {
    route: Route,
    verb: Verb,
    values: Vec<BodyItem>,
    attribute: Option<&'static str>,
}

impl Invocation {
    pub fn new(action: &Action, verb: Verb, values: &[&dyn Field]) -> Self {
        let mut items = Vec::new();
        for value in values {
            value.encode("", &mut items);
        }

        Self {
            route: action.route().clone(),
            verb,
            values: items,
            attribute: None,
        }
    }

    /// Wrap the expression in an event attribute, e.g. `onclick`.
    pub fn on(mut self, attribute: &'static str) -> Self {
        self.attribute = Some(attribute);
        self
    }

    /// Bind one more value.
    pub fn with(mut self, value: &dyn Field) -> Self {
        self.values.extend(codec::encode(value));
        self
    }

    /// Replace the inner content of `target` with the result.
    pub fn render(&self, target: &Target) -> String {
        self.encode(Swap::Render, Some(target))
    }

    /// Replace `target` itself with the result.
    pub fn replace(&self, target: &Target) -> String {
        self.encode(Swap::Replace, Some(target))
    }

    /// Fire and forget.
    pub fn none(&self) -> String {
        self.encode(Swap::None, None)
    }

    pub fn values(&self) -> &[BodyItem] {
        &self.values
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }

    pub fn encode(&self, swap: Swap, target: Option<&Target>) -> String {
        let values = serde_json::to_string(&self.values).unwrap_or_else(|_| "[]".to_string());
        let expression = normalize(&format!(
            r#"{}(event, "{}", "{}", "{}", {}) "#,
            self.verb.function(),
            swap,
            target.map(Target::id).unwrap_or_default(),
            self.route,
            values,
        ));

        match self.attribute {
            Some(attribute) => format!(r#"{attribute}="{expression}""#),
            None => expression,
        }
    }
}

impl Action {
    /// POST invocation expression.
    pub fn call(&self, values: &[&dyn Field]) -> Invocation {
        Invocation::new(self, Verb::Post, values)
    }

    /// FORM invocation expression.
    pub fn send(&self, values: &[&dyn Field]) -> Invocation {
        Invocation::new(self, Verb::Form, values)
    }

    /// POST invocation as an `onclick` attribute.
    pub fn click(&self, values: &[&dyn Field]) -> Invocation {
        self.call(values).on("onclick")
    }

    /// FORM invocation as an `onsubmit` attribute.
    pub fn submit(&self, values: &[&dyn Field]) -> Invocation {
        self.send(values).on("onsubmit")
    }
}

/// Client-side navigation to `href`, as an `onclick` attribute.
pub fn load(href: &str) -> String {
    format!(r#"onclick="{}""#, normalize(&format!("__load({})", js_string(href))))
}

/// Make text safe inside a double-quoted attribute and flatten it to one
/// line.
pub fn normalize(text: &str) -> String {
    trim(&text.replace('&', "&amp;").replace('"', "&quot;"))
}

/// Strip tabs and newlines and collapse long whitespace runs.
pub fn trim(text: &str) -> String {
    let flat = NEWLINES.replace_all(text, "");
    WIDE_SPACE.replace_all(&flat, " ").into_owned()
}

pub(crate) fn random_token(length: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Context, Field, Registry};
    use std::collections::HashSet;

    #[derive(Debug, Default, Field)]
    struct Counter {
        #[field(rename = "Count")]
        count: i64,
        #[field(rename = "Label")]
        label: String,
    }

    async fn increment(_ctx: Context) -> String {
        String::new()
    }

    fn action() -> Action {
        Registry::new().action("counter.increment", increment)
    }

    #[test]
    fn test_post_expression() {
        let counter = Counter {
            count: 3,
            label: "a".into(),
        };
        let target = Target::from_id("iabc");
        let expression = action().call(&[&counter]).render(&target);

        assert_eq!(
            expression,
            "__post(event, &quot;inline&quot;, &quot;iabc&quot;, &quot;/counter.increment&quot;, \
             [{&quot;name&quot;:&quot;Count&quot;,&quot;type&quot;:&quot;int&quot;,&quot;value&quot;:&quot;3&quot;},\
             {&quot;name&quot;:&quot;Label&quot;,&quot;type&quot;:&quot;string&quot;,&quot;value&quot;:&quot;a&quot;}]) "
        );
    }

    #[test]
    fn test_form_expression_without_values() {
        let target = Target::from_id("t1");
        let expression = action().send(&[]).replace(&target);

        assert!(expression.starts_with("__submit(event, &quot;outline&quot;, &quot;t1&quot;"));
        assert!(expression.ends_with(", []) "));
    }

    #[test]
    fn test_none_carries_no_target() {
        let expression = action().call(&[]).none();
        assert!(expression.contains("&quot;none&quot;, &quot;&quot;,"));
    }

    #[test]
    fn test_click_and_submit_attributes() {
        let target = Target::from_id("t1");
        let click = action().click(&[]).render(&target);
        let submit = action().submit(&[]).render(&target);

        assert!(click.starts_with(r#"onclick="__post(event, "#));
        assert!(submit.starts_with(r#"onsubmit="__submit(event, "#));
        assert!(click.ends_with(r#") ""#));
    }

    #[test]
    fn test_bound_text_is_attribute_safe() {
        let counter = Counter {
            count: 0,
            label: "say \"hi\" & <b>\n\tbye".into(),
        };
        let expression = action().call(&[&counter]).none();

        assert!(!expression.contains('"'));
        assert!(!expression.contains('\n'));
        assert!(!expression.contains('\t'));
        assert!(expression.contains("&amp;"));
    }

    #[test]
    fn test_with_appends_values() {
        let first = Counter::default();
        let second = Counter {
            count: 2,
            label: String::new(),
        };
        let invocation = action().call(&[&first]).with(&second);
        assert_eq!(invocation.values().len(), 4);
        assert_eq!(invocation.values()[2].value, "2");
    }

    #[test]
    fn test_trim_collapses_whitespace() {
        assert_eq!(trim("a\n\tb        c  d"), "ab c  d");
    }

    #[test]
    fn test_load_expression() {
        assert_eq!(load("/about"), r#"onclick="__load(&quot;/about&quot;)""#);
    }

    #[test]
    fn test_load_quote_stays_inside_literal() {
        let attribute = load(r#"/search?q=a"b"#);
        assert_eq!(
            attribute,
            r#"onclick="__load(&quot;/search?q=a\&quot;b&quot;)""#
        );

        // What the browser hands the script after attribute decoding.
        let script = attribute
            .trim_start_matches(r#"onclick=""#)
            .trim_end_matches('"')
            .replace("&quot;", "\"")
            .replace("&amp;", "&");
        assert_eq!(script, r#"__load("/search?q=a\"b")"#);
    }

    #[test]
    fn test_targets_are_unique() {
        let ids: HashSet<String> = (0..1000).map(|_| Target::new().id().to_string()).collect();
        assert_eq!(ids.len(), 1000);

        let target = Target::new();
        assert!(target.id().starts_with('i'));
        assert_eq!(target.id().len(), TARGET_ID_LENGTH + 1);
        assert!(target.id().chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_swap_names() {
        assert_eq!(Swap::Render.as_str(), "inline");
        assert_eq!(Swap::Replace.as_str(), "outline");
        assert_eq!(Swap::None.as_str(), "none");
    }
}
