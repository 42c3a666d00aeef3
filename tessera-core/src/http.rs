// HTTP request and response types

use crate::HttpStatus;
use std::collections::HashMap;
use std::net::SocketAddr;

/// HTTP request wrapper
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    /// Set when the transport failed while the body was being collected.
    /// Handlers see it from [`Context::body`](crate::Context::body).
    pub body_error: Option<String>,
    pub query_params: HashMap<String, String>,
    pub remote_addr: Option<SocketAddr>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        let raw: String = path.into();
        let (path, query_params) = match raw.split_once('?') {
            Some((path, query)) => (path.to_string(), parse_query_string(query)),
            None => (raw, HashMap::new()),
        };

        Self {
            method: method.into(),
            path,
            headers: HashMap::new(),
            body: Vec::new(),
            body_error: None,
            query_params,
            remote_addr: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Get a header by name, ignoring ASCII case
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Get a cookie value from the `Cookie` header
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.header("Cookie")?.split(';').find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then_some(value)
        })
    }

    /// Get a query parameter by name
    pub fn query(&self, name: &str) -> Option<&String> {
        self.query_params.get(name)
    }
}

/// HTTP response wrapper
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(HttpStatus::Ok.code())
    }

    pub fn not_found() -> Self {
        Self::new(HttpStatus::NotFound.code()).with_text("Not found")
    }

    pub fn method_not_allowed() -> Self {
        Self::new(HttpStatus::MethodNotAllowed.code())
            .with_header("Allow", "GET, POST")
            .with_text("Method not allowed")
    }

    /// HTML fragment or document response
    pub fn html(body: impl Into<String>) -> Self {
        Self::ok()
            .with_header("Content-Type", "text/html; charset=utf-8")
            .with_body(body.into().into_bytes())
    }

    pub fn with_text(self, text: &str) -> Self {
        self.with_header("Content-Type", "text/plain; charset=utf-8")
            .with_body(text.as_bytes().to_vec())
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Parse a query string into a map of parameters
fn parse_query_string(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (part.to_string(), String::new()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_splits_query() {
        let req = HttpRequest::new("GET", "/users?page=2&flag");
        assert_eq!(req.path, "/users");
        assert_eq!(req.query("page"), Some(&"2".to_string()));
        assert_eq!(req.query("flag"), Some(&String::new()));
    }

    #[test]
    fn test_cookie_lookup() {
        let req = HttpRequest::new("POST", "/")
            .with_header("cookie", "theme=dark; session_id=abc123; other=x");
        assert_eq!(req.cookie("session_id"), Some("abc123"));
        assert_eq!(req.cookie("theme"), Some("dark"));
        assert_eq!(req.cookie("missing"), None);
    }

    #[test]
    fn test_cookie_without_header() {
        let req = HttpRequest::new("GET", "/");
        assert_eq!(req.cookie("session_id"), None);
    }

    #[test]
    fn test_html_response() {
        let res = HttpResponse::html("<p>hi</p>");
        assert_eq!(res.status, 200);
        assert_eq!(
            res.headers.get("Content-Type"),
            Some(&"text/html; charset=utf-8".to_string())
        );
        assert_eq!(res.body_string(), "<p>hi</p>");
    }

    #[test]
    fn test_not_found_response() {
        let res = HttpResponse::not_found();
        assert_eq!(res.status, 404);
        assert_eq!(res.body_string(), "Not found");
    }
}
