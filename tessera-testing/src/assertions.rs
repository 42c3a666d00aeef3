// Test assertions for dispatched responses

use crate::TestResponse;
use tessera_core::HttpStatus;

/// Assert that a response has a specific status code
pub fn assert_status(response: &TestResponse, expected: u16) {
    let actual = response.status();
    assert_eq!(
        actual, expected,
        "Expected status {}, got {}",
        expected, actual
    );
}

/// Assert that a response has a specific HTTP status
pub fn assert_http_status(response: &TestResponse, expected: HttpStatus) {
    assert_status(response, expected.code());
}

/// Assert that a response has a specific header
pub fn assert_header(response: &TestResponse, key: &str, expected: &str) {
    let actual = response.header(key).map(|s| s.as_str());
    assert_eq!(
        actual,
        Some(expected),
        "Expected header '{}' to be '{}', got {:?}",
        key,
        expected,
        actual
    );
}

/// Assert that a response body contains a string
pub fn assert_body_contains(response: &TestResponse, expected: &str) {
    let body = response.body_string();
    assert!(
        body.contains(expected),
        "Expected body to contain '{}', but it didn't. Body: {}",
        expected,
        body
    );
}

/// Assert that the primary fragment, before any out-of-band script, is
/// exactly `expected`
pub fn assert_fragment(response: &TestResponse, expected: &str) {
    let fragment = response.fragment();
    assert_eq!(
        fragment, expected,
        "Expected fragment '{}', got '{}'",
        expected, fragment
    );
}

/// Assert that the response queued exactly `expected` out-of-band scripts
pub fn assert_script_count(response: &TestResponse, expected: usize) {
    let scripts = response.scripts();
    assert_eq!(
        scripts.len(),
        expected,
        "Expected {} scripts, got {:?}",
        expected,
        scripts
    );
}

/// Assert that the response minted a session cookie
pub fn assert_new_session(response: &TestResponse) {
    assert!(
        response.header("Set-Cookie").is_some(),
        "Expected a Set-Cookie header, got none"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::HttpResponse;

    fn response() -> TestResponse {
        TestResponse::new(HttpResponse::html(
            "<p>hi</p><script>a()</script><script>b()</script>",
        ))
    }

    #[test]
    fn test_assert_status() {
        assert_status(&response(), 200);
        assert_http_status(&response(), HttpStatus::Ok);
    }

    #[test]
    #[should_panic(expected = "Expected status 404")]
    fn test_assert_status_mismatch() {
        assert_status(&response(), 404);
    }

    #[test]
    fn test_assert_header() {
        assert_header(&response(), "content-type", "text/html; charset=utf-8");
    }

    #[test]
    fn test_fragment_and_scripts() {
        let response = response();
        assert_fragment(&response, "<p>hi</p>");
        assert_script_count(&response, 2);
        assert_body_contains(&response, "b()");
    }

    #[test]
    #[should_panic(expected = "Set-Cookie")]
    fn test_assert_new_session_without_cookie() {
        assert_new_session(&response());
    }
}
