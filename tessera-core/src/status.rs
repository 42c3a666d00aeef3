// HTTP status codes produced by the dispatcher

/// Status codes the dispatcher and handlers answer with.
///
/// Handlers always produce HTML, so the set is small: success, the client
/// errors the dispatcher can detect on its own, and a catch-all server error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpStatus {
    Ok = 200,
    BadRequest = 400,
    NotFound = 404,
    MethodNotAllowed = 405,
    InternalServerError = 500,
}

impl HttpStatus {
    /// Get the numeric status code
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the canonical reason phrase
    pub fn reason(&self) -> &'static str {
        match self {
            HttpStatus::Ok => "OK",
            HttpStatus::BadRequest => "Bad Request",
            HttpStatus::NotFound => "Not Found",
            HttpStatus::MethodNotAllowed => "Method Not Allowed",
            HttpStatus::InternalServerError => "Internal Server Error",
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code())
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.code())
    }

    pub fn is_server_error(&self) -> bool {
        self.code() >= 500
    }

    /// Look up a known status by its numeric code
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            200 => Some(HttpStatus::Ok),
            400 => Some(HttpStatus::BadRequest),
            404 => Some(HttpStatus::NotFound),
            405 => Some(HttpStatus::MethodNotAllowed),
            500 => Some(HttpStatus::InternalServerError),
            _ => None,
        }
    }
}

impl std::fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}

impl From<HttpStatus> for u16 {
    fn from(status: HttpStatus) -> Self {
        status.code()
    }
}
