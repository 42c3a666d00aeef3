// Error types for the Tessera runtime

use crate::HttpStatus;
use thiserror::Error;

/// Errors surfaced to handlers and to the server loop.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read request body: {0}")]
    BodyRead(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Session error: {0}")]
    Session(#[from] tessera_session::SessionError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        self.http_status().code()
    }

    /// Get the HttpStatus enum for this error
    pub fn http_status(&self) -> HttpStatus {
        match self {
            Error::BodyRead(_) | Error::Deserialization(_) => HttpStatus::BadRequest,
            _ => HttpStatus::InternalServerError,
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.http_status().is_client_error()
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.http_status().is_server_error()
    }
}

/// Programmer defects detected while binding handlers to routes.
///
/// None of these are transient: the fail-fast registration entry points
/// turn them into a panic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("route {route} is claimed by both '{existing}' and '{incoming}'")]
    RouteCollision {
        route: String,
        existing: String,
        incoming: String,
    },

    #[error("handler '{0}' was never registered")]
    Unregistered(String),

    #[error("handler name or path must not be empty")]
    EmptyName,
}

/// Why a single body item could not be applied.
///
/// These never abort a decode; they are logged and the item is skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed path segment '{0}'")]
    MalformedSegment(String),

    #[error("no field '{0}'")]
    UnknownField(String),

    #[error("'{0}' is not a sequence")]
    NotASequence(String),

    #[error("field is not a value")]
    NotAssignable,

    #[error("cannot parse '{value}' as {expected}")]
    Unparseable { value: String, expected: &'static str },

    #[error("{tag} value does not fit the field")]
    Incompatible { tag: &'static str },

    #[error("sequences may grow by at most {0} elements per body")]
    GrowthLimit(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(Error::BodyRead("reset".into()).status_code(), 400);
        assert_eq!(Error::Deserialization("eof".into()).status_code(), 400);
        assert_eq!(Error::Config("port".into()).status_code(), 500);
        assert!(Error::BodyRead("reset".into()).is_client_error());
        assert!(Error::Config("port".into()).is_server_error());
    }

    #[test]
    fn test_collision_message_names_both_handlers() {
        let err = RegistryError::RouteCollision {
            route: "/pkg-show".into(),
            existing: "pkg.Show".into(),
            incoming: "pkg/Show".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("pkg.Show"));
        assert!(msg.contains("pkg/Show"));
        assert!(msg.contains("/pkg-show"));
    }
}
