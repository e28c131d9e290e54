//! Error types for the HTTP server.

use thiserror::Error;

use crate::parser::{Error as ParserError, Method};
use crate::routing::{ConfigError, HandlerRef};
use crate::server::response::StatusCode;

/// Errors that can occur while serving a request.
#[derive(Debug, Error)]
pub enum Error {
    /// Error parsing an HTTP request.
    #[error("Parse error: {0}")]
    ParseError(#[from] ParserError),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// No route matches the request path.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The path is routed, but only for other methods.
    #[error("Method {method} not allowed for path: {path}")]
    MethodNotAllowed {
        method: Method,
        path: String,
        allowed: Vec<Method>,
    },

    /// A route names a handler that was never registered.
    #[error("No handler registered for {0}")]
    HandlerNotRegistered(HandlerRef),

    /// The request body is not JSON where JSON is required.
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// The request input is missing, malformed, or does not fit the route.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The request is larger than the configured maximum.
    #[error("Request exceeds {0} bytes")]
    PayloadTooLarge(usize),

    /// Internal server error.
    #[error("Internal server error: {0}")]
    InternalError(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid route configuration.
    #[error("Route configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An environment variable holds a value of the wrong type.
    #[error("Invalid value {value:?} for environment variable {name}")]
    InvalidEnv { name: String, value: String },
}

impl Error {
    /// The status code this error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::ParseError(_) | Error::BadRequest(_) => StatusCode::BadRequest,
            Error::NotFound(_) | Error::HandlerNotRegistered(_) => StatusCode::NotFound,
            Error::MethodNotAllowed { .. } => StatusCode::MethodNotAllowed,
            Error::UnsupportedMediaType(_) => StatusCode::UnsupportedMediaType,
            Error::PayloadTooLarge(_) => StatusCode::PayloadTooLarge,
            _ => StatusCode::InternalServerError,
        }
    }
}
