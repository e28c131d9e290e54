//! Errors raised while loading or compiling route configuration.

use thiserror::Error;

/// A route configuration problem. All of these are detected before the
/// server accepts its first request.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A `{name}` placeholder uses characters outside `[A-Za-z0-9_]`.
    #[error("invalid placeholder `{{{name}}}` in route pattern {pattern}")]
    InvalidPlaceholder { pattern: String, name: String },

    /// The same placeholder name appears twice in one pattern.
    #[error("duplicate placeholder `{{{name}}}` in route pattern {pattern}")]
    DuplicatePlaceholder { pattern: String, name: String },

    /// A `{` without its closing `}`, a nested `{`, or a stray `}`.
    #[error("unbalanced brace at byte {position} in route pattern {pattern}")]
    UnbalancedBrace { pattern: String, position: usize },

    /// An entry in the route tree that is neither a route nor a group.
    #[error("malformed route entry at {location}: {reason}")]
    MalformedEntry { location: String, reason: String },

    /// A top-level key that is not an HTTP method.
    #[error("unknown HTTP method `{0}` in route configuration")]
    UnknownMethod(String),

    /// The generated matching expression was rejected by the regex engine.
    #[error("route pattern {pattern} produced an invalid expression: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The route configuration file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The route configuration is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConfigError {
    pub(crate) fn malformed(location: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::MalformedEntry {
            location: location.into(),
            reason: reason.into(),
        }
    }
}
