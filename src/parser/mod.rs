//! HTTP request parsing.
//!
//! Turns the raw bytes read from a connection into an [`HttpRequest`]: the
//! request line, headers, the path split from its query string, and the body.

mod request;
mod method;
mod version;
mod error;

// Re-export public items
pub use request::HttpRequest;
pub use method::Method;
pub use version::HttpVersion;
pub use error::Error;

pub use request::{frame_request, parse_request, RequestFrame};
