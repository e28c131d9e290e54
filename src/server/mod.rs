//! HTTP server and request dispatch.
//!
//! Each connection is read into an [`HttpRequest`](crate::parser::HttpRequest),
//! resolved against the compiled [`Router`](crate::routing::Router), handed to
//! the handler registered for the matched route, and answered with a JSON
//! [`ApiResponse`] envelope.

mod response;
mod config;
mod dispatcher;
mod error;
mod handler;
mod http_server;
mod tests;

// Re-export public items
pub use response::{ApiResponse, ApiStatus, HttpResponse, StatusCode};
pub use config::ServerConfig;
pub use dispatcher::Dispatcher;
pub use error::Error;
pub use handler::{HandlerFn, HandlerFuture, HandlerRegistry, RouteRequest};
pub use http_server::HttpServer;
