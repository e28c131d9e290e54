//! Route compilation, matching and request dispatch for JSON API backends.
//!
//! Routes are declared per HTTP method as trees of groups with path
//! prefixes, compiled once into flat tables, and matched against request
//! paths with `{name}` placeholders captured as parameters.
//!
//! # Features
//!
//! - Path normalization and prefix joining for nested route groups
//! - Route patterns with validated `{name}` placeholders
//! - Exact-match fast path, then first-declared dynamic pattern wins
//! - JSON route configuration with fail-fast validation
//! - An async HTTP/1.x server that dispatches to registered handlers and
//!   answers with a JSON `{"status", "message", "data"}` envelope
//!
//! # Examples
//!
//! ## Compiling and matching
//!
//! ```
//! use stonescript_router::routing::{compile, match_route, RouteGroup};
//!
//! let tree = RouteGroup::new()
//!     .route("/", "HomeRoute")
//!     .group(
//!         RouteGroup::with_prefix("/admin")
//!             .group(RouteGroup::with_prefix("/settings").route("/general", "GeneralSettingsRoute")),
//!     )
//!     .route("/user/{userId}/post/{postId}", "PostRoute");
//!
//! let table = compile(&tree, "").unwrap();
//! assert!(table.contains("/admin/settings/general"));
//!
//! let matched = match_route(&table, "/user/456/post/789");
//! assert_eq!(matched.handler.map(|h| h.as_str()), Some("PostRoute"));
//! assert_eq!(matched.params.get("postId"), Some("789"));
//! ```
//!
//! ## Serving routes from configuration
//!
//! ```no_run
//! use serde_json::json;
//! use stonescript_router::{ApiResponse, HttpServer, RouteConfig, Router, ServerConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RouteConfig::from_json_str(r#"{ "GET": { "/user/{id}": "UserRoute" } }"#)?;
//! let server = HttpServer::new(ServerConfig::from_env()?, Router::from_config(&config)?);
//!
//! server.register_handler("UserRoute", |req| async move {
//!     Ok(ApiResponse::ok(json!({ "userId": req.param("id") }), "User retrieved"))
//! }).await;
//!
//! server.start().await?;
//! # Ok(())
//! # }
//! ```

pub mod parser;

pub mod routing;

pub mod server;

// Re-export commonly used items for convenience
pub use parser::{Error as ParserError, HttpRequest, HttpVersion, Method, parse_request};
pub use routing::{
    compile, match_route, normalize, CompiledRouteTable, ConfigError, HandlerRef, MatchResult, PathParams,
    RouteConfig, RouteGroup, Router,
};
pub use server::{
    ApiResponse, Dispatcher, Error as ServerError, HttpResponse, HttpServer, RouteRequest, ServerConfig, StatusCode,
};
