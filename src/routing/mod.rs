//! Route compilation and matching.
//!
//! Route trees (groups with prefixes, nested to any depth) are flattened once
//! at startup into one [`CompiledRouteTable`] per HTTP method. Matching a
//! request path tries an exact lookup first, then the dynamic `{name}`
//! patterns in declaration order.
//!
//! ```
//! use stonescript_router::routing::{compile, match_route, RouteGroup};
//!
//! let tree = RouteGroup::new()
//!     .route("/", "HomeRoute")
//!     .group(RouteGroup::with_prefix("/api/v1").route("/user/{id}", "UserRoute"));
//!
//! let table = compile(&tree, "").unwrap();
//! let matched = match_route(&table, "/api/v1/user/42");
//! assert_eq!(matched.handler.map(|h| h.as_str()), Some("UserRoute"));
//! assert_eq!(matched.params.get("id"), Some("42"));
//! ```

mod compiler;
mod error;
mod group;
mod matcher;
mod params;
mod path;
mod pattern;
mod router;
mod table;

pub use compiler::compile;
pub use error::ConfigError;
pub use group::{RouteGroup, RouteNode};
pub use matcher::{match_route, MatchResult};
pub use params::PathParams;
pub use path::{join_paths, normalize};
pub use pattern::RoutePattern;
pub use router::{RouteConfig, Router};
pub use table::{CompiledRouteTable, HandlerRef, TableEntry};
