//! Per-method route configuration and the compiled router.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::str::FromStr;

use log::{debug, info};
use serde_json::Value;

use crate::parser::Method;
use crate::routing::compiler::compile;
use crate::routing::error::ConfigError;
use crate::routing::group::RouteGroup;
use crate::routing::matcher::{match_route, MatchResult};
use crate::routing::table::{CompiledRouteTable, HandlerRef};

/// Route trees keyed by HTTP method, as loaded from configuration.
///
/// ```json
/// {
///     "GET":  { "/": "HomeRoute", "/user/{id}": "UserRoute" },
///     "POST": [ { "prefix": "/auth", "routes": { "/google-signin": "GoogleSigninRoute" } } ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteConfig {
    pub methods: BTreeMap<Method, RouteGroup>,
}

impl RouteConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the route tree for one method.
    pub fn method(mut self, method: Method, tree: RouteGroup) -> Self {
        self.methods.insert(method, tree);
        self
    }

    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let object = value
            .as_object()
            .ok_or_else(|| ConfigError::malformed("$", "expected an object keyed by HTTP method"))?;

        let mut config = RouteConfig::new();
        for (key, tree) in object {
            let method = Method::from_str(key).map_err(|_| ConfigError::UnknownMethod(key.clone()))?;
            let group = RouteGroup::from_value_at(tree, &format!("$.{key}"))?;
            config.methods.insert(method, group);
        }
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("loading route configuration from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}

/// Compiled route tables for every configured method.
///
/// Built once and shared read-only between connections.
#[derive(Debug, Clone, Default)]
pub struct Router {
    tables: BTreeMap<Method, CompiledRouteTable>,
}

impl Router {
    /// Compile every method's tree, failing on the first invalid route.
    pub fn from_config(config: &RouteConfig) -> Result<Self, ConfigError> {
        let mut tables = BTreeMap::new();
        for (method, tree) in &config.methods {
            let table = compile(tree, "")?;
            info!("compiled {count} {method} routes", count = table.len());
            tables.insert(*method, table);
        }
        Ok(Self { tables })
    }

    /// Resolve a normalized request path for a method.
    pub fn resolve(&self, method: Method, path: &str) -> MatchResult<'_> {
        match self.tables.get(&method) {
            Some(table) => match_route(table, path),
            None => MatchResult::not_found(),
        }
    }

    /// Methods whose table has a route for `path`.
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        self.tables
            .iter()
            .filter(|(_, table)| match_route(table, path).is_match())
            .map(|(method, _)| *method)
            .collect()
    }

    pub fn table(&self, method: Method) -> Option<&CompiledRouteTable> {
        self.tables.get(&method)
    }

    /// Methods that have a route table.
    pub fn methods(&self) -> impl Iterator<Item = Method> + '_ {
        self.tables.keys().copied()
    }

    /// Every handler named by any route, without duplicates.
    pub fn handler_refs(&self) -> BTreeSet<&HandlerRef> {
        self.tables
            .values()
            .flat_map(|table| table.iter().map(|entry| &entry.handler))
            .collect()
    }
}
