//! Route group trees, built in code or loaded from JSON.
//!
//! A JSON tree mixes two kinds of objects:
//!
//! ```json
//! {
//!     "/": "HomeRoute",
//!     "api": {
//!         "prefix": "/api/v1",
//!         "routes": [
//!             { "/users": "UsersRoute", "/user/{id}": "UserRoute" },
//!             { "prefix": "/admin", "routes": { "/stats": "StatsRoute" } }
//!         ]
//!     }
//! }
//! ```
//!
//! An object with a `routes` member is a group. Any other object is a flat
//! mapping of pattern to handler name, whose members may themselves be groups
//! (the member key is then only a label). `routes` holds a flat mapping or an
//! array of mappings and groups.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::routing::error::ConfigError;
use crate::routing::table::HandlerRef;

/// One entry of a route group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteNode {
    /// A pattern bound to a handler.
    Route { pattern: String, handler: HandlerRef },
    /// A nested group.
    Group(RouteGroup),
}

/// A common path prefix over a sequence of routes and nested groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteGroup {
    pub prefix: String,
    pub routes: Vec<RouteNode>,
}

impl RouteGroup {
    /// A group without a prefix.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            routes: Vec::new(),
        }
    }

    /// Append a route.
    pub fn route(mut self, pattern: impl Into<String>, handler: impl Into<HandlerRef>) -> Self {
        self.routes.push(RouteNode::Route {
            pattern: pattern.into(),
            handler: handler.into(),
        });
        self
    }

    /// Append a nested group.
    pub fn group(mut self, group: RouteGroup) -> Self {
        self.routes.push(RouteNode::Group(group));
        self
    }

    /// Whether any entry is a nested group.
    pub fn has_groups(&self) -> bool {
        self.routes
            .iter()
            .any(|node| matches!(node, RouteNode::Group(_)))
    }

    /// Build a tree from a JSON value. Every entry is checked; anything that
    /// is neither a route nor a group is reported with its location.
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        Self::from_value_at(value, "$")
    }

    pub(crate) fn from_value_at(value: &Value, location: &str) -> Result<Self, ConfigError> {
        match value {
            Value::Object(object) if object.contains_key("routes") => group_from_object(object, location),
            Value::Object(object) => {
                let mut group = RouteGroup::new();
                push_mapping(&mut group.routes, object, location)?;
                Ok(group)
            }
            Value::Array(items) => {
                let mut group = RouteGroup::new();
                push_sequence(&mut group.routes, items, location)?;
                Ok(group)
            }
            other => Err(ConfigError::malformed(
                location,
                format!("expected a route mapping or group, found {}", kind(other)),
            )),
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn is_group(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|object| object.contains_key("routes"))
}

fn group_from_object(object: &Map<String, Value>, location: &str) -> Result<RouteGroup, ConfigError> {
    let mut group = RouteGroup::new();

    for (key, value) in object {
        let here = format!("{location}.{key}");
        match key.as_str() {
            "prefix" => match value {
                Value::String(prefix) => group.prefix = prefix.clone(),
                Value::Null => {}
                other => {
                    return Err(ConfigError::malformed(
                        here,
                        format!("prefix must be a string, found {}", kind(other)),
                    ))
                }
            },
            "routes" => match value {
                Value::Object(mapping) => push_mapping(&mut group.routes, mapping, &here)?,
                Value::Array(items) => push_sequence(&mut group.routes, items, &here)?,
                other => {
                    return Err(ConfigError::malformed(
                        here,
                        format!("routes must be an object or an array, found {}", kind(other)),
                    ))
                }
            },
            _ => return Err(ConfigError::malformed(here, "unexpected key in route group")),
        }
    }

    Ok(group)
}

fn push_mapping(nodes: &mut Vec<RouteNode>, mapping: &Map<String, Value>, location: &str) -> Result<(), ConfigError> {
    for (pattern, value) in mapping {
        let here = format!("{location}.{pattern}");
        match value {
            Value::String(handler) => nodes.push(RouteNode::Route {
                pattern: pattern.clone(),
                handler: HandlerRef::new(handler),
            }),
            Value::Object(object) if object.contains_key("routes") => {
                nodes.push(RouteNode::Group(group_from_object(object, &here)?));
            }
            other => {
                return Err(ConfigError::malformed(
                    here,
                    format!("expected a handler name or a group, found {}", kind(other)),
                ))
            }
        }
    }
    Ok(())
}

fn push_sequence(nodes: &mut Vec<RouteNode>, items: &[Value], location: &str) -> Result<(), ConfigError> {
    for (i, item) in items.iter().enumerate() {
        let here = format!("{location}[{i}]");
        match item {
            Value::Object(object) if is_group(item) => {
                nodes.push(RouteNode::Group(group_from_object(object, &here)?));
            }
            Value::Object(mapping) => push_mapping(nodes, mapping, &here)?,
            other => {
                return Err(ConfigError::malformed(
                    here,
                    format!("expected a route mapping or group, found {}", kind(other)),
                ))
            }
        }
    }
    Ok(())
}

impl<'de> Deserialize<'de> for RouteGroup {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        RouteGroup::from_value(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_mapping() {
        let group = RouteGroup::from_value(&json!({
            "/": "HomeRoute",
            "/about": "AboutRoute"
        }))
        .unwrap();

        assert_eq!(group, RouteGroup::new().route("/", "HomeRoute").route("/about", "AboutRoute"));
        assert!(!group.has_groups());
    }

    #[test]
    fn test_mixed_sequence_keeps_order() {
        let group = RouteGroup::from_value(&json!([
            { "/": "HomeRoute" },
            { "prefix": "/api", "routes": { "/users": "UsersRoute" } },
            { "/contact": "ContactRoute" }
        ]))
        .unwrap();

        let expected = RouteGroup::new()
            .route("/", "HomeRoute")
            .group(RouteGroup::with_prefix("/api").route("/users", "UsersRoute"))
            .route("/contact", "ContactRoute");
        assert_eq!(group, expected);
        assert!(group.has_groups());
    }

    #[test]
    fn test_group_inside_mapping() {
        let group = RouteGroup::from_value(&json!({
            "/": "HomeRoute",
            "admin": { "prefix": "/admin", "routes": [ { "/dashboard": "DashboardRoute" } ] }
        }))
        .unwrap();

        let expected = RouteGroup::new()
            .route("/", "HomeRoute")
            .group(RouteGroup::with_prefix("/admin").route("/dashboard", "DashboardRoute"));
        assert_eq!(group, expected);
    }

    #[test]
    fn test_group_without_prefix() {
        let group = RouteGroup::from_value(&json!({ "routes": { "/users": "UsersRoute" } })).unwrap();
        assert_eq!(group.prefix, "");
        assert_eq!(group.routes.len(), 1);
    }

    #[test]
    fn test_malformed_entries_are_rejected() {
        let err = RouteGroup::from_value(&json!({ "/": 42 })).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedEntry { ref location, .. } if location == "$./"));

        let err = RouteGroup::from_value(&json!([ { "/": "Home" }, "stray" ])).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedEntry { ref location, .. } if location == "$[1]"));

        let err = RouteGroup::from_value(&json!({ "prefix": 1, "routes": {} })).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedEntry { ref location, .. } if location == "$.prefix"));

        let err = RouteGroup::from_value(&json!({ "routes": {}, "middleware": [] })).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedEntry { ref location, .. } if location == "$.middleware"));

        assert!(RouteGroup::from_value(&json!("HomeRoute")).is_err());
    }

    #[test]
    fn test_deserialize_through_serde() {
        let group: RouteGroup = serde_json::from_str(r#"{ "/users": "UsersRoute" }"#).unwrap();
        assert_eq!(group, RouteGroup::new().route("/users", "UsersRoute"));

        let err = serde_json::from_str::<RouteGroup>(r#"{ "/users": [] }"#).unwrap_err();
        assert!(err.to_string().contains("malformed route entry"));
    }
}
