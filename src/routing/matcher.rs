//! Request path matching against a compiled route table.

use crate::routing::params::PathParams;
use crate::routing::table::{CompiledRouteTable, HandlerRef};

/// Outcome of matching a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult<'a> {
    /// The matched handler, or `None` when no route matched.
    pub handler: Option<&'a HandlerRef>,
    /// Captured placeholder values; empty for exact matches and misses.
    pub params: PathParams,
}

impl<'a> MatchResult<'a> {
    pub fn not_found() -> Self {
        Self {
            handler: None,
            params: PathParams::new(),
        }
    }

    pub fn is_match(&self) -> bool {
        self.handler.is_some()
    }
}

/// Match a request path against a table.
///
/// An exact pattern match wins outright. Otherwise dynamic patterns are
/// tried in table order and the first that matches is returned; there is
/// no ranking by specificity.
pub fn match_route<'a>(table: &'a CompiledRouteTable, request_path: &str) -> MatchResult<'a> {
    if let Some(handler) = table.get(request_path) {
        return MatchResult {
            handler: Some(handler),
            params: PathParams::new(),
        };
    }

    table
        .iter()
        .filter(|entry| entry.pattern.is_dynamic())
        .find_map(|entry| {
            entry.pattern.captures(request_path).map(|params| MatchResult {
                handler: Some(&entry.handler),
                params,
            })
        })
        .unwrap_or_else(MatchResult::not_found)
}
