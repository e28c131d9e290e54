//! The flat, per-method table of compiled routes.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::routing::pattern::RoutePattern;

/// Opaque name of the code that handles a route. The routing layer only
/// stores and returns it; the dispatcher resolves it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerRef(Arc<str>);

impl HandlerRef {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for HandlerRef {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for HandlerRef {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl Borrow<str> for HandlerRef {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A compiled route: its pattern and handler.
#[derive(Debug, Clone)]
pub struct TableEntry {
    pub pattern: RoutePattern,
    pub handler: HandlerRef,
}

/// Flat mapping from normalized route pattern to handler.
///
/// Entries keep the order in which their pattern was first inserted.
/// Inserting a pattern that is already present replaces its handler but
/// keeps its position.
#[derive(Debug, Clone, Default)]
pub struct CompiledRouteTable {
    entries: Vec<TableEntry>,
    index: HashMap<String, usize>,
}

impl CompiledRouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a route.
    pub fn insert(&mut self, pattern: RoutePattern, handler: HandlerRef) {
        match self.index.get(pattern.as_str()) {
            Some(&slot) => self.entries[slot].handler = handler,
            None => {
                self.index.insert(pattern.as_str().to_string(), self.entries.len());
                self.entries.push(TableEntry { pattern, handler });
            }
        }
    }

    /// Merge another table into this one; its entries win on collision.
    pub fn extend(&mut self, other: CompiledRouteTable) {
        for entry in other.entries {
            self.insert(entry.pattern, entry.handler);
        }
    }

    /// Exact lookup by pattern string.
    pub fn get(&self, pattern: &str) -> Option<&HandlerRef> {
        self.index.get(pattern).map(|&slot| &self.entries[slot].handler)
    }

    pub fn contains(&self, pattern: &str) -> bool {
        self.index.contains_key(pattern)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &TableEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
