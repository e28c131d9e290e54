//! Flattening of route group trees into compiled route tables.

use log::trace;

use crate::routing::error::ConfigError;
use crate::routing::group::{RouteGroup, RouteNode};
use crate::routing::path::join_paths;
use crate::routing::pattern::RoutePattern;
use crate::routing::table::CompiledRouteTable;

/// Compile a route tree into a flat table.
///
/// The tree is walked depth-first. Each group's prefix is joined onto the
/// prefix accumulated so far, and each route's pattern onto its enclosing
/// prefix. When two routes compile to the same pattern the later one wins.
/// Every pattern is validated; the first invalid one aborts compilation.
pub fn compile(tree: &RouteGroup, base_prefix: &str) -> Result<CompiledRouteTable, ConfigError> {
    let base = if tree.prefix.is_empty() {
        base_prefix.to_string()
    } else {
        join_paths(base_prefix, &tree.prefix)
    };

    let mut table = CompiledRouteTable::new();
    compile_into(&mut table, &tree.routes, &base)?;
    Ok(table)
}

fn compile_into(table: &mut CompiledRouteTable, nodes: &[RouteNode], prefix: &str) -> Result<(), ConfigError> {
    for node in nodes {
        match node {
            RouteNode::Group(group) => {
                let group_prefix = join_paths(prefix, &group.prefix);
                let mut nested = CompiledRouteTable::new();
                compile_into(&mut nested, &group.routes, &group_prefix)?;
                table.extend(nested);
            }
            RouteNode::Route { pattern, handler } => {
                let full_path = join_paths(prefix, pattern);
                trace!("compiled route {full_path} -> {handler}");
                table.insert(RoutePattern::parse(&full_path)?, handler.clone());
            }
        }
    }
    Ok(())
}
