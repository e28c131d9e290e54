//! Path normalization and prefix joining.

/// Normalize a path for use as a route table key or lookup.
///
/// The result always starts with a single `/`, contains no runs of `/`, and
/// has no trailing `/` unless it is the root. Everything else, including
/// percent escapes, case and placeholder braces, is left as is.
pub fn normalize(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len() + 1);
    normalized.push('/');

    for c in path.chars() {
        if c == '/' && normalized.ends_with('/') {
            continue;
        }
        normalized.push(c);
    }

    if normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }

    normalized
}

/// Join a group prefix and a child path, normalizing the result.
pub fn join_paths(prefix: &str, path: &str) -> String {
    match (prefix.is_empty(), path.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => normalize(path),
        (false, true) => normalize(prefix),
        (false, false) => {
            let prefix = match prefix.trim_end_matches('/') {
                "" => "/",
                trimmed => trimmed,
            };
            let mut joined = String::with_capacity(prefix.len() + path.len() + 1);
            joined.push_str(prefix);
            if !path.starts_with('/') {
                joined.push('/');
            }
            joined.push_str(path);
            normalize(&joined)
        }
    }
}
