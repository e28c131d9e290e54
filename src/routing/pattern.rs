//! Route patterns with `{name}` placeholders.

use std::fmt;

use regex::Regex;

use crate::routing::error::ConfigError;
use crate::routing::path::normalize;
use crate::routing::PathParams;

/// A piece of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Placeholder(String),
}

/// A validated route pattern such as `/user/{id}/post/{postId}`.
///
/// Patterns without placeholders are static and only ever matched by exact
/// lookup. Dynamic patterns carry an anchored regex in which each
/// placeholder matches one or more characters other than `/`.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    raw: String,
    param_names: Vec<String>,
    regex: Option<Regex>,
}

fn is_placeholder_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn tokenize(pattern: &str) -> Result<Vec<Token>, ConfigError> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut chars = pattern.char_indices();

    while let Some((position, c)) = chars.next() {
        match c {
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for (inner_position, inner) in chars.by_ref() {
                    match inner {
                        '}' => {
                            closed = true;
                            break;
                        }
                        '{' => {
                            return Err(ConfigError::UnbalancedBrace {
                                pattern: pattern.to_string(),
                                position: inner_position,
                            });
                        }
                        _ => name.push(inner),
                    }
                }
                if !closed {
                    return Err(ConfigError::UnbalancedBrace {
                        pattern: pattern.to_string(),
                        position,
                    });
                }
                if name.is_empty() || !name.chars().all(is_placeholder_char) {
                    return Err(ConfigError::InvalidPlaceholder {
                        pattern: pattern.to_string(),
                        name,
                    });
                }
                if !literal.is_empty() {
                    tokens.push(Token::Literal(std::mem::take(&mut literal)));
                }
                tokens.push(Token::Placeholder(name));
            }
            '}' => {
                return Err(ConfigError::UnbalancedBrace {
                    pattern: pattern.to_string(),
                    position,
                });
            }
            _ => literal.push(c),
        }
    }

    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }

    Ok(tokens)
}

impl RoutePattern {
    /// Parse and validate a pattern. The pattern is normalized first.
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        let raw = normalize(pattern);
        let tokens = tokenize(&raw)?;

        let mut param_names: Vec<String> = Vec::new();
        let mut expression = String::from("^");
        for token in &tokens {
            match token {
                Token::Literal(text) => expression.push_str(&regex::escape(text)),
                Token::Placeholder(name) => {
                    if param_names.contains(name) {
                        return Err(ConfigError::DuplicatePlaceholder {
                            pattern: raw.clone(),
                            name: name.clone(),
                        });
                    }
                    param_names.push(name.clone());
                    expression.push_str("([^/]+)");
                }
            }
        }
        expression.push('$');

        let regex = if param_names.is_empty() {
            None
        } else {
            let compiled = Regex::new(&expression).map_err(|source| ConfigError::InvalidRegex {
                pattern: raw.clone(),
                source,
            })?;
            Some(compiled)
        };

        Ok(Self {
            raw,
            param_names,
            regex,
        })
    }

    /// The normalized pattern string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Placeholder names, left to right.
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    pub fn is_dynamic(&self) -> bool {
        self.regex.is_some()
    }

    /// Match a request path against a dynamic pattern, returning the
    /// captured placeholder values in declaration order.
    ///
    /// Static patterns never match here; they are found by exact lookup.
    pub fn captures(&self, path: &str) -> Option<PathParams> {
        let caps = self.regex.as_ref()?.captures(path)?;

        let mut params = PathParams::new();
        for (i, name) in self.param_names.iter().enumerate() {
            if let Some(value) = caps.get(i + 1) {
                params.push(name.clone(), value.as_str());
            }
        }
        Some(params)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for RoutePattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for RoutePattern {}
