//! Server configuration.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::server::error::Error;

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The address to bind to.
    pub addr: SocketAddr,
    /// The maximum number of concurrent connections.
    pub max_connections: usize,
    /// The read buffer size.
    pub read_buffer_size: usize,
    /// Largest request, head and body together, that is read in full.
    pub max_request_size: usize,
    /// Report handler error messages to clients instead of a generic one.
    pub debug_mode: bool,
    /// Origins that receive `Access-Control-Allow-Origin`, lower-case.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            max_connections: 1024,
            read_buffer_size: 8192,
            max_request_size: 1024 * 1024,
            debug_mode: false,
            allowed_origins: Vec::new(),
        }
    }
}

fn parse_var<T: FromStr>(name: &str, value: String) -> Result<T, Error> {
    value.trim().parse().map_err(|_| Error::InvalidEnv {
        name: name.to_string(),
        value,
    })
}

fn parse_flag(name: &str, value: String) -> Result<bool, Error> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(Error::InvalidEnv {
            name: name.to_string(),
            value,
        }),
    }
}

impl ServerConfig {
    /// Build a configuration from `STONESCRIPT_*` environment variables,
    /// falling back to the defaults for unset ones.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `STONESCRIPT_ADDR` | `addr` |
    /// | `STONESCRIPT_MAX_CONNECTIONS` | `max_connections` |
    /// | `STONESCRIPT_READ_BUFFER_SIZE` | `read_buffer_size` |
    /// | `STONESCRIPT_MAX_REQUEST_SIZE` | `max_request_size` |
    /// | `STONESCRIPT_DEBUG` | `debug_mode` |
    /// | `STONESCRIPT_ALLOWED_ORIGINS` | `allowed_origins`, comma separated |
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`ServerConfig::from_env`] with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut config = Self::default();

        if let Some(value) = lookup("STONESCRIPT_ADDR") {
            config.addr = parse_var("STONESCRIPT_ADDR", value)?;
        }
        if let Some(value) = lookup("STONESCRIPT_MAX_CONNECTIONS") {
            config.max_connections = parse_var("STONESCRIPT_MAX_CONNECTIONS", value)?;
        }
        if let Some(value) = lookup("STONESCRIPT_READ_BUFFER_SIZE") {
            config.read_buffer_size = parse_var("STONESCRIPT_READ_BUFFER_SIZE", value)?;
        }
        if let Some(value) = lookup("STONESCRIPT_MAX_REQUEST_SIZE") {
            config.max_request_size = parse_var("STONESCRIPT_MAX_REQUEST_SIZE", value)?;
        }
        if let Some(value) = lookup("STONESCRIPT_DEBUG") {
            config.debug_mode = parse_flag("STONESCRIPT_DEBUG", value)?;
        }
        if let Some(value) = lookup("STONESCRIPT_ALLOWED_ORIGINS") {
            config.allowed_origins = value
                .split(',')
                .map(|origin| origin.trim().to_ascii_lowercase())
                .filter(|origin| !origin.is_empty())
                .collect();
        }

        Ok(config)
    }

    /// Whether `origin` is allowed, compared case-insensitively.
    pub fn is_allowed_origin(&self, origin: &str) -> bool {
        self.allowed_origins
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(origin))
    }
}
