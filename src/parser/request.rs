//! HTTP request parsing and representation.

use std::collections::HashMap;
use std::str::FromStr;

use crate::parser::error::Error;
use crate::parser::method::Method;
use crate::parser::version::HttpVersion;

/// Represents an HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// The request path, without the query string
    pub path: String,
    /// The HTTP version
    pub version: HttpVersion,
    /// The HTTP headers
    pub headers: HashMap<String, String>,
    /// The request body
    pub body: Vec<u8>,
    /// Query parameters parsed from the request target
    pub query_params: HashMap<String, String>,
}

impl HttpRequest {
    /// Create a new HTTP request from a request target such as
    /// `/users?page=2`. The query string is split off into `query_params`.
    pub fn new(method: Method, target: &str, version: HttpVersion, headers: HashMap<String, String>) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (target, ""),
        };

        Self {
            method,
            path: path.to_string(),
            version,
            headers,
            body: Vec::new(),
            query_params: parse_query(query),
        }
    }

    /// Replace the request body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Add or replace a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Get a header value. Header names are matched case-insensitively.
    pub fn get_header(&self, name: &str) -> Option<&String> {
        self.headers
            .iter()
            .find_map(|(k, v)| k.eq_ignore_ascii_case(name).then_some(v))
    }

    /// Check if a header exists.
    pub fn has_header(&self, name: &str) -> bool {
        self.get_header(name).is_some()
    }

    /// The media type of the body, lower-cased and stripped of parameters.
    ///
    /// `application/json; charset=UTF-8` yields `application/json`.
    pub fn media_type(&self) -> Option<String> {
        self.get_header("Content-Type").map(|value| {
            value
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }

    /// Check if the request declares a JSON body.
    pub fn is_json(&self) -> bool {
        self.media_type().as_deref() == Some("application/json")
    }

    /// Get a query parameter value.
    pub fn get_query_param(&self, name: &str) -> Option<&String> {
        self.query_params.get(name)
    }

    /// Check if a query parameter exists.
    pub fn has_query_param(&self, name: &str) -> bool {
        self.query_params.contains_key(name)
    }
}

/// Decode one query component: `+` is a space, then percent escapes.
/// Escapes that do not decode to UTF-8 leave the component as sent.
fn decode_component(component: &str) -> String {
    let spaced = component.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (decode_component(k), decode_component(v)),
            None => (decode_component(pair), String::new()),
        })
        .collect()
}

fn find_head_end(input: &[u8]) -> Option<(usize, usize)> {
    if let Some(pos) = input.windows(4).position(|w| w == b"\r\n\r\n") {
        return Some((pos, pos + 4));
    }
    input
        .windows(2)
        .position(|w| w == b"\n\n")
        .map(|pos| (pos, pos + 2))
}

/// How much of a request has to be read before it can be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestFrame {
    /// Offset of the first body byte.
    pub body_start: usize,
    /// Body length announced by `Content-Length`, zero when absent.
    pub content_length: usize,
    /// The client sent `Expect: 100-continue` and waits before the body.
    pub expects_continue: bool,
}

impl RequestFrame {
    /// Total length of head and body.
    pub fn total_len(&self) -> usize {
        self.body_start.saturating_add(self.content_length)
    }
}

/// Inspect a partially read request.
///
/// Returns `None` until the blank line ending the head has arrived. A
/// `Content-Length` that is not a number counts as zero here; parsing the
/// request reports it.
pub fn frame_request(input: &[u8]) -> Option<RequestFrame> {
    let (head_end, body_start) = find_head_end(input)?;
    let head = String::from_utf8_lossy(&input[..head_end]);

    let mut frame = RequestFrame {
        body_start,
        content_length: 0,
        expects_continue: false,
    };
    for line in head.lines().skip(1) {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let (name, value) = (name.trim(), value.trim());
        if name.eq_ignore_ascii_case("Content-Length") {
            frame.content_length = value.parse().unwrap_or(0);
        } else if name.eq_ignore_ascii_case("Expect") {
            frame.expects_continue = value.eq_ignore_ascii_case("100-continue");
        }
    }
    Some(frame)
}

/// Parse an HTTP request from a byte slice.
///
/// The head (request line and headers) must be UTF-8. Everything after the
/// blank line is the body, cut to `Content-Length` when the header is present.
/// A body shorter than `Content-Length` is an error.
pub fn parse_request(input: &[u8]) -> Result<HttpRequest, Error> {
    if input.is_empty() {
        return Err(Error::EmptyRequest);
    }

    let (head, body) = match find_head_end(input) {
        Some((head_end, body_start)) => (&input[..head_end], &input[body_start..]),
        None => (input, &input[input.len()..]),
    };

    let head = std::str::from_utf8(head).map_err(|_| Error::InvalidEncoding)?;
    let mut lines = head.lines();

    let request_line = lines.next().ok_or(Error::EmptyRequest)?;

    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() != 3 {
        return Err(Error::MalformedRequestLine(request_line.to_string()));
    }

    let method = Method::from_str(parts[0])?;

    let target = parts[1];
    if !target.starts_with('/') {
        return Err(Error::InvalidTarget(target.to_string()));
    }

    let version = HttpVersion::from_str(parts[2])?;

    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }

        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::InvalidHeaderFormat(line.to_string()))?;
        headers.insert(name.trim().to_string(), value.trim().to_string());
    }

    let request = HttpRequest::new(method, target, version, headers);

    if version.requires_host() && !request.has_header("Host") {
        return Err(Error::MissingHeader("Host".to_string()));
    }

    let body = match request.get_header("Content-Length") {
        Some(value) => {
            let length: usize = value
                .parse()
                .map_err(|_| Error::InvalidContentLength(value.clone()))?;
            if body.len() < length {
                return Err(Error::IncompleteBody {
                    expected: length,
                    received: body.len(),
                });
            }
            &body[..length]
        }
        None => body,
    };

    Ok(request.with_body(body))
}
