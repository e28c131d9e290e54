//! Request dispatch: route resolution, input extraction, handler invocation
//! and conversion of the outcome into an HTTP response.

use std::sync::Arc;

use log::{debug, error, warn};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::parser::{HttpRequest, Method};
use crate::routing::{normalize, Router};
use crate::server::config::ServerConfig;
use crate::server::error::Error;
use crate::server::handler::{HandlerRegistry, RouteRequest};
use crate::server::response::{ApiResponse, HttpResponse, StatusCode};

const CORS_ALLOW_HEADERS: &str = "Alt-Used, Content-Type, Authorization";
const CORS_MAX_AGE: &str = "900";

/// Resolves requests against the compiled router and runs their handlers.
///
/// Cheap to clone; every connection task gets its own copy.
#[derive(Clone)]
pub struct Dispatcher {
    router: Arc<Router>,
    handlers: Arc<RwLock<HandlerRegistry>>,
    config: Arc<ServerConfig>,
}

impl Dispatcher {
    pub fn new(router: Arc<Router>, handlers: Arc<RwLock<HandlerRegistry>>, config: Arc<ServerConfig>) -> Self {
        Self {
            router,
            handlers,
            config,
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run a request through its route.
    ///
    /// Failures come back as [`Error`]s; turn them into responses with
    /// [`Dispatcher::error_response`].
    pub async fn dispatch(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        let origin = request.get_header("Origin").cloned();

        if request.method == Method::OPTIONS {
            debug!("CORS preflight for {path}", path = request.path);
            let response = HttpResponse::api(StatusCode::Ok, &ApiResponse::ok(Value::Array(Vec::new()), ""));
            return Ok(self.with_cors(response, origin.as_deref()));
        }

        let path = normalize(&request.path);
        debug!("request {method} {path}", method = request.method);

        // HEAD falls back to the GET routes when it has none of its own.
        let mut matched = self.router.resolve(request.method, &path);
        if !matched.is_match() && request.method == Method::HEAD {
            matched = self.router.resolve(Method::GET, &path);
        }
        let Some(handler_ref) = matched.handler else {
            let allowed = self.router.allowed_methods(&path);
            if allowed.is_empty() {
                return Err(Error::NotFound(path));
            }
            return Err(Error::MethodNotAllowed {
                method: request.method,
                path,
                allowed,
            });
        };

        let handler = self
            .handlers
            .read()
            .await
            .get(handler_ref)
            .ok_or_else(|| Error::HandlerNotRegistered(handler_ref.clone()))?;

        let input = extract_input(&request)?;
        let route_request = RouteRequest::new(request, matched.params, input);

        let body = handler(route_request).await?;
        let response = HttpResponse::api(StatusCode::Ok, &body);
        Ok(self.with_cors(response, origin.as_deref()))
    }

    /// The response reported to the client for a failed request.
    pub fn error_response(&self, error: &Error, origin: Option<&str>) -> HttpResponse {
        let status = error.status_code();
        let message = match error {
            Error::NotFound(_) => "Not found".to_string(),
            Error::HandlerNotRegistered(_) => "Not Implemented".to_string(),
            Error::MethodNotAllowed { .. } => "Method not allowed".to_string(),
            Error::UnsupportedMediaType(_) => "Content-Type must be application/json".to_string(),
            Error::BadRequest(message) => message.clone(),
            Error::PayloadTooLarge(_) => "Request too large".to_string(),
            Error::ParseError(e) => format!("Error parsing request: {e}"),
            other if self.config.debug_mode => other.to_string(),
            _ => "Internal server error".to_string(),
        };

        if status == StatusCode::InternalServerError {
            error!("Request failed: {error}");
        } else {
            debug!("Request rejected with {code}: {error}", code = status.as_u16());
        }

        let mut response = HttpResponse::api(status, &ApiResponse::error(message));
        if let Error::MethodNotAllowed { allowed, .. } = error {
            let allow = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
            response = response.with_header("Allow", allow);
        }
        self.with_cors(response, origin)
    }

    fn with_cors(&self, response: HttpResponse, origin: Option<&str>) -> HttpResponse {
        let mut methods: Vec<&str> = self.router.methods().map(|m| m.as_str()).collect();
        if !methods.contains(&Method::OPTIONS.as_str()) {
            methods.push(Method::OPTIONS.as_str());
        }

        let mut response = response
            .with_header("Access-Control-Allow-Methods", methods.join(", "))
            .with_header("Access-Control-Allow-Headers", CORS_ALLOW_HEADERS)
            .with_header("Access-Control-Allow-Credentials", "true")
            .with_header("Access-Control-Max-Age", CORS_MAX_AGE)
            .with_header("Vary", "Origin");

        match origin {
            Some(origin) if self.config.is_allowed_origin(origin) => {
                response = response.with_header("Access-Control-Allow-Origin", origin.to_ascii_lowercase());
            }
            Some(origin) => warn!("Origin {origin} is not allowed"),
            None => {}
        }

        response
    }
}

/// Collect a request's input: the JSON body for methods that carry one,
/// the query string otherwise.
fn extract_input(request: &HttpRequest) -> Result<Map<String, Value>, Error> {
    if !request.method.expects_body() {
        return Ok(request
            .query_params
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect());
    }

    if !request.is_json() {
        let content_type = request.get_header("Content-Type").cloned().unwrap_or_default();
        debug!("Unsupported Content-Type: {content_type}. Expected application/json");
        return Err(Error::UnsupportedMediaType(content_type));
    }

    match serde_json::from_slice::<Value>(&request.body) {
        Ok(Value::Object(input)) => Ok(input),
        Ok(_) | Err(_) => Err(Error::BadRequest("input not valid json".to_string())),
    }
}
