//! Route handlers and the registry that resolves handler names to them.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::parser::HttpRequest;
use crate::routing::{HandlerRef, PathParams, Router};
use crate::server::error::Error;
use crate::server::response::ApiResponse;

/// Type alias for the boxed future a handler returns.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<ApiResponse, Error>> + Send>>;

/// Type alias for a handler function that takes a RouteRequest and returns a HandlerFuture.
pub type HandlerFn = Arc<dyn Fn(RouteRequest) -> HandlerFuture + Send + Sync>;

/// What a handler receives: the request, the path parameters of the matched
/// route, and the merged input (query or JSON body, overlaid with the path
/// parameters).
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub request: HttpRequest,
    pub params: PathParams,
    pub input: Map<String, Value>,
}

impl RouteRequest {
    pub fn new(request: HttpRequest, params: PathParams, mut input: Map<String, Value>) -> Self {
        params.merge_into(&mut input);
        Self {
            request,
            params,
            input,
        }
    }

    /// A path parameter of the matched route.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Deserialize the merged input into the route's input type.
    ///
    /// Missing fields fail; so do unknown ones when the type is marked
    /// `#[serde(deny_unknown_fields)]`. Both become [`Error::BadRequest`].
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_value(Value::Object(self.input.clone()))
            .map_err(|e| Error::BadRequest(format!("invalid input: {e}")))
    }
}

/// Handler functions keyed by the names routes refer to them by.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<HandlerRef, HandlerFn>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any previous one.
    pub fn insert<F, Fut>(&mut self, name: impl Into<HandlerRef>, handler: F)
    where
        F: Fn(RouteRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ApiResponse, Error>> + Send + 'static,
    {
        let handler: HandlerFn = Arc::new(move |req: RouteRequest| -> HandlerFuture { Box::pin(handler(req)) });
        self.handlers.insert(name.into(), handler);
    }

    pub fn get(&self, name: &HandlerRef) -> Option<HandlerFn> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Handlers named in `router` that have no registration.
    pub fn missing<'a>(&self, router: &'a Router) -> Vec<&'a HandlerRef> {
        router
            .handler_refs()
            .into_iter()
            .filter(|name| !self.handlers.contains_key(*name))
            .collect()
    }
}
