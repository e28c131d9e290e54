//! HTTP server implementation.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinSet;
use tokio::signal;
use log::{debug, info, warn, error};

use crate::parser::{frame_request, parse_request, Method};
use crate::routing::{HandlerRef, Router};
use crate::server::config::ServerConfig;
use crate::server::dispatcher::Dispatcher;
use crate::server::error::Error;
use crate::server::handler::{HandlerRegistry, RouteRequest};
use crate::server::response::{ApiResponse, HttpResponse, StatusCode};

const CONTINUE_RESPONSE: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n";

/// An HTTP server dispatching through a compiled [`Router`].
pub struct HttpServer {
    /// The server configuration.
    pub config: Arc<ServerConfig>,
    /// Route tables, compiled once before the server starts.
    pub router: Arc<Router>,
    /// Handlers referenced by the routes.
    pub handlers: Arc<RwLock<HandlerRegistry>>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration and routes.
    pub fn new(config: ServerConfig, router: Router) -> Self {
        Self {
            config: Arc::new(config),
            router: Arc::new(router),
            handlers: Arc::new(RwLock::new(HandlerRegistry::new())),
        }
    }

    /// Register the handler that routes refer to as `name`.
    pub async fn register_handler<F, Fut>(&self, name: impl Into<HandlerRef>, handler: F)
    where
        F: Fn(RouteRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ApiResponse, Error>> + Send + 'static,
    {
        self.handlers.write().await.insert(name, handler);
    }

    /// A dispatcher sharing this server's router and handlers.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.router.clone(), self.handlers.clone(), self.config.clone())
    }

    /// Log the banner, every compiled route, and handlers that are missing.
    async fn display_server_info(&self) {
        let banner = include_str!("../banner.txt");
        info!("\n{banner}");

        info!("Compiled routes:");
        for method in self.router.methods() {
            if let Some(table) = self.router.table(method) {
                for entry in table.iter() {
                    info!("  {method} {pattern} -> {handler}", pattern = entry.pattern, handler = entry.handler);
                }
            }
        }

        let handlers = self.handlers.read().await;
        for name in handlers.missing(&self.router) {
            warn!("Route handler {name} is not registered; its routes will answer 404");
        }
    }

    /// Resolves on Ctrl+C. If the signal cannot be installed it never resolves.
    async fn ctrl_c() {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown"),
            Err(e) => {
                error!("Error setting up Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    }

    /// Answer a connection that arrived while every slot was taken.
    pub async fn reject_over_capacity(socket: &mut (impl AsyncWrite + Unpin)) -> Result<(), Error> {
        let response = HttpResponse::api(
            StatusCode::ServiceUnavailable,
            &ApiResponse::error("Server is at capacity, please try again later"),
        );
        socket.write_all(&response.to_bytes()).await?;
        Ok(())
    }

    /// Handle a new connection.
    async fn handle_new_connection(
        mut socket: tokio::net::TcpStream,
        addr: SocketAddr,
        semaphore: Arc<Semaphore>,
        dispatcher: Dispatcher,
        tasks: &mut JoinSet<()>,
    ) {
        let permit = match semaphore.try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!("Connection limit reached, rejecting connection from {addr}");
                if let Err(e) = Self::reject_over_capacity(&mut socket).await {
                    debug!("Could not notify {addr} of the connection limit: {e}");
                }
                return;
            }
        };

        tasks.spawn(async move {
            // The permit is dropped when the task completes, releasing the semaphore slot
            let _permit = permit;

            if let Err(e) = Self::handle_connection(&mut socket, &dispatcher).await {
                // The client already has its response unless the socket failed.
                match e {
                    Error::IoError(_) => warn!("Connection from {addr} dropped: {e}"),
                    _ => info!("Request from {addr} failed: {e}"),
                }
            }
        });
    }

    /// Whether an accept error should stop the server.
    async fn handle_accept_error(e: std::io::Error) -> bool {
        error!("Error accepting connection: {e}");

        if e.kind() == std::io::ErrorKind::BrokenPipe {
            error!("Critical error accepting connection, shutting down");
            return true;
        }

        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        false
    }

    /// Wait up to 30 seconds for in-flight connections.
    async fn perform_shutdown(tasks: &mut JoinSet<()>) {
        info!("Waiting for {len} active connections to complete...", len = tasks.len());
        let shutdown_timeout = tokio::time::Duration::from_secs(30);
        let drained = tokio::time::timeout(shutdown_timeout, async {
            while let Some(res) = tasks.join_next().await {
                if let Err(e) = res {
                    error!("Task failed during shutdown: {e}");
                }
            }
        }).await;

        if drained.is_err() {
            warn!("Shutdown timed out, aborting {len} connections", len = tasks.len());
            tasks.abort_all();
        }
        info!("Server shutdown complete");
    }

    /// Bind the configured address and serve until Ctrl+C.
    pub async fn start(&self) -> Result<(), Error> {
        let listener = TcpListener::bind(&self.config.addr).await?;
        self.serve_with_shutdown(listener, Self::ctrl_c()).await
    }

    /// Serve connections from `listener` until `shutdown` resolves, then
    /// wait for the connections in flight.
    pub async fn serve_with_shutdown(
        &self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        self.display_server_info().await;
        info!("Server listening on http://{addr}", addr = listener.local_addr()?);

        let semaphore = Arc::new(Semaphore::new(self.config.max_connections));
        let mut tasks = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down server...");
                    break;
                }

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((socket, addr)) => {
                            Self::handle_new_connection(
                                socket,
                                addr,
                                semaphore.clone(),
                                self.dispatcher(),
                                &mut tasks
                            ).await;
                        },
                        Err(e) => {
                            if Self::handle_accept_error(e).await {
                                break;
                            }
                        }
                    }
                }
            }
        }

        Self::perform_shutdown(&mut tasks).await;

        Ok(())
    }

    /// Read one request: the head, then as much body as `Content-Length`
    /// announces. Returns what arrived before the peer stopped sending,
    /// which may be incomplete.
    async fn read_request(
        socket: &mut (impl AsyncRead + AsyncWrite + Unpin),
        read_buffer_size: usize,
        max_request_size: usize,
    ) -> Result<Vec<u8>, Error> {
        let mut data = Vec::new();
        let mut chunk = vec![0; read_buffer_size.max(1)];
        let mut continue_sent = false;

        loop {
            if let Some(frame) = frame_request(&data) {
                let total = frame.total_len();
                if total > max_request_size {
                    return Err(Error::PayloadTooLarge(max_request_size));
                }
                if data.len() >= total {
                    data.truncate(total);
                    return Ok(data);
                }
                if frame.expects_continue && !continue_sent && data.len() == frame.body_start {
                    socket.write_all(CONTINUE_RESPONSE).await?;
                    continue_sent = true;
                }
            } else if data.len() > max_request_size {
                return Err(Error::PayloadTooLarge(max_request_size));
            }

            let n = socket.read(&mut chunk).await?;
            if n == 0 {
                return Ok(data);
            }
            data.extend_from_slice(&chunk[..n]);
        }
    }

    /// Handle a single connection: read one request, dispatch it, write the
    /// response. Requests that fail are still answered; the error is returned
    /// afterwards.
    pub async fn handle_connection(
        socket: &mut (impl AsyncRead + AsyncWrite + Unpin),
        dispatcher: &Dispatcher,
    ) -> Result<(), Error> {
        let config = dispatcher.config();

        let data = match Self::read_request(socket, config.read_buffer_size, config.max_request_size).await {
            Ok(data) => data,
            Err(e @ Error::PayloadTooLarge(_)) => {
                let response = dispatcher.error_response(&e, None);
                socket.write_all(&response.to_bytes()).await?;
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        if data.is_empty() {
            return Ok(()); // Connection closed
        }

        let request = match parse_request(&data) {
            Ok(req) => req,
            Err(e) => {
                let e = Error::ParseError(e);
                let response = dispatcher.error_response(&e, None);
                socket.write_all(&response.to_bytes()).await?;
                return Err(e);
            }
        };

        let origin = request.get_header("Origin").cloned();
        let is_head = request.method == Method::HEAD;

        let (response, outcome) = match dispatcher.dispatch(request).await {
            Ok(response) => (response, Ok(())),
            Err(e) => (dispatcher.error_response(&e, origin.as_deref()), Err(e)),
        };
        let response = if is_head { response.without_body() } else { response };

        socket.write_all(&response.to_bytes()).await?;
        outcome
    }
}
