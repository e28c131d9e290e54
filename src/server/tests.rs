//! Tests for the HTTP server and dispatcher.

#[cfg(test)]
mod server_tests {
    use std::collections::VecDeque;
    use std::io;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};
    use std::time::Duration;
    use serde::Deserialize;
    use serde_json::json;
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;
    use tokio::time;

    use crate::parser::Method;
    use crate::routing::{RouteConfig, Router};
    use crate::server::{ApiResponse, ApiStatus, Error, HttpServer, ServerConfig, StatusCode};

    // Mock TcpStream for testing. Each read returns at most one chunk.
    struct MockTcpStream {
        read_chunks: VecDeque<Vec<u8>>,
        write_data: Vec<u8>,
    }

    impl MockTcpStream {
        fn new(read_data: Vec<u8>) -> Self {
            Self::chunked(vec![read_data])
        }

        fn chunked(chunks: Vec<Vec<u8>>) -> Self {
            Self {
                read_chunks: chunks.into_iter().filter(|chunk| !chunk.is_empty()).collect(),
                write_data: Vec::new(),
            }
        }

        fn written(&self) -> String {
            String::from_utf8_lossy(&self.write_data).into_owned()
        }

        fn written_body(&self) -> serde_json::Value {
            let text = self.written();
            let body = text.split_once("\r\n\r\n").map(|(_, body)| body).unwrap_or_default();
            serde_json::from_str(body).unwrap()
        }
    }

    impl AsyncRead for MockTcpStream {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let this = self.get_mut();
            if let Some(mut chunk) = this.read_chunks.pop_front() {
                let n = chunk.len().min(buf.remaining());
                buf.put_slice(&chunk[..n]);
                if n < chunk.len() {
                    this.read_chunks.push_front(chunk.split_off(n));
                }
            }
            Poll::Ready(Ok(()))
        }
    }

    impl AsyncWrite for MockTcpStream {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let this = self.get_mut();
            this.write_data.extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct WebsiteInput {
        name: String,
        theme: String,
    }

    fn test_router() -> Router {
        let config = RouteConfig::from_value(&json!({
            "GET": {
                "/": "HomeRoute",
                "/user/{id}": "UserByIdRoute",
                "/reports": "UnregisteredRoute",
                "/boom": "ExceptionThrowingRoute"
            },
            "POST": [
                { "/websites": "WebsitesRoute" },
                {
                    "prefix": "/post/{postId}",
                    "routes": { "/comment/{commentId}": "PostCommentRoute" }
                }
            ]
        }))
        .unwrap();
        Router::from_config(&config).unwrap()
    }

    async fn test_server(config: ServerConfig) -> HttpServer {
        let server = HttpServer::new(config, test_router());

        server.register_handler("HomeRoute", |req| async move {
            let name = req.request.get_query_param("name").cloned().unwrap_or_else(|| "World".to_string());
            Ok(ApiResponse::ok(json!({ "greeting": format!("Hello, {name}!") }), ""))
        }).await;

        server.register_handler("UserByIdRoute", |req| async move {
            let id = req.param("id").unwrap_or_default().to_string();
            Ok(ApiResponse::ok(json!({ "userId": id }), format!("User {id} retrieved")))
        }).await;

        server.register_handler("PostCommentRoute", |req| async move {
            Ok(ApiResponse::ok(json!({
                "postId": req.param("postId"),
                "commentId": req.param("commentId"),
                "text": req.input.get("text"),
            }), ""))
        }).await;

        server.register_handler("WebsitesRoute", |req| async move {
            req.bind::<WebsiteInput>()
                .map(|input| ApiResponse::ok(json!({ "name": input.name, "theme": input.theme }), "created"))
        }).await;

        server.register_handler("ExceptionThrowingRoute", |_req| async {
            Err(Error::InternalError("Test exception from route handler".to_string()))
        }).await;

        server
    }

    async fn run(server: &HttpServer, request: &[u8]) -> (Result<(), Error>, MockTcpStream) {
        run_chunks(server, vec![request.to_vec()]).await
    }

    async fn run_chunks(server: &HttpServer, chunks: Vec<Vec<u8>>) -> (Result<(), Error>, MockTcpStream) {
        let mut stream = MockTcpStream::chunked(chunks);
        let result = HttpServer::handle_connection(&mut stream, &server.dispatcher()).await;
        (result, stream)
    }

    fn json_post(path: &str, body: &str) -> String {
        format!(
            "POST {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        )
    }

    #[tokio::test]
    async fn test_server_creation() {
        let config = ServerConfig {
            addr: "127.0.0.1:8080".parse().unwrap(),
            max_connections: 100,
            read_buffer_size: 4096,
            ..ServerConfig::default()
        };

        let server = HttpServer::new(config.clone(), test_router());
        assert_eq!(server.config.addr, config.addr);
        assert_eq!(server.config.max_connections, 100);
        assert_eq!(server.config.read_buffer_size, 4096);
        assert!(server.handlers.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_static_get_route() {
        let server = test_server(ServerConfig::default()).await;
        let (result, stream) = run(&server, b"GET /?name=Ada HTTP/1.1\r\nHost: localhost\r\n\r\n").await;

        assert!(result.is_ok());
        assert!(stream.written().starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(stream.written().contains("Content-Type: application/json\r\n"));
        assert_eq!(
            stream.written_body(),
            json!({ "status": "ok", "message": "", "data": { "greeting": "Hello, Ada!" } })
        );
    }

    #[tokio::test]
    async fn test_dynamic_route_extracts_params() {
        let server = test_server(ServerConfig::default()).await;
        let (result, stream) = run(&server, b"GET /user/123 HTTP/1.1\r\nHost: localhost\r\n\r\n").await;

        assert!(result.is_ok());
        let body = stream.written_body();
        assert_eq!(body["data"]["userId"], "123");
        assert_eq!(body["message"], "User 123 retrieved");
    }

    #[tokio::test]
    async fn test_request_path_is_normalized() {
        let server = test_server(ServerConfig::default()).await;
        let (result, stream) = run(&server, b"GET //user//9/ HTTP/1.1\r\nHost: localhost\r\n\r\n").await;

        assert!(result.is_ok());
        assert_eq!(stream.written_body()["data"]["userId"], "9");
    }

    #[tokio::test]
    async fn test_post_with_json_and_group_params() {
        let server = test_server(ServerConfig::default()).await;
        let body = r#"{"text":"nice","postId":"spoofed"}"#;
        let request = format!(
            "POST /post/5/comment/8 HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json; charset=utf-8\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        let (result, stream) = run(&server, request.as_bytes()).await;

        assert!(result.is_ok());
        assert_eq!(
            stream.written_body()["data"],
            json!({ "postId": "5", "commentId": "8", "text": "nice" })
        );
    }

    #[tokio::test]
    async fn test_typed_input_binding() {
        let server = test_server(ServerConfig::default()).await;
        let body = r#"{"name":"Bakery","theme":"ecomm1"}"#;
        let request = format!(
            "POST /websites HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        let (result, stream) = run(&server, request.as_bytes()).await;

        assert!(result.is_ok());
        assert_eq!(stream.written_body()["data"], json!({ "name": "Bakery", "theme": "ecomm1" }));
    }

    #[tokio::test]
    async fn test_typed_input_binding_rejects_missing_fields() {
        let server = test_server(ServerConfig::default()).await;
        let body = r#"{"name":"Bakery"}"#;
        let request = format!(
            "POST /websites HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        let (result, stream) = run(&server, request.as_bytes()).await;

        assert!(matches!(result, Err(Error::BadRequest(_))));
        assert!(stream.written().starts_with("HTTP/1.1 400 Bad Request\r\n"));
        let body = stream.written_body();
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().contains("theme"));
    }

    #[tokio::test]
    async fn test_not_found() {
        let server = test_server(ServerConfig::default()).await;
        let (result, stream) = run(&server, b"GET /nonexistent HTTP/1.1\r\nHost: localhost\r\n\r\n").await;

        assert!(matches!(result, Err(Error::NotFound(ref p)) if p == "/nonexistent"));
        assert!(stream.written().starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert_eq!(stream.written_body(), json!({ "status": "error", "message": "Not found", "data": null }));
    }

    #[tokio::test]
    async fn test_unregistered_handler_is_not_implemented() {
        let server = test_server(ServerConfig::default()).await;
        let (result, stream) = run(&server, b"GET /reports HTTP/1.1\r\nHost: localhost\r\n\r\n").await;

        assert!(matches!(result, Err(Error::HandlerNotRegistered(ref h)) if h.as_str() == "UnregisteredRoute"));
        assert!(stream.written().starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert_eq!(stream.written_body()["message"], "Not Implemented");
    }

    #[tokio::test]
    async fn test_method_not_allowed() {
        let server = test_server(ServerConfig::default()).await;
        let (result, stream) = run(&server, b"GET /websites HTTP/1.1\r\nHost: localhost\r\n\r\n").await;

        assert!(matches!(result, Err(Error::MethodNotAllowed { method: Method::GET, .. })));
        assert!(stream.written().starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
        assert!(stream.written().contains("Allow: POST\r\n"));
        assert_eq!(stream.written_body()["message"], "Method not allowed");
    }

    #[tokio::test]
    async fn test_post_requires_json_content_type() {
        let server = test_server(ServerConfig::default()).await;
        for content_type in ["multipart/form-data; boundary=----x", "application/x-www-form-urlencoded", "text/plain"] {
            let request = format!(
                "POST /websites HTTP/1.1\r\nHost: localhost\r\nContent-Type: {content_type}\r\nContent-Length: 2\r\n\r\n{{}}"
            );
            let (result, stream) = run(&server, request.as_bytes()).await;

            assert!(matches!(result, Err(Error::UnsupportedMediaType(_))), "{content_type} accepted");
            assert!(stream.written().starts_with("HTTP/1.1 415 Unsupported Media Type\r\n"));
            assert_eq!(stream.written_body()["message"], "Content-Type must be application/json");
        }
    }

    #[tokio::test]
    async fn test_post_with_invalid_json() {
        let server = test_server(ServerConfig::default()).await;
        for body in ["{not json", "[1,2]"] {
            let request = format!(
                "POST /websites HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
                body.len()
            );
            let (result, stream) = run(&server, request.as_bytes()).await;

            assert!(matches!(result, Err(Error::BadRequest(_))));
            assert_eq!(stream.written_body()["message"], "input not valid json");
        }
    }

    #[tokio::test]
    async fn test_handler_error_is_hidden_outside_debug_mode() {
        let server = test_server(ServerConfig::default()).await;
        let (result, stream) = run(&server, b"GET /boom HTTP/1.1\r\nHost: localhost\r\n\r\n").await;

        assert!(matches!(result, Err(Error::InternalError(_))));
        assert!(stream.written().starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
        assert_eq!(stream.written_body()["message"], "Internal server error");
    }

    #[tokio::test]
    async fn test_handler_error_is_reported_in_debug_mode() {
        let config = ServerConfig { debug_mode: true, ..ServerConfig::default() };
        let server = test_server(config).await;
        let (_, stream) = run(&server, b"GET /boom HTTP/1.1\r\nHost: localhost\r\n\r\n").await;

        let message = stream.written_body()["message"].as_str().unwrap().to_string();
        assert!(message.contains("Test exception from route handler"));
    }

    #[tokio::test]
    async fn test_cors_preflight_and_allowed_origin() {
        let config = ServerConfig {
            allowed_origins: vec!["http://localhost:4200".to_string()],
            ..ServerConfig::default()
        };
        let server = test_server(config).await;

        let (result, stream) = run(
            &server,
            b"OPTIONS /websites HTTP/1.1\r\nHost: localhost\r\nOrigin: http://LOCALHOST:4200\r\n\r\n",
        ).await;
        assert!(result.is_ok());
        let written = stream.written();
        assert!(written.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(written.contains("Access-Control-Allow-Origin: http://localhost:4200\r\n"));
        assert!(written.contains("Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n"));
        assert!(written.contains("Access-Control-Max-Age: 900\r\n"));
        assert!(written.contains("Vary: Origin\r\n"));
        assert_eq!(stream.written_body()["data"], json!([]));

        let (_, stream) = run(
            &server,
            b"GET / HTTP/1.1\r\nHost: localhost\r\nOrigin: http://evil.example\r\n\r\n",
        ).await;
        assert!(!stream.written().contains("Access-Control-Allow-Origin"));
        assert!(stream.written().contains("Access-Control-Allow-Credentials: true\r\n"));
    }

    #[tokio::test]
    async fn test_invalid_request() {
        let server = test_server(ServerConfig::default()).await;
        let (result, stream) = run(&server, b"INVALID REQUEST").await;

        assert!(matches!(result, Err(Error::ParseError(_))));
        assert!(stream.written().starts_with("HTTP/1.1 400 Bad Request\r\n"));
        let body = stream.written_body();
        assert!(body["message"].as_str().unwrap().starts_with("Error parsing request:"));
    }

    #[tokio::test]
    async fn test_closed_connection_is_not_an_error() {
        let server = test_server(ServerConfig::default()).await;
        let (result, stream) = run(&server, b"").await;
        assert!(result.is_ok());
        assert!(stream.written().is_empty());
    }

    #[tokio::test]
    async fn test_dispatcher_envelope_statuses() {
        let server = test_server(ServerConfig::default()).await;
        let dispatcher = server.dispatcher();

        let response = dispatcher.error_response(&Error::NotFound("/x".to_string()), None);
        assert_eq!(response.status, StatusCode::NotFound);
        assert_eq!(response.api_body().unwrap().status, ApiStatus::Error);

        let response = dispatcher.error_response(&Error::UnsupportedMediaType("text/html".to_string()), None);
        assert_eq!(response.status, StatusCode::UnsupportedMediaType);
    }

    #[test]
    fn test_server_config_from_lookup() {
        let vars = [
            ("STONESCRIPT_ADDR", "0.0.0.0:9000"),
            ("STONESCRIPT_MAX_CONNECTIONS", "42"),
            ("STONESCRIPT_MAX_REQUEST_SIZE", "65536"),
            ("STONESCRIPT_DEBUG", "true"),
            ("STONESCRIPT_ALLOWED_ORIGINS", "https://A.example, https://b.example,"),
        ];
        let lookup = |name: &str| vars.iter().find(|(k, _)| *k == name).map(|(_, v)| v.to_string());

        let config = ServerConfig::from_lookup(lookup).unwrap();
        assert_eq!(config.addr, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.max_connections, 42);
        assert_eq!(config.read_buffer_size, 8192);
        assert_eq!(config.max_request_size, 65536);
        assert!(config.debug_mode);
        assert_eq!(config.allowed_origins, vec!["https://a.example", "https://b.example"]);
        assert!(config.is_allowed_origin("HTTPS://B.EXAMPLE"));

        let bad = ServerConfig::from_lookup(|name| (name == "STONESCRIPT_MAX_CONNECTIONS").then(|| "many".to_string()));
        assert!(matches!(bad, Err(Error::InvalidEnv { ref name, .. }) if name == "STONESCRIPT_MAX_CONNECTIONS"));
    }

    #[tokio::test]
    async fn test_query_values_reach_handlers_decoded() {
        let server = test_server(ServerConfig::default()).await;
        let (result, stream) = run(&server, b"GET /?name=John%20Doe+Jr HTTP/1.1\r\nHost: localhost\r\n\r\n").await;

        assert!(result.is_ok());
        assert_eq!(stream.written_body()["data"]["greeting"], "Hello, John Doe Jr!");
    }

    #[tokio::test]
    async fn test_body_split_across_reads() {
        let server = test_server(ServerConfig::default()).await;
        let request = json_post("/websites", r#"{"name":"Shop","theme":"ecomm1"}"#);
        let (head, body) = request.split_at(request.find("\r\n\r\n").unwrap() + 4);
        let (body_start, body_rest) = body.split_at(5);

        let (result, stream) = run_chunks(
            &server,
            vec![head.as_bytes().to_vec(), body_start.as_bytes().to_vec(), body_rest.as_bytes().to_vec()],
        ).await;

        assert!(result.is_ok(), "{result:?}");
        assert!(stream.written().starts_with("HTTP/1.1 200 OK\r\n"));
        assert_eq!(stream.written_body()["data"], json!({ "name": "Shop", "theme": "ecomm1" }));
    }

    #[tokio::test]
    async fn test_body_larger_than_read_buffer() {
        let server = test_server(ServerConfig::default()).await;
        let name = "x".repeat(9000);
        let body = json!({ "name": name, "theme": "ecomm1" }).to_string();
        let (result, stream) = run(&server, json_post("/websites", &body).as_bytes()).await;

        assert!(result.is_ok(), "{result:?}");
        assert_eq!(stream.written_body()["data"]["name"].as_str().map(str::len), Some(9000));
    }

    #[tokio::test]
    async fn test_expect_continue_is_acknowledged() {
        let server = test_server(ServerConfig::default()).await;
        let body = r#"{"name":"Shop","theme":"ecomm1"}"#;
        let head = format!(
            "POST /websites HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nExpect: 100-continue\r\nContent-Length: {}\r\n\r\n",
            body.len()
        );

        let (result, stream) = run_chunks(&server, vec![head.into_bytes(), body.as_bytes().to_vec()]).await;

        assert!(result.is_ok());
        let written = stream.written();
        let rest = written.strip_prefix("HTTP/1.1 100 Continue\r\n\r\n").unwrap();
        assert!(rest.starts_with("HTTP/1.1 200 OK\r\n"));
    }

    #[tokio::test]
    async fn test_connection_closed_mid_body() {
        let server = test_server(ServerConfig::default()).await;
        let request = b"POST /websites HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: 40\r\n\r\n{\"name\"";
        let (result, stream) = run(&server, request).await;

        assert!(matches!(result, Err(Error::ParseError(crate::parser::Error::IncompleteBody { expected: 40, received: 7 }))));
        assert!(stream.written().starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[tokio::test]
    async fn test_request_over_size_limit() {
        let config = ServerConfig { max_request_size: 256, ..ServerConfig::default() };
        let server = test_server(config).await;
        let body = json!({ "name": "y".repeat(400), "theme": "ecomm1" }).to_string();
        let (result, stream) = run(&server, json_post("/websites", &body).as_bytes()).await;

        assert!(matches!(result, Err(Error::PayloadTooLarge(256))));
        assert!(stream.written().starts_with("HTTP/1.1 413 Payload Too Large\r\n"));
        assert_eq!(stream.written_body()["message"], "Request too large");

        let endless_head = format!("GET / HTTP/1.1\r\nHost: localhost\r\nX-Padding: {}", "z".repeat(400));
        let (result, _) = run(&server, endless_head.as_bytes()).await;
        assert!(matches!(result, Err(Error::PayloadTooLarge(256))));
    }

    #[tokio::test]
    async fn test_head_request_has_no_body() {
        let server = test_server(ServerConfig::default()).await;

        let (result, stream) = run(&server, b"HEAD /user/7 HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(result.is_ok());
        let written = stream.written();
        assert!(written.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(written.ends_with("\r\n\r\n"));
        assert!(!written.contains("userId"));
        assert!(!written.contains("Content-Length: 0\r\n"));

        let (_, stream) = run(&server, b"HEAD /nonexistent HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(stream.written().starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(stream.written().ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_reject_over_capacity() {
        let mut stream = MockTcpStream::new(Vec::new());
        HttpServer::reject_over_capacity(&mut stream).await.unwrap();

        assert!(stream.written().starts_with("HTTP/1.1 503 Service Unavailable\r\n"));
        assert_eq!(stream.written_body()["status"], "error");
        assert_eq!(stream.written_body()["message"], "Server is at capacity, please try again later");
    }

    async fn read_response(stream: &mut TcpStream) -> String {
        let mut response = String::new();
        time::timeout(Duration::from_secs(5), stream.read_to_string(&mut response))
            .await
            .expect("response timed out")
            .unwrap();
        response
    }

    #[tokio::test]
    async fn test_serve_limits_connections_and_shuts_down() {
        let config = ServerConfig { max_connections: 1, ..ServerConfig::default() };
        let server = Arc::new(test_server(config).await);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let serving = tokio::spawn({
            let server = server.clone();
            async move {
                server.serve_with_shutdown(listener, async {
                    let _ = shutdown_rx.await;
                }).await
            }
        });

        // The first connection takes the only slot until it sends a request.
        let mut first = TcpStream::connect(addr).await.unwrap();
        let mut second = TcpStream::connect(addr).await.unwrap();
        let rejected = read_response(&mut second).await;
        assert!(rejected.starts_with("HTTP/1.1 503 Service Unavailable\r\n"), "{rejected}");

        first.write_all(b"GET /user/1 HTTP/1.1\r\nHost: localhost\r\n\r\n").await.unwrap();
        let answered = read_response(&mut first).await;
        assert!(answered.starts_with("HTTP/1.1 200 OK\r\n"), "{answered}");

        // A connection accepted before shutdown is still served.
        let mut in_flight = TcpStream::connect(addr).await.unwrap();
        time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(()).unwrap();
        in_flight.write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n").await.unwrap();
        let answered = read_response(&mut in_flight).await;
        assert!(answered.starts_with("HTTP/1.1 200 OK\r\n"), "{answered}");

        let result = time::timeout(Duration::from_secs(5), serving)
            .await
            .expect("server did not shut down")
            .expect("server task failed");
        assert!(result.is_ok());
    }
}
