//! A JSON API server whose routes come from `demos/routes.json`.
//!
//! Run with `RUST_LOG=debug cargo run --example route_server`, then:
//!
//! ```text
//! curl http://127.0.0.1:8080/user/42
//! curl -X POST -H 'Content-Type: application/json' \
//!      -d '{"name":"Bakery","theme":"ecomm1"}' http://127.0.0.1:8080/websites
//! ```

use serde::Deserialize;
use serde_json::json;

use stonescript_router::{ApiResponse, HttpServer, RouteConfig, Router, ServerConfig};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NewWebsite {
    name: String,
    theme: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let routes = RouteConfig::from_file(concat!(env!("CARGO_MANIFEST_DIR"), "/demos/routes.json"))?;
    let router = Router::from_config(&routes)?;

    let server = HttpServer::new(ServerConfig::from_env()?, router);

    server.register_handler("HomeRoute", |_req| async move {
        Ok(ApiResponse::ok(json!({ "service": "stonescript-router" }), "Welcome"))
    }).await;

    server.register_handler("UserByIdRoute", |req| async move {
        let id = req.param("id").unwrap_or_default();
        Ok(ApiResponse::ok(json!({ "id": id, "name": format!("User {id}") }), "User retrieved"))
    }).await;

    server.register_handler("WebsitesRoute", |req| async move {
        req.bind::<NewWebsite>().map(|website| {
            ApiResponse::ok(json!({ "name": website.name, "theme": website.theme }), "Website created")
        })
    }).await;

    server.register_handler("PostCommentRoute", |req| async move {
        match req.input.get("text").and_then(|text| text.as_str()) {
            Some(text) if !text.trim().is_empty() => Ok(ApiResponse::ok(
                json!({
                    "postId": req.param("postId"),
                    "commentId": req.param("commentId"),
                    "text": text,
                }),
                "Comment updated",
            )),
            _ => Ok(ApiResponse::not_ok("Comment text is required")),
        }
    }).await;

    // GeneralSettingsRoute is left unregistered; its route answers "Not Implemented".

    server.start().await?;

    Ok(())
}
