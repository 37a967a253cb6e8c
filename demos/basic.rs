//! Minimal stitch example — correlation ids and request logging.
//!
//! Run with:
//!   APP_NAME="My App" APP_ENV=local RUST_LOG=debug cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/users/42
//!   curl -i -H 'x-request-id: abc-123' http://localhost:3000/users/42
//!   curl -i -X POST http://localhost:3000/users -d '{"name":"alice"}'
//!   curl -i http://localhost:3000/missing          # body logged as "<>"

use http::StatusCode;
use stitch::middleware::RequestLogger;
use stitch::{CorrelationConfig, Request, Response, Router, Server};

#[tokio::main]
async fn main() -> Result<(), stitch::Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    // Misconfiguration stops the process here, not on the first request.
    let config = CorrelationConfig::from_env()?;

    let app = Router::new()
        .get("/users/{id}", get_user)
        .post("/users", create_user)
        .fallback(not_found)
        .layer(RequestLogger::new(config));

    Server::bind("0.0.0.0:3000")?.serve(app).await
}

// GET /users/{id}
async fn get_user(req: Request) -> Response {
    let id = req.param("id").unwrap_or("unknown");
    tracing::info!(user = id, "loading user");
    Response::json(format!(r#"{{"id":"{id}","name":"alice"}}"#))
}

// POST /users
async fn create_user(req: Request) -> Response {
    if req.body().is_empty() {
        return Response::status(StatusCode::BAD_REQUEST);
    }

    Response::builder()
        .status(StatusCode::CREATED)
        .header("location", "/users/99")
        .json(r#"{"id":"99","name":"new_user"}"#)
}

async fn not_found(_req: Request) -> Response {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .html("<!doctype html><html><body><h1>Not Found</h1></body></html>")
}
