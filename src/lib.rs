//! # stitch
//!
//! Correlation ids and request/response logging for services behind a
//! reverse proxy, on a minimal hyper framework.
//!
//! ## The contract
//!
//! Every exchange gets exactly one correlation id. A caller-supplied
//! `x-request-id` is passed through unchanged; otherwise stitch mints one
//! shaped like `my-app/production/<time>.<random>`. The id is:
//!
//! - stored on the [`Request`] for handlers (`req.correlation_id()`),
//! - set as the response header on the way out,
//! - stamped on two debug log entries: `"Request received"` before the
//!   handler runs and `"Request handled"` after it returns.
//!
//! Logging is best-effort. A failing sink never fails a request.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use stitch::middleware::RequestLogger;
//! use stitch::{CorrelationConfig, Request, Response, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), stitch::Error> {
//!     let config = CorrelationConfig::new("My App", "Production")?;
//!
//!     let app = Router::new()
//!         .get("/users/{id}", get_user)
//!         .layer(RequestLogger::new(config));
//!
//!     Server::bind("0.0.0.0:3000")?.serve(app).await
//! }
//!
//! async fn get_user(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     let trace = req.correlation_id().map(|c| c.as_str()).unwrap_or_default();
//!     Response::json(format!(r#"{{"id":"{id}","trace":"{trace}"}}"#))
//! }
//! ```

mod config;
mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod middleware;

pub use config::{CorrelationConfig, DEFAULT_HEADER, DEFAULT_REDACTED_HEADERS};
pub use error::{ConfigError, Error};
pub use handler::{BoxFuture, Handler};
pub use request::{Request, RequestBuilder};
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
