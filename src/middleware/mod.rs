//! Middleware layer.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns: request-id injection, structured request logging,
//! authentication-header inspection.
//!
//! A middleware receives the [`Request`] and a [`Next`] cursor. Calling
//! [`Next::run`] forwards the request to the rest of the chain (remaining
//! middleware, then the matched route handler) and resolves to its response.
//!
//! ```rust,no_run
//! use stitch::middleware::Next;
//! use stitch::{Request, Response, Router};
//!
//! async fn server_header(req: Request, next: Next) -> Response {
//!     let mut res = next.run(req).await;
//!     res.headers_mut().insert("server", http::HeaderValue::from_static("stitch"));
//!     res
//! }
//!
//! let app = Router::new().layer(server_header);
//! ```
//!
//! Built-in middleware:
//! - [`RequestLogger`] — correlation id per exchange plus "received" /
//!   "handled" debug log entries

pub mod correlation;
pub mod logging;
mod request_log;

use std::future::Future;
use std::sync::Arc;

use crate::handler::{BoxFuture, BoxedEndpoint};
use crate::request::Request;
use crate::response::Response;

pub use correlation::{CorrelationId, CorrelationScope, IdGenerator};
pub use logging::{ChannelSink, LogRecord, LogSink, SinkError, TracingSink};
pub use request_log::RequestLogger;

/// A unit interposed in the request-handling chain.
///
/// Implemented automatically for `async fn(Request, Next) -> Response`.
pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, req: Request, next: Next) -> BoxFuture;
}

impl<F, Fut> Middleware for F
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        Box::pin((self)(req, next))
    }
}

/// Shared, ordered middleware stack.
pub(crate) type Stack = Arc<[Arc<dyn Middleware>]>;

/// The remainder of the chain after the current middleware.
pub struct Next {
    stack: Stack,
    index: usize,
    endpoint: BoxedEndpoint,
}

impl Next {
    pub(crate) fn new(stack: Stack, endpoint: BoxedEndpoint) -> Self {
        Self { stack, index: 0, endpoint }
    }

    /// Forwards `req` down the chain. Resolves once the whole downstream
    /// chain has produced a response.
    pub fn run(mut self, req: Request) -> BoxFuture {
        match self.stack.get(self.index).cloned() {
            Some(middleware) => {
                self.index += 1;
                middleware.handle(req, self)
            }
            None => self.endpoint.call(req),
        }
    }
}
