//! Endpoints: the handlers a middleware chain terminates in.
//!
//! A request walks the middleware stack through [`Next`](crate::middleware::Next)
//! until the stack is exhausted, then lands on exactly one endpoint: the
//! matched route's handler, or the router's fallback when nothing matched.
//! Both are stored as [`BoxedEndpoint`], so `Next` does not care which one
//! it holds and 404 responses pass back through the logger like any other.
//!
//! ```text
//! router.get("/users/{id}", show_user)   show_user.into_endpoint()
//! router.fallback(not_found)             not_found.into_endpoint()
//!                  │
//!   Next::run ─▶ RequestLogger ─▶ … ─▶ endpoint.call(req) ─▶ Response
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// Future returned by endpoints and middleware.
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Uniform call interface over every handler type.
#[doc(hidden)]
pub trait Endpoint {
    fn call(&self, req: Request) -> BoxFuture;
}

/// An endpoint shared by every request routed to it.
#[doc(hidden)]
pub type BoxedEndpoint = Arc<dyn Endpoint + Send + Sync + 'static>;

/// Anything usable as a route handler or fallback.
///
/// Satisfied by any `async fn(Request) -> impl IntoResponse` (or closure of
/// that shape). Sealed: there is no way to implement it by hand.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_endpoint(self) -> BoxedEndpoint;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_endpoint(self) -> BoxedEndpoint {
        Arc::new(FnEndpoint(self))
    }
}

struct FnEndpoint<F>(F);

impl<F, Fut, R> Endpoint for FnEndpoint<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}
