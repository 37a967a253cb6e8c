//! Radix-tree request router with a middleware stack.
//!
//! One tree per HTTP method. O(path-length) lookup. Every request, matched
//! or not, passes through the full middleware stack; unmatched requests end
//! at the fallback handler.

use std::collections::HashMap;
use std::sync::Arc;

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;

use crate::handler::{BoxedEndpoint, Handler};
use crate::middleware::{Middleware, Next, Stack};
use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve)
/// or drive it directly with [`Router::handle`]. Every builder method
/// returns `self` so registrations chain naturally.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedEndpoint>>,
    stack: Stack,
    fallback: BoxedEndpoint,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            stack: Vec::new().into(),
            fallback: not_found.into_endpoint(),
        }
    }

    /// Register a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax — `req.param("name")` retrieves them:
    ///
    /// ```rust,no_run
    /// # use stitch::{Request, Response, Router};
    /// # use http::Method;
    /// # async fn get_user(_: Request) -> Response { Response::text("") }
    /// # async fn purge(_: Request) -> Response { Response::text("") }
    /// Router::new()
    ///     .get("/users/{id}", get_user)
    ///     .on(Method::from_bytes(b"PURGE").unwrap(), "/cache/{key}", purge);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics on an invalid or conflicting route pattern. Routes are fixed
    /// at startup, so this surfaces as a boot failure.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_endpoint())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    /// Appends a middleware. Middleware runs in registration order: the
    /// first one registered sees the request first and the response last.
    pub fn layer(mut self, middleware: impl Middleware) -> Self {
        let mut stack = self.stack.to_vec();
        stack.push(Arc::new(middleware));
        self.stack = stack.into();
        self
    }

    /// Replaces the handler for requests no route matches (default: `404`).
    pub fn fallback(mut self, handler: impl Handler) -> Self {
        self.fallback = handler.into_endpoint();
        self
    }

    /// Routes one request through the middleware stack to its handler.
    pub async fn handle(&self, mut req: Request) -> Response {
        let endpoint = match self.lookup(req.method(), req.path()) {
            Some((handler, params)) => {
                req.params = params;
                handler
            }
            None => Arc::clone(&self.fallback),
        };

        Next::new(Arc::clone(&self.stack), endpoint).run(req).await
    }

    fn lookup(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(BoxedEndpoint, HashMap<String, String>)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

async fn not_found(_req: Request) -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}
