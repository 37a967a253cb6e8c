//! Incoming HTTP request type.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Instant;

use bytes::Bytes;
use http::{Extensions, HeaderMap, HeaderName, HeaderValue, Method, Uri};

use crate::middleware::correlation::CorrelationId;

/// An incoming HTTP request.
///
/// Besides the wire data, a request carries two pieces of per-exchange
/// context: an [`Extensions`] map that middleware uses to hand values to
/// handlers further down the chain, and the instant the server started
/// processing it.
pub struct Request {
    pub(crate) method: Method,
    pub(crate) uri: Uri,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) params: HashMap<String, String>,
    pub(crate) remote_addr: Option<SocketAddr>,
    pub(crate) started_at: Instant,
    pub(crate) extensions: Extensions,
}

impl Request {
    /// Builder for requests that do not come off a socket: tests, replays,
    /// embedding the router in another server.
    pub fn builder() -> RequestBuilder {
        RequestBuilder {
            method: Method::GET,
            uri: Uri::from_static("/"),
            headers: HeaderMap::new(),
            remote_addr: None,
            started_at: None,
        }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
    pub fn body(&self) -> &Bytes { &self.body }
    pub fn params(&self) -> &HashMap<String, String> { &self.params }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    /// When the server began processing this request.
    pub fn started_at(&self) -> Instant { self.started_at }

    pub fn extensions(&self) -> &Extensions { &self.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.extensions }

    /// Header lookup. Names are case-insensitive; non-UTF-8 values read as `None`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// The `Host` header, falling back to the URI authority.
    pub fn host(&self) -> Option<&str> {
        self.header("host")
            .or_else(|| self.uri.authority().map(|a| a.as_str()))
    }

    /// The originating client address.
    ///
    /// Behind a reverse proxy the socket peer is the proxy itself, so the
    /// first `X-Forwarded-For` hop wins, then `X-Real-IP`, then the peer.
    pub fn client_ip(&self) -> Option<IpAddr> {
        let forwarded = self
            .header("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse().ok());

        forwarded
            .or_else(|| self.header("x-real-ip").and_then(|v| v.trim().parse().ok()))
            .or_else(|| self.remote_addr.map(|a| a.ip()))
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.header("user-agent")
    }

    /// Media type of the body, without parameters: `application/json` for
    /// `application/json; charset=utf-8`.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
            .and_then(|v| v.split(';').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// The correlation id attached by
    /// [`RequestLogger`](crate::middleware::RequestLogger), if it ran.
    pub fn correlation_id(&self) -> Option<&CorrelationId> {
        self.extensions.get::<CorrelationId>()
    }
}

// ── RequestBuilder ────────────────────────────────────────────────────────────

/// Fluent builder for [`Request`]. Defaults to `GET /` with no headers.
pub struct RequestBuilder {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    remote_addr: Option<SocketAddr>,
    started_at: Option<Instant>,
}

impl RequestBuilder {
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets the request target. An unparsable URI leaves the previous one.
    pub fn uri(mut self, uri: &str) -> Self {
        if let Ok(uri) = uri.parse() {
            self.uri = uri;
        }
        self
    }

    /// Appends a header. Invalid names or values are skipped.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Overrides the processing start instant. Defaults to "now" at `body`.
    pub fn started_at(mut self, at: Instant) -> Self {
        self.started_at = Some(at);
        self
    }

    pub fn body(self, body: impl Into<Bytes>) -> Request {
        Request {
            method: self.method,
            uri: self.uri,
            headers: self.headers,
            body: body.into(),
            params: HashMap::new(),
            remote_addr: self.remote_addr,
            started_at: self.started_at.unwrap_or_else(Instant::now),
            extensions: Extensions::new(),
        }
    }

    pub fn empty(self) -> Request {
        self.body(Bytes::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_ip_prefers_first_forwarded_hop() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.2")
            .header("x-real-ip", "198.51.100.1")
            .remote_addr("10.0.0.2:51000".parse().unwrap())
            .empty();
        assert_eq!(req.client_ip(), Some("203.0.113.7".parse().unwrap()));
    }

    #[test]
    fn client_ip_falls_back_to_peer() {
        let req = Request::builder()
            .header("x-forwarded-for", "garbage")
            .remote_addr("127.0.0.1:4000".parse().unwrap())
            .empty();
        assert_eq!(req.client_ip(), Some("127.0.0.1".parse().unwrap()));
    }

    #[test]
    fn content_type_strips_parameters() {
        let req = Request::builder()
            .header("content-type", "application/json; charset=utf-8")
            .empty();
        assert_eq!(req.content_type(), Some("application/json"));
    }

    #[test]
    fn host_falls_back_to_authority() {
        let req = Request::builder().uri("http://api.example.com/users").empty();
        assert_eq!(req.host(), Some("api.example.com"));
        assert_eq!(req.path(), "/users");

        let req = Request::builder().header("host", "internal:8080").empty();
        assert_eq!(req.host(), Some("internal:8080"));
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let req = Request::builder().header("X-Request-Id", "abc").empty();
        assert_eq!(req.header("x-request-id"), Some("abc"));
        assert!(req.correlation_id().is_none());
    }
}
