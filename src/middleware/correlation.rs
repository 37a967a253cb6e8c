//! Correlation-id resolution and generation.
//!
//! Every exchange carries exactly one [`CorrelationId`]. An id supplied by
//! the caller in the configured header is authoritative; otherwise one is
//! generated as
//!
//! ```text
//! <slug(app name)>/<slug(app env)>/<micros:13 hex>.<random:16 hex>
//! my-app/production/5f2a1c9e3b4d1.9c1e0f7a22d4b6e3
//! ```
//!
//! Two generated ids collide only if they are minted in the same microsecond
//! *and* draw the same 64-bit random value, roughly 2⁻⁶⁴ per such pair.
//!
//! Memoization lives in a [`CorrelationScope`], created fresh for every
//! middleware invocation. [`IdGenerator`] itself is stateless and shared.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use http::{HeaderName, HeaderValue};
use serde::{Serialize, Serializer};

use crate::config::CorrelationConfig;
use crate::request::Request;
use crate::response::Response;

/// Placeholder segment for a name or env that slugs to nothing.
const EMPTY_SEGMENT: &str = "unknown";

/// Identifier shared by one request/response exchange.
///
/// An id taken from the inbound header keeps the exact header bytes, so it
/// is echoed back byte-for-byte even when it carries obs-text (0x80–0xFF).
/// [`as_str`](CorrelationId::as_str) is the UTF-8 (lossy) form used in logs.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CorrelationId {
    text: String,
    raw: Option<HeaderValue>,
}

impl CorrelationId {
    fn generated(text: String) -> Self {
        Self { text, raw: None }
    }

    fn from_header(value: &HeaderValue) -> Self {
        Self {
            text: String::from_utf8_lossy(value.as_bytes()).into_owned(),
            raw: Some(value.clone()),
        }
    }

    pub fn as_str(&self) -> &str { &self.text }

    /// The bytes written to the correlation header.
    pub fn as_bytes(&self) -> &[u8] {
        self.raw.as_ref().map_or(self.text.as_bytes(), HeaderValue::as_bytes)
    }

    fn header_value(&self) -> Option<HeaderValue> {
        match &self.raw {
            Some(raw) => Some(raw.clone()),
            None => HeaderValue::from_str(&self.text).ok(),
        }
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Serialize for CorrelationId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

/// Empty or whitespace-only header values carry no id.
fn is_blank(value: &HeaderValue) -> bool {
    value.as_bytes().iter().all(u8::is_ascii_whitespace)
}

/// Lower-cases `input` and collapses every run of non-alphanumeric ASCII
/// into a single `-`, trimming dashes at both ends.
///
/// The output never contains `/` or whitespace, so it is safe inside a
/// header value and as a path-like id segment.
///
/// ```rust
/// use stitch::middleware::correlation::slugify;
///
/// assert_eq!(slugify("My App"), "my-app");
/// assert_eq!(slugify("  EU/West_1 "), "eu-west-1");
/// ```
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

// ── IdGenerator ───────────────────────────────────────────────────────────────

/// Mints fresh correlation ids. Holds only the slugged prefix, so one
/// instance is shared by every concurrent request.
#[derive(Clone, Debug)]
pub struct IdGenerator {
    prefix: String,
}

impl IdGenerator {
    pub fn new(config: &CorrelationConfig) -> Self {
        let segment = |raw: &str| {
            let slug = slugify(raw);
            if slug.is_empty() { EMPTY_SEGMENT.to_owned() } else { slug }
        };

        Self {
            prefix: format!("{}/{}/", segment(config.app_name()), segment(config.app_env())),
        }
    }

    /// `"<app>/<env>/"`.
    pub fn prefix(&self) -> &str { &self.prefix }

    /// A new id on every call. Use [`CorrelationScope`] for per-exchange reuse.
    pub fn generate(&self) -> CorrelationId {
        CorrelationId::generated(format!("{}{}", self.prefix, unique_suffix()))
    }
}

/// Microseconds since the epoch (13 hex digits, like PHP's `uniqid`) and a
/// 64-bit random draw.
fn unique_suffix() -> String {
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros())
        .unwrap_or_default();
    format!("{micros:013x}.{:016x}", rand::random::<u64>())
}

// ── CorrelationScope ──────────────────────────────────────────────────────────

/// The correlation-id slot of one middleware invocation.
///
/// Resolves the id at most once; every later read returns the same value.
/// Never store a scope beyond the exchange it was created for.
pub struct CorrelationScope<'a> {
    generator: &'a IdGenerator,
    header: &'a HeaderName,
    id: Option<CorrelationId>,
}

impl<'a> CorrelationScope<'a> {
    pub fn new(generator: &'a IdGenerator, header: &'a HeaderName) -> Self {
        Self { generator, header, id: None }
    }

    /// The id for this exchange, generating one on first use.
    pub fn id(&mut self) -> CorrelationId {
        let generator = self.generator;
        self.id.get_or_insert_with(|| generator.generate()).clone()
    }

    /// Resolves the id from the inbound header, falling back to a generated
    /// one, and stores it in the request extensions.
    ///
    /// Any non-blank inbound value is kept as-is. When the request's header
    /// does not already hold the resolved id (absent, blank, or a generated
    /// id replacing it) the header is rewritten, so handlers that forward
    /// headers upstream propagate the same id the logs carry.
    pub fn resolve_incoming(&mut self, req: &mut Request) -> CorrelationId {
        if self.id.is_none() {
            self.id = req
                .headers()
                .get(self.header)
                .filter(|v| !is_blank(v))
                .map(CorrelationId::from_header);
        }

        let id = self.id();
        if let Some(value) = id.header_value() {
            if req.headers().get(self.header) != Some(&value) {
                req.headers_mut().insert(self.header.clone(), value);
            }
        }
        req.extensions_mut().insert(id.clone());
        id
    }

    /// Sets the correlation header on `res`, replacing whatever a handler
    /// put there, and stores the id in the response extensions.
    pub fn attach_response(&mut self, res: &mut Response) -> CorrelationId {
        let id = self.id();
        match id.header_value() {
            Some(value) => res.set_header(self.header.clone(), value),
            None => tracing::warn!(request_id = %id, "correlation id is not a valid header value"),
        }
        res.extensions_mut().insert(id.clone());
        id
    }
}
