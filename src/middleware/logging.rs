//! Structured request/response log entries and the sinks they go to.
//!
//! Two entries are produced per exchange:
//!
//! | Message | Built from | When |
//! |---|---|---|
//! | `"Request received"` | [`RequestLogEntry`] | before the handler runs |
//! | `"Request handled"` | [`ResponseLogEntry`] | after the response comes back |
//!
//! Field names are camelCase on the wire (`requestId`, `clientResponseBody`,
//! …). Values of sensitive headers are replaced with [`REDACTED`], and a
//! `404` response body is replaced with [`NOT_FOUND_PLACEHOLDER`].

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::{HeaderMap, HeaderName};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::Level;

use crate::config::CorrelationConfig;
use crate::middleware::correlation::CorrelationId;
use crate::request::Request;
use crate::response::Response;

pub const REQUEST_RECEIVED: &str = "Request received";
pub const REQUEST_HANDLED: &str = "Request handled";

/// Logged instead of the body of a `404` response.
pub const NOT_FOUND_PLACEHOLDER: &str = "<>";

/// Logged instead of the value of a redacted header.
pub const REDACTED: &str = "<redacted>";

/// Decimal digits kept in `timeSinceStart`.
const ELAPSED_DIGITS: i32 = 5;

/// Header name → every value sent under that name, ordered by name.
pub type HeaderFields = BTreeMap<String, Vec<String>>;

// ── Entries ───────────────────────────────────────────────────────────────────

/// Pre-handling snapshot of the inbound request.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestLogEntry {
    pub environment: String,
    pub request_query: String,
    pub request_headers: HeaderFields,
    pub request_params: BTreeMap<String, String>,
    pub request_hostname: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub content_type: Option<String>,
    pub request_id: CorrelationId,
    pub request_method: String,
}

impl RequestLogEntry {
    /// Reads `req` without modifying it. Call after the correlation id has
    /// been resolved so `requestHeaders` reflects what the handler will see.
    pub fn build(req: &Request, id: &CorrelationId, config: &CorrelationConfig) -> Self {
        Self {
            environment: config.app_env().to_owned(),
            request_query: req.path().to_owned(),
            request_headers: header_fields(req.headers(), config.redacted_headers()),
            request_params: req.params().iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            request_hostname: req.host().map(str::to_owned),
            ip: req.client_ip().map(|ip| ip.to_string()),
            user_agent: req.user_agent().map(str::to_owned),
            content_type: req.content_type().map(str::to_owned),
            request_id: id.clone(),
            request_method: req.method().to_string(),
        }
    }
}

/// The parts of a request the "handled" entry echoes back.
///
/// The request itself moves into the handler chain, so these are captured
/// beforehand. Cloning is cheap: `Bytes` is reference-counted.
#[derive(Clone, Debug)]
pub struct RequestEcho {
    pub headers: HeaderMap,
    pub body: Bytes,
    pub started_at: Instant,
}

impl RequestEcho {
    pub fn capture(req: &Request) -> Self {
        Self {
            headers: req.headers().clone(),
            body: req.body().clone(),
            started_at: req.started_at(),
        }
    }
}

/// Post-handling summary of the exchange.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseLogEntry {
    pub client_status: u16,
    pub client_response_headers: HeaderFields,
    pub client_request_body: String,
    pub client_request_headers: HeaderFields,
    pub client_response_body: String,
    pub time_since_start: f64,
    pub request_id: CorrelationId,
}

impl ResponseLogEntry {
    pub fn build(
        res: &Response,
        request: &RequestEcho,
        id: &CorrelationId,
        config: &CorrelationConfig,
    ) -> Self {
        let redacted = config.redacted_headers();

        // Generic not-found pages would otherwise flood the log.
        let client_response_body = if res.is_not_found() {
            NOT_FOUND_PLACEHOLDER.to_owned()
        } else {
            String::from_utf8_lossy(res.body()).into_owned()
        };

        Self {
            client_status: res.status_code().as_u16(),
            client_response_headers: header_fields(res.headers(), redacted),
            client_request_body: String::from_utf8_lossy(&request.body).into_owned(),
            client_request_headers: header_fields(&request.headers, redacted),
            client_response_body,
            time_since_start: round_seconds(request.started_at.elapsed()),
            request_id: id.clone(),
        }
    }
}

fn header_fields(headers: &HeaderMap, redacted: &[HeaderName]) -> HeaderFields {
    let mut fields = HeaderFields::new();
    for (name, value) in headers {
        let value = if redacted.contains(name) {
            REDACTED.to_owned()
        } else {
            String::from_utf8_lossy(value.as_bytes()).into_owned()
        };
        fields.entry(name.as_str().to_owned()).or_default().push(value);
    }
    fields
}

/// Fractional seconds rounded to [`ELAPSED_DIGITS`] decimals.
pub fn round_seconds(elapsed: Duration) -> f64 {
    let scale = 10f64.powi(ELAPSED_DIGITS);
    (elapsed.as_secs_f64() * scale).round() / scale
}

// ── Sinks ─────────────────────────────────────────────────────────────────────

/// One structured log record.
#[derive(Clone, Debug)]
pub struct LogRecord {
    pub level: Level,
    pub message: &'static str,
    pub fields: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

/// Destination for log records.
///
/// `emit` is called on the request path and must not block. Failures are
/// reported to the caller, which treats them as best-effort: they never turn
/// into request failures.
pub trait LogSink: Send + Sync + 'static {
    fn emit(&self, record: LogRecord) -> Result<(), SinkError>;
}

/// Emits each record as a `tracing` event on target `stitch::request`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, record: LogRecord) -> Result<(), SinkError> {
        let LogRecord { level, message, fields } = record;
        let request_id = fields.get("requestId").and_then(|v| v.as_str()).unwrap_or_default();

        // `tracing` levels are compile-time constants per callsite.
        match level {
            Level::ERROR => tracing::error!(target: "stitch::request", request_id, %fields, "{message}"),
            Level::WARN  => tracing::warn!(target: "stitch::request", request_id, %fields, "{message}"),
            Level::INFO  => tracing::info!(target: "stitch::request", request_id, %fields, "{message}"),
            Level::DEBUG => tracing::debug!(target: "stitch::request", request_id, %fields, "{message}"),
            _            => tracing::trace!(target: "stitch::request", request_id, %fields, "{message}"),
        }
        Ok(())
    }
}

/// Hands records to a bounded channel for a background consumer (a shipper
/// task, a test). A full or closed channel drops the record.
#[derive(Clone, Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<LogRecord>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<LogRecord>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl LogSink for ChannelSink {
    fn emit(&self, record: LogRecord) -> Result<(), SinkError> {
        self.tx.try_send(record).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SinkError::Unavailable("channel full".into()),
            mpsc::error::TrySendError::Closed(_) => SinkError::Unavailable("channel closed".into()),
        })
    }
}

/// Serializes `entry` and sends it to `sink` at debug level.
///
/// Never fails: a sink error goes to stderr, outside the request path.
pub(crate) fn emit_entry<T: Serialize>(sink: &dyn LogSink, message: &'static str, entry: &T) {
    let result = serde_json::to_value(entry)
        .map_err(SinkError::from)
        .and_then(|fields| sink.emit(LogRecord { level: Level::DEBUG, message, fields }));

    if let Err(e) = result {
        eprintln!("stitch: dropped `{message}` log entry: {e}");
    }
}
