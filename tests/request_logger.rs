//! End-to-end tests for the correlation + request logging middleware.
//!
//! Requests are driven through `Router::handle`, so no sockets are involved.
//! Log records are captured with a `ChannelSink`.

use std::collections::HashSet;
use std::sync::Arc;

use http::{HeaderValue, StatusCode};
use stitch::middleware::logging::{NOT_FOUND_PLACEHOLDER, REQUEST_HANDLED, REQUEST_RECEIVED};
use stitch::middleware::{ChannelSink, LogRecord, LogSink, RequestLogger, SinkError};
use stitch::{CorrelationConfig, Request, Response, Router};
use tokio::sync::mpsc;

// ============================================================================
// Test Helper Functions
// ============================================================================

async fn ok_handler(_req: Request) -> &'static str {
    "ok"
}

/// Echoes the correlation id the handler observed.
async fn whoami(req: Request) -> String {
    req.correlation_id().map(|id| id.to_string()).unwrap_or_default()
}

async fn boom(_req: Request) -> &'static str {
    panic!("handler failed")
}

async fn missing_page(_req: Request) -> Response {
    let html = format!("<html><body>{}</body></html>", "<p>nothing here</p>".repeat(2_000));
    Response::builder().status(StatusCode::NOT_FOUND).html(html)
}

fn config() -> CorrelationConfig {
    CorrelationConfig::new("My App", "Production").unwrap()
}

fn create_app(config: CorrelationConfig) -> (Router, mpsc::Receiver<LogRecord>) {
    let (sink, rx) = ChannelSink::new(1_024);
    let app = Router::new()
        .get("/", ok_handler)
        .get("/whoami", whoami)
        .get("/missing", missing_page)
        .layer(RequestLogger::new(config).with_sink(sink));
    (app, rx)
}

fn drain(rx: &mut mpsc::Receiver<LogRecord>) -> Vec<LogRecord> {
    let mut records = Vec::new();
    while let Ok(record) = rx.try_recv() {
        records.push(record);
    }
    records
}

fn get(uri: &str) -> stitch::RequestBuilder {
    Request::builder().uri(uri)
}

// ============================================================================
// Correlation id
// ============================================================================

#[tokio::test]
async fn test_inbound_id_is_passed_through() {
    // Given: a request carrying its own correlation id
    let (app, mut rx) = create_app(config());
    let req = get("/").header("x-request-id", "abc-123").empty();

    // When: the handler returns 200 "ok"
    let res = app.handle(req).await;

    // Then: the id is echoed and both entries carry it
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(res.header("x-request-id"), Some("abc-123"));

    let records = drain(&mut rx);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].message, REQUEST_RECEIVED);
    assert_eq!(records[0].level, tracing::Level::DEBUG);
    assert_eq!(records[0].fields["requestId"], "abc-123");
    assert_eq!(records[1].message, REQUEST_HANDLED);
    assert_eq!(records[1].fields["requestId"], "abc-123");
    assert_eq!(records[1].fields["clientResponseBody"], "ok");
    assert_eq!(records[1].fields["clientStatus"], 200);
}

#[tokio::test]
async fn test_generated_id_uses_app_and_env_slugs() {
    let (app, mut rx) = create_app(config());

    let res = app.handle(get("/").empty()).await;

    let id = res.header("x-request-id").unwrap().to_owned();
    assert!(id.starts_with("my-app/production/"), "{id}");
    assert!(id.len() > "my-app/production/".len());

    let records = drain(&mut rx);
    assert_eq!(records[0].fields["requestId"], id.as_str());
    assert_eq!(records[1].fields["requestId"], id.as_str());
    assert_eq!(records[0].fields["environment"], "Production");
}

#[tokio::test]
async fn test_handler_sees_same_id_as_response() {
    let (app, _rx) = create_app(config());

    let res = app.handle(get("/whoami").empty()).await;

    let header = res.header("x-request-id").unwrap();
    assert_eq!(res.body().as_ref(), header.as_bytes());
    assert_eq!(res.correlation_id().map(|id| id.as_str()), Some(header));
}

#[tokio::test]
async fn test_generated_id_is_visible_in_request_headers() {
    let (app, mut rx) = create_app(config());

    let res = app.handle(get("/").empty()).await;

    let id = res.header("x-request-id").unwrap();
    let records = drain(&mut rx);
    assert_eq!(records[0].fields["requestHeaders"]["x-request-id"][0], id);
}

#[tokio::test]
async fn test_non_utf8_inbound_id_is_echoed_byte_for_byte() {
    // Given: an inbound id carrying obs-text, valid on the wire but not UTF-8
    let (app, mut rx) = create_app(config());
    let mut req = get("/").empty();
    req.headers_mut().insert("x-request-id", HeaderValue::from_bytes(b"trace-\xe9-1").unwrap());

    // When
    let res = app.handle(req).await;

    // Then: the exact bytes come back, the logs carry the lossy text form
    let echoed = res.headers().get("x-request-id").unwrap();
    assert_eq!(echoed.as_bytes(), b"trace-\xe9-1");

    let records = drain(&mut rx);
    assert_eq!(records[0].fields["requestId"], "trace-\u{fffd}-1");
    assert_eq!(records[1].fields["requestId"], "trace-\u{fffd}-1");
}

#[tokio::test]
async fn test_blank_inbound_id_is_replaced_everywhere() {
    // Given: a request whose correlation header is present but blank
    let (app, mut rx) = create_app(config());
    let req = get("/whoami").header("x-request-id", " ").empty();

    // When
    let res = app.handle(req).await;

    // Then: handler, request headers, logs and response all agree on one id
    let id = res.header("x-request-id").unwrap();
    assert!(id.starts_with("my-app/production/"), "{id}");
    assert_eq!(res.body().as_ref(), id.as_bytes());

    let records = drain(&mut rx);
    assert_eq!(records[0].fields["requestId"], id);
    assert_eq!(records[0].fields["requestHeaders"]["x-request-id"], serde_json::json!([id]));
}

#[tokio::test]
async fn test_handler_header_is_overwritten() {
    let (sink, _rx) = ChannelSink::new(16);
    let app = Router::new()
        .get("/", |_req: Request| async {
            Response::builder().header("x-request-id", "from-handler").text("ok")
        })
        .layer(RequestLogger::new(config()).with_sink(sink));

    let res = app.handle(get("/").header("x-request-id", "from-caller").empty()).await;

    assert_eq!(res.headers().get_all("x-request-id").iter().count(), 1);
    assert_eq!(res.header("x-request-id"), Some("from-caller"));
}

#[tokio::test]
async fn test_custom_header_name() {
    let config = config().with_header("X-Correlation-Id").unwrap();
    let (app, _rx) = create_app(config);

    let res = app.handle(get("/").header("x-correlation-id", "trace-9").empty()).await;

    assert_eq!(res.header("x-correlation-id"), Some("trace-9"));
    assert!(res.header("x-request-id").is_none());
}

#[tokio::test]
async fn test_concurrent_requests_get_distinct_ids() {
    // Given: N requests in flight at once, none carrying an id
    const N: usize = 256;
    let (app, _rx) = create_app(config());
    let app = Arc::new(app);

    // When: they all run concurrently
    let tasks: Vec<_> = (0..N)
        .map(|_| {
            let app = Arc::clone(&app);
            tokio::spawn(async move {
                let res = app.handle(get("/").empty()).await;
                res.header("x-request-id").unwrap().to_owned()
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for task in tasks {
        ids.insert(task.await.unwrap());
    }

    // Then: every id is distinct
    assert_eq!(ids.len(), N);
}

// ============================================================================
// Log entries
// ============================================================================

#[tokio::test]
async fn test_not_found_body_is_redacted() {
    let (app, mut rx) = create_app(config());

    let res = app.handle(get("/missing").empty()).await;

    assert!(res.is_not_found());
    assert!(res.body().len() > 10_000);

    let records = drain(&mut rx);
    assert_eq!(records[1].fields["clientStatus"], 404);
    assert_eq!(records[1].fields["clientResponseBody"], NOT_FOUND_PLACEHOLDER);
}

#[tokio::test]
async fn test_unmatched_route_is_logged_and_redacted() {
    let (app, mut rx) = create_app(config());

    let res = app.handle(get("/no/such/route").empty()).await;

    assert!(res.is_not_found());
    assert!(res.header("x-request-id").is_some());

    let records = drain(&mut rx);
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].fields["clientResponseBody"], NOT_FOUND_PLACEHOLDER);
}

#[tokio::test]
async fn test_request_entry_fields() {
    let (app, mut rx) = create_app(config());
    let req = Request::builder()
        .method(http::Method::POST)
        .uri("/whoami")
        .header("host", "api.example.com")
        .header("user-agent", "integration/1.0")
        .header("content-type", "application/json; charset=utf-8")
        .header("x-forwarded-for", "203.0.113.9")
        .header("authorization", "Bearer s3cret")
        .body(r#"{"name":"alice"}"#);

    // POST /whoami is unrouted; the entry is still complete.
    app.handle(req).await;

    let records = drain(&mut rx);
    let received = &records[0].fields;
    assert_eq!(received["requestQuery"], "/whoami");
    assert_eq!(received["requestMethod"], "POST");
    assert_eq!(received["requestHostname"], "api.example.com");
    assert_eq!(received["ip"], "203.0.113.9");
    assert_eq!(received["userAgent"], "integration/1.0");
    assert_eq!(received["contentType"], "application/json");
    assert_eq!(received["requestHeaders"]["authorization"][0], "<redacted>");

    let handled = &records[1].fields;
    assert_eq!(handled["clientRequestBody"], r#"{"name":"alice"}"#);
    assert_eq!(handled["clientRequestHeaders"]["user-agent"][0], "integration/1.0");
}

#[tokio::test]
async fn test_route_params_are_logged() {
    let (sink, mut rx) = ChannelSink::new(16);
    let app = Router::new()
        .get("/users/{id}", ok_handler)
        .layer(RequestLogger::new(config()).with_sink(sink));

    app.handle(get("/users/42").empty()).await;

    let records = drain(&mut rx);
    assert_eq!(records[0].fields["requestParams"]["id"], "42");
}

#[tokio::test]
async fn test_elapsed_time_is_rounded() {
    let (app, mut rx) = create_app(config());

    app.handle(get("/").empty()).await;

    let records = drain(&mut rx);
    let elapsed = records[1].fields["timeSinceStart"].as_f64().unwrap();
    assert!(elapsed >= 0.0);
    let scaled = elapsed * 100_000.0;
    assert!((scaled - scaled.round()).abs() < 1e-6, "{elapsed}");
}

// ============================================================================
// Failure isolation
// ============================================================================

struct FailingSink;

impl LogSink for FailingSink {
    fn emit(&self, _record: LogRecord) -> Result<(), SinkError> {
        Err(SinkError::Unavailable("collector down".into()))
    }
}

#[tokio::test]
async fn test_sink_failure_does_not_fail_request() {
    let app = Router::new()
        .get("/", ok_handler)
        .layer(RequestLogger::new(config()).with_sink(FailingSink));

    let res = app.handle(get("/").header("x-request-id", "abc-123").empty()).await;

    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(res.body().as_ref(), b"ok");
    assert_eq!(res.header("x-request-id"), Some("abc-123"));
}

#[tokio::test]
async fn test_handler_panic_propagates_after_received_entry() {
    // Given: a handler that blows up
    let (sink, mut rx) = ChannelSink::new(16);
    let app = Arc::new(
        Router::new()
            .get("/boom", boom)
            .layer(RequestLogger::new(config()).with_sink(sink)),
    );

    // When: the request runs in its own task
    let app_task = Arc::clone(&app);
    let joined = tokio::spawn(async move { app_task.handle(get("/boom").empty()).await }).await;

    // Then: the panic is not swallowed, "received" was emitted, "handled" was not
    assert!(matches!(joined, Err(ref e) if e.is_panic()));
    let records = drain(&mut rx);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].message, REQUEST_RECEIVED);
}
