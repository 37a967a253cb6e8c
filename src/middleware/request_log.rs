//! Correlation + request logging middleware.

use std::sync::Arc;

use tracing::Instrument;

use crate::config::CorrelationConfig;
use crate::handler::BoxFuture;
use crate::middleware::correlation::{CorrelationScope, IdGenerator};
use crate::middleware::logging::{
    emit_entry, LogSink, RequestEcho, RequestLogEntry, ResponseLogEntry, TracingSink,
    REQUEST_HANDLED, REQUEST_RECEIVED,
};
use crate::middleware::{Middleware, Next};
use crate::request::Request;

/// Attaches a correlation id to every exchange and logs it twice.
///
/// Per request:
/// 1. resolve the id (inbound header or generated), store it on the request,
///    emit `"Request received"`;
/// 2. forward to the rest of the chain, inside a `request` span carrying
///    `request_id`;
/// 3. set the correlation header on the response, emit `"Request handled"`.
///
/// A panic in the handler chain is not caught here; the "received" entry
/// has already been emitted by then. Sink failures never affect the
/// response.
///
/// ```rust,no_run
/// use stitch::middleware::RequestLogger;
/// use stitch::{CorrelationConfig, Router};
///
/// let config = CorrelationConfig::from_env().expect("APP_NAME or APP_ENV must be set");
/// let app = Router::new().layer(RequestLogger::new(config));
/// ```
#[derive(Clone)]
pub struct RequestLogger {
    config: Arc<CorrelationConfig>,
    ids: Arc<IdGenerator>,
    sink: Arc<dyn LogSink>,
}

impl RequestLogger {
    /// Logs through [`TracingSink`].
    pub fn new(config: CorrelationConfig) -> Self {
        Self {
            ids: Arc::new(IdGenerator::new(&config)),
            config: Arc::new(config),
            sink: Arc::new(TracingSink),
        }
    }

    pub fn with_sink(mut self, sink: impl LogSink) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    pub fn config(&self) -> &CorrelationConfig { &self.config }
}

impl Middleware for RequestLogger {
    fn handle(&self, mut req: Request, next: Next) -> BoxFuture {
        let RequestLogger { config, ids, sink } = self.clone();

        Box::pin(async move {
            let mut scope = CorrelationScope::new(&ids, config.header());
            let id = scope.resolve_incoming(&mut req);
            emit_entry(&*sink, REQUEST_RECEIVED, &RequestLogEntry::build(&req, &id, &config));

            let echo = RequestEcho::capture(&req);
            let span = tracing::info_span!("request", request_id = %id);
            let mut res = next.run(req).instrument(span).await;

            scope.attach_response(&mut res);
            emit_entry(&*sink, REQUEST_HANDLED, &ResponseLogEntry::build(&res, &echo, &id, &config));
            res
        })
    }
}
