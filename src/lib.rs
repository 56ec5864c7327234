//! Request-scoped JSON logger and correlation middleware for actix-web.
//!
//! Every log call writes one JSON line made of a timestamp, a level, the
//! logger's bound context, an optional per-call context and the message.
//! Contexts are flattened into the record, there are no nested objects:
//!
//! ```json
//! {"time":"2017-09-21T10:02:28.427Z","lvl":"INFO","trans":"5c1a...","corr":"5c1a...","svc":"users","method":"GET","path":"/users","msg":"Request"}
//! ```
//!
//! # Examples:
//! ## Logging outside a request
//! ```rust
//! use actix_web_middleware_ctxlog::{LogContext, Logger};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct DemoContext {
//!     #[serde(rename = "feat")]
//!     feature: u32,
//! }
//!
//! let mut logger = Logger::new();
//! logger.set_log_context(LogContext::new("logger", "demo"));
//! logger.info("Logging without context");
//! logger.warn(format_args!("Logging with {} {}", 2, "arguments"));
//! logger.info_with(&DemoContext { feature: 3 }, "Logging with context");
//! ```
//!
//! ## Middlewares
//! [`WithLogContext`] creates the logger of each request, with a fresh
//! transaction id and the correlator received in the `Unica-Correlator`
//! header (or a new one). [`WithLog`] logs a `Request` and a `Response`
//! record around the handler. Actix runs the last registered middleware
//! first, so `WithLogContext` is registered after `WithLog`:
//! ```rust,no_run
//! use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
//! use actix_web_middleware_ctxlog::{
//!     Error, LogContext, RequestLogger, WithLog, WithLogContext, reply_with_error,
//! };
//!
//! async fn users(req: HttpRequest, logger: RequestLogger) -> HttpResponse {
//!     logger.debug("listing users");
//!     let err = Error::invalid_request("missing filter", "filter is required");
//!     reply_with_error(&req, &err)
//! }
//!
//! #[actix_web::main]
//! async fn main() -> std::io::Result<()> {
//!     HttpServer::new(|| {
//!         App::new()
//!             .wrap(WithLog::default().exclude("/health"))
//!             .wrap(WithLogContext::new(LogContext::new("users", "api")))
//!             .route("/users", web::get().to(users))
//!             .route("/health", web::get().to(|| async { "ok" }))
//!     })
//!     .bind("127.0.0.1:8080")?
//!     .run()
//!     .await
//! }
//! ```
//!
//! # Log record fields
//!
//! - `time` - UTC timestamp with milliseconds
//! - `lvl` - `DEBUG`, `INFO`, `WARN`, `ERROR` or `FATAL`
//! - `trans` - transaction id, unique per request and service
//! - `corr` - correlator, shared by all the services of a flow
//! - `op`, `svc`, `comp`, `user`, `realm`, `alarm` - [`LogContext`] fields
//! - `method`, `path`, `remoteaddr` - `Request` records
//! - `status`, `latency` (milliseconds), `location` - `Response` records
//! - `msg` - message
//!
//! Empty fields are omitted.
//!
//! # Feature Flags
//!
//! - `log` (default) - Bridge from the standard `log` crate, see [`rust_log`]
//! - `uuid_v4` (default) - UUIDv4 transaction ids
//! - `uuid_v7` - Use UUIDv7 instead of UUIDv4 for transaction ids

mod context;
mod error;
mod level;
mod logger;
mod middleware;
mod record;
#[cfg(test)]
mod testing;
mod wrapper;

pub use crate::context::{CorrelationContext, LogContext, ReqLogContext, RespLogContext};
pub use crate::error::{Error, reply_with_error, write_json};
pub use crate::level::{LOG_LEVEL_NAMES, Level, ParseLevelError, default_level, set_default_level};
pub use crate::logger::{LogWriter, Logger};
pub use crate::middleware::{
    CORRELATOR_HTTP_HEADER, REQUEST_LOG_MESSAGE, RESPONSE_LOG_MESSAGE, RequestLogger, WithLog,
    WithLogContext, WithLogContextService, WithLogResponse, WithLogService, get_log_context,
    get_logger,
};
pub use crate::record::{BoundContext, ComposeError, Fields, compose, format_time};
#[cfg(feature = "log")]
pub use crate::wrapper::rust_log;
