use std::{
    fmt,
    io::{self, Write},
    sync::{Arc, Mutex, PoisonError},
};

use actix_web::{HttpRequest, HttpResponse};
use serde::Serialize;
use time::OffsetDateTime;

use crate::level::{Level, default_level};
use crate::record::{BoundContext, Fields, compose};

/// Output sink shared by one or more loggers.
///
/// Every record is written while holding the sink's lock, so records from
/// loggers sharing a `LogWriter` never interleave.
#[derive(Clone)]
pub struct LogWriter(Arc<Mutex<Box<dyn Write + Send>>>);

impl LogWriter {
    pub fn new<W: Write + Send + 'static>(out: W) -> Self {
        LogWriter(Arc::new(Mutex::new(Box::new(out))))
    }

    pub fn stdout() -> Self {
        LogWriter::new(io::stdout())
    }

    /// Whether both handles point to the same sink.
    pub fn same_sink(&self, other: &LogWriter) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn write_record(&self, record: &[u8]) {
        let mut out = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = out.write_all(record).and_then(|()| out.flush());
    }
}

impl Default for LogWriter {
    fn default() -> Self {
        LogWriter::stdout()
    }
}

impl fmt::Debug for LogWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LogWriter").finish_non_exhaustive()
    }
}

/// JSON line logger.
///
/// Each emission writes one record made of the timestamp, the level, the
/// bound context, an optional per-call context and the message.
///
/// # Examples
/// ```rust
/// use actix_web_middleware_ctxlog::{LogContext, Logger};
///
/// let mut logger = Logger::new();
/// logger.set_log_context(LogContext::new("logger", "demo"));
/// logger.info("Logging without context");
/// logger.warn(format_args!("Logging with {} {}", 2, "arguments"));
/// ```
#[derive(Clone)]
pub struct Logger {
    out: LogWriter,
    level: Level,
    context: Option<Arc<dyn BoundContext>>,
}

impl Default for Logger {
    fn default() -> Self {
        Logger::new()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.level)
            .field("context", &self.context.is_some())
            .finish_non_exhaustive()
    }
}

impl Logger {
    /// Logger writing to stdout at the current [default level](crate::set_default_level).
    pub fn new() -> Self {
        Logger::with_level(default_level())
    }

    pub fn with_level(level: Level) -> Self {
        Logger {
            out: LogWriter::stdout(),
            level,
            context: None,
        }
    }

    pub fn writer(&self) -> &LogWriter {
        &self.out
    }

    pub fn set_writer(&mut self, out: LogWriter) {
        self.out = out;
    }

    pub fn level(&self) -> Level {
        self.level
    }

    /// Canonical name of the configured level.
    pub fn level_name(&self) -> &'static str {
        self.level.as_str()
    }

    /// Sets the level by case-insensitive name. Unknown names select `INFO`.
    pub fn set_level(&mut self, name: &str) {
        self.level = Level::from_name(name);
    }

    pub fn set_log_level(&mut self, level: Level) {
        self.level = level;
    }

    /// Replaces the bound context.
    pub fn set_log_context<T>(&mut self, context: T)
    where
        T: Serialize + Send + Sync + 'static,
    {
        self.context = Some(Arc::new(context));
    }

    pub fn clear_log_context(&mut self) {
        self.context = None;
    }

    pub fn log_context(&self) -> Option<&dyn BoundContext> {
        self.context.as_deref()
    }

    /// Bound context, if it is a `T`.
    pub fn context_as<T: 'static>(&self) -> Option<&T> {
        self.context.as_deref()?.as_any().downcast_ref()
    }

    pub fn enabled(&self, level: Level) -> bool {
        level >= self.level
    }

    pub fn log(&self, level: Level, message: impl fmt::Display) {
        self.emit(level, None, &message);
    }

    pub fn log_with<C: Serialize>(&self, level: Level, context: &C, message: impl fmt::Display) {
        self.emit(level, Some(context), &message);
    }

    fn emit(&self, level: Level, extra: Option<&dyn Fields>, message: &dyn fmt::Display) {
        if !self.enabled(level) {
            return;
        }
        let mut buf = Vec::with_capacity(256);
        let bound = self.context.as_deref().map(BoundContext::as_fields);
        if compose(&mut buf, OffsetDateTime::now_utc(), level, bound, extra, message).is_ok() {
            self.out.write_record(&buf);
        }
    }

    pub fn debug(&self, message: impl fmt::Display) {
        self.emit(Level::Debug, None, &message);
    }

    pub fn debug_with<C: Serialize>(&self, context: &C, message: impl fmt::Display) {
        self.emit(Level::Debug, Some(context), &message);
    }

    pub fn info(&self, message: impl fmt::Display) {
        self.emit(Level::Info, None, &message);
    }

    pub fn info_with<C: Serialize>(&self, context: &C, message: impl fmt::Display) {
        self.emit(Level::Info, Some(context), &message);
    }

    pub fn warn(&self, message: impl fmt::Display) {
        self.emit(Level::Warn, None, &message);
    }

    pub fn warn_with<C: Serialize>(&self, context: &C, message: impl fmt::Display) {
        self.emit(Level::Warn, Some(context), &message);
    }

    pub fn error(&self, message: impl fmt::Display) {
        self.emit(Level::Error, None, &message);
    }

    pub fn error_with<C: Serialize>(&self, context: &C, message: impl fmt::Display) {
        self.emit(Level::Error, Some(context), &message);
    }

    /// Logs at `FATAL`. Does not exit; callers that want to stop must do it themselves.
    pub fn fatal(&self, message: impl fmt::Display) {
        self.emit(Level::Fatal, None, &message);
    }

    pub fn fatal_with<C: Serialize>(&self, context: &C, message: impl fmt::Display) {
        self.emit(Level::Fatal, Some(context), &message);
    }

    /// Dumps the request head (request line and headers, no body) at debug level.
    pub fn debug_request(&self, message: &str, req: &HttpRequest) {
        self.dump_request(None, message, req);
    }

    pub fn debug_request_with<C: Serialize>(&self, context: &C, message: &str, req: &HttpRequest) {
        self.dump_request(Some(context), message, req);
    }

    /// Dumps the response head (status line and headers, no body) at debug level.
    pub fn debug_response<B>(&self, message: &str, res: &HttpResponse<B>) {
        self.dump_response(None, message, res);
    }

    pub fn debug_response_with<C: Serialize, B>(
        &self,
        context: &C,
        message: &str,
        res: &HttpResponse<B>,
    ) {
        self.dump_response(Some(context), message, res);
    }

    fn dump_request(&self, context: Option<&dyn Fields>, message: &str, req: &HttpRequest) {
        if !self.enabled(Level::Debug) {
            return;
        }
        let line = format!("{} {} {}", req.method(), req.uri(), version_str(req.version()));
        let dump = dump_head(&line, req.headers());
        self.emit(Level::Debug, context, &format_args!("{message}. {dump}"));
    }

    fn dump_response<B>(&self, context: Option<&dyn Fields>, message: &str, res: &HttpResponse<B>) {
        if !self.enabled(Level::Debug) {
            return;
        }
        let line = format!("{} {}", version_str(res.head().version), res.status());
        let dump = dump_head(&line, res.headers());
        self.emit(Level::Debug, context, &format_args!("{message}. {dump}"));
    }
}

fn version_str(version: actix_http::Version) -> &'static str {
    match version {
        actix_http::Version::HTTP_09 => "HTTP/0.9",
        actix_http::Version::HTTP_10 => "HTTP/1.0",
        actix_http::Version::HTTP_11 => "HTTP/1.1",
        actix_http::Version::HTTP_2 => "HTTP/2.0",
        actix_http::Version::HTTP_3 => "HTTP/3.0",
        _ => "unknown",
    }
}

fn dump_head(start_line: &str, headers: &actix_web::http::header::HeaderMap) -> String {
    let mut dump = String::with_capacity(128);
    dump.push_str(start_line);
    dump.push_str("\r\n");
    for (name, value) in headers {
        dump.push_str(name.as_str());
        dump.push_str(": ");
        dump.push_str(&String::from_utf8_lossy(value.as_bytes()));
        dump.push_str("\r\n");
    }
    dump.push_str("\r\n");
    dump
}
