use std::{
    collections::HashSet,
    future::{Future, Ready, ready},
    marker::PhantomData,
    ops::Deref,
    pin::Pin,
    rc::Rc,
    sync::Arc,
    task::{Context, Poll},
};

use futures_core::ready;
use pin_project_lite::pin_project;
use regex::Regex;
use time::OffsetDateTime;
use uuid::Uuid;

use actix_service::{Service, Transform};
use actix_web::body::MessageBody;
use actix_web::dev::{Payload, ServiceRequest, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest, Result};

use crate::context::{CorrelationContext, LogContext, ReqLogContext, RespLogContext};
use crate::level::Level;
use crate::logger::{LogWriter, Logger};

/// Header transporting the correlator, which ties together every request and
/// response of the same flow across services.
pub static CORRELATOR_HTTP_HEADER: HeaderName = HeaderName::from_static("unica-correlator");

pub const REQUEST_LOG_MESSAGE: &str = "Request";
pub const RESPONSE_LOG_MESSAGE: &str = "Response";

/// Logger of the current request.
///
/// Stored in the request extensions by [`WithLogContext`] (or lazily by
/// [`WithLog`]) and usable as a handler argument:
///
/// ```rust
/// use actix_web::HttpResponse;
/// use actix_web_middleware_ctxlog::RequestLogger;
///
/// async fn index(logger: RequestLogger) -> HttpResponse {
///     logger.info("handling index");
///     HttpResponse::Ok().finish()
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequestLogger(Arc<Logger>);

impl RequestLogger {
    pub fn new(logger: Logger) -> Self {
        RequestLogger(Arc::new(logger))
    }

    pub fn logger(&self) -> &Arc<Logger> {
        &self.0
    }

    /// Logger of `req`, or a fresh one with no context when the request has none.
    pub(crate) fn of<M: HttpMessage>(req: &M) -> Self {
        get_logger(req).unwrap_or_else(|| RequestLogger::new(Logger::new()))
    }
}

impl Deref for RequestLogger {
    type Target = Logger;

    fn deref(&self) -> &Logger {
        &self.0
    }
}

impl FromRequest for RequestLogger {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Ok(RequestLogger::of(req)))
    }
}

/// Logger stored in the request extensions, if any.
pub fn get_logger<M: HttpMessage>(req: &M) -> Option<RequestLogger> {
    req.extensions().get::<RequestLogger>().cloned()
}

/// Copy of the context bound to the request logger, if it is a `C`.
pub fn get_log_context<C, M>(req: &M) -> Option<C>
where
    C: Clone + 'static,
    M: HttpMessage,
{
    get_logger(req)?.context_as::<C>().cloned()
}

fn new_transaction_id() -> Option<String> {
    #[cfg(not(feature = "uuid_v7"))]
    let id = Uuid::new_v4();
    #[cfg(feature = "uuid_v7")]
    let id = Uuid::now_v7();
    Some(id.as_hyphenated().to_string())
}

#[derive(Debug, Clone)]
struct LoggerSettings {
    writer: Option<LogWriter>,
    level: Option<Level>,
    id_generator: fn() -> Option<String>,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        LoggerSettings {
            writer: None,
            level: None,
            id_generator: new_transaction_id,
        }
    }
}

impl LoggerSettings {
    /// Builds the logger of `req` from a copy of `template`.
    ///
    /// The copy gets a fresh transaction id. The correlator is taken from the
    /// inbound header; without one it is the transaction id, which is also
    /// written onto the inbound request.
    fn establish<C: CorrelationContext>(&self, req: &mut ServiceRequest, template: &C) -> Logger {
        let mut ctx = template.clone();
        ctx.set_transaction_id((self.id_generator)().unwrap_or_default());

        let inbound = req
            .headers()
            .get(&CORRELATOR_HTTP_HEADER)
            .filter(|v| !v.is_empty())
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());
        match inbound {
            Some(corr) => ctx.set_correlator(corr),
            None => {
                let corr = ctx.transaction_id().to_owned();
                if let Ok(value) = HeaderValue::from_str(&corr) {
                    req.headers_mut().insert(CORRELATOR_HTTP_HEADER.clone(), value);
                }
                ctx.set_correlator(corr);
            }
        }

        let mut logger = match self.level {
            Some(level) => Logger::with_level(level),
            None => Logger::new(),
        };
        if let Some(writer) = &self.writer {
            logger.set_writer(writer.clone());
        }
        logger.set_log_context(ctx);
        logger
    }
}

/// Middleware creating the logger of every request.
///
/// Each request gets its own copy of the template context with a new
/// transaction id and the correlator of the flow. The logger is stored in the
/// request extensions, see [`RequestLogger`].
///
/// # Examples
/// ```rust
/// use actix_web::{web, App};
/// use actix_web_middleware_ctxlog::{LogContext, WithLog, WithLogContext};
///
/// let app = App::new()
///     .wrap(WithLog::default())
///     .wrap(WithLogContext::new(LogContext::new("logger", "demo")))
///     .route("/", web::get().to(|| async { "Hello world!" }));
/// ```
pub struct WithLogContext<C: CorrelationContext>(Rc<ContextInner<C>>);

#[derive(Debug, Clone)]
struct ContextInner<C> {
    template: C,
    settings: LoggerSettings,
}

impl<C: CorrelationContext> WithLogContext<C> {
    pub fn new(template: C) -> Self {
        WithLogContext(Rc::new(ContextInner {
            template,
            settings: LoggerSettings::default(),
        }))
    }

    /// Sink of the request loggers. Stdout by default.
    pub fn writer(mut self, writer: LogWriter) -> Self {
        Rc::make_mut(&mut self.0).settings.writer = Some(writer);
        self
    }

    /// Level of the request loggers. The process default level when unset.
    pub fn level(mut self, level: Level) -> Self {
        Rc::make_mut(&mut self.0).settings.level = Some(level);
        self
    }

    /// Replaces the transaction id generator. `None` leaves the transaction id empty.
    pub fn id_generator(mut self, generator: fn() -> Option<String>) -> Self {
        Rc::make_mut(&mut self.0).settings.id_generator = generator;
        self
    }
}

impl Default for WithLogContext<LogContext> {
    fn default() -> Self {
        WithLogContext::new(LogContext::default())
    }
}

impl<S, B, C> Transform<S, ServiceRequest> for WithLogContext<C>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    C: CorrelationContext,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = WithLogContextService<S, C>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(WithLogContextService {
            service,
            inner: Rc::clone(&self.0),
        }))
    }
}

pub struct WithLogContextService<S, C> {
    inner: Rc<ContextInner<C>>,
    service: S,
}

impl<S, B, C> Service<ServiceRequest> for WithLogContextService<S, C>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    C: CorrelationContext,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = S::Future;

    actix_service::forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let logger = self.inner.settings.establish(&mut req, &self.inner.template);
        req.extensions_mut().insert(RequestLogger::new(logger));
        self.service.call(req)
    }
}

/// Middleware logging a `Request` record before the handler runs and a
/// `Response` record with status and latency after it returns.
///
/// The request logger comes from [`WithLogContext`], which must wrap this
/// middleware (i.e. be registered after it). Without it a logger with an
/// empty context is created here.
pub struct WithLog(Rc<LogInner>);

#[derive(Debug, Clone, Default)]
struct LogInner {
    settings: LoggerSettings,
    exclude: HashSet<String>,
    exclude_regex: Vec<Regex>,
}

impl WithLog {
    pub fn new() -> Self {
        WithLog::default()
    }

    /// Do not log requests to `path`. The correlator is still propagated.
    pub fn exclude<T: Into<String>>(mut self, path: T) -> Self {
        Rc::make_mut(&mut self.0).exclude.insert(path.into());
        self
    }

    /// Do not log requests whose path matches `path`.
    ///
    /// # Panics
    /// If `path` is not a valid regex.
    pub fn exclude_regex<T: Into<String>>(mut self, path: T) -> Self {
        let re = Regex::new(&path.into()).expect("invalid exclude regex");
        Rc::make_mut(&mut self.0).exclude_regex.push(re);
        self
    }

    /// Sink of the loggers created when no request logger exists.
    pub fn writer(mut self, writer: LogWriter) -> Self {
        Rc::make_mut(&mut self.0).settings.writer = Some(writer);
        self
    }

    /// Level of the loggers created when no request logger exists.
    pub fn level(mut self, level: Level) -> Self {
        Rc::make_mut(&mut self.0).settings.level = Some(level);
        self
    }
}

impl Default for WithLog {
    fn default() -> Self {
        WithLog(Rc::new(LogInner::default()))
    }
}

impl<S, B> Transform<S, ServiceRequest> for WithLog
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    B: MessageBody,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = WithLogService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(WithLogService {
            service,
            inner: Rc::clone(&self.0),
        }))
    }
}

pub struct WithLogService<S> {
    inner: Rc<LogInner>,
    service: S,
}

impl<S, B> Service<ServiceRequest> for WithLogService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    B: MessageBody,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = WithLogResponse<S, B>;

    actix_service::forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let now = OffsetDateTime::now_utc();

        let logger = match get_logger(&req) {
            Some(logger) => logger,
            None => {
                // correlation metadata of the service template is unavailable here
                let logger = self.inner.settings.establish(&mut req, &LogContext::default());
                let logger = RequestLogger::new(logger);
                req.extensions_mut().insert(logger.clone());
                logger
            }
        };
        let correlator = req.headers().get(&CORRELATOR_HTTP_HEADER).cloned();

        let excluded = self.inner.exclude.contains(req.path())
            || self
                .inner
                .exclude_regex
                .iter()
                .any(|r| r.is_match(req.path()));

        let logger = if excluded {
            None
        } else {
            let ctx = ReqLogContext {
                method: req.method().to_string(),
                path: req
                    .uri()
                    .path_and_query()
                    .map_or_else(|| req.path().to_owned(), |pq| pq.to_string()),
                remote_addr: req
                    .peer_addr()
                    .map(|addr| addr.to_string())
                    .unwrap_or_default(),
            };
            logger.info_with(&ctx, REQUEST_LOG_MESSAGE);
            logger.debug_request(REQUEST_LOG_MESSAGE, req.request());
            Some(logger)
        };

        WithLogResponse {
            fut: self.service.call(req),
            time: now,
            logger,
            correlator,
            _phantom: PhantomData,
        }
    }
}

pin_project! {
    pub struct WithLogResponse<S, B>
    where
        B: MessageBody,
        S: Service<ServiceRequest>,
    {
        #[pin]
        fut: S::Future,
        time: OffsetDateTime,
        logger: Option<RequestLogger>,
        correlator: Option<HeaderValue>,
        _phantom: PhantomData<B>,
    }
}

impl<S, B> Future for WithLogResponse<S, B>
where
    B: MessageBody,
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
{
    type Output = Result<ServiceResponse<B>, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        let mut res = match ready!(this.fut.poll(cx)) {
            Ok(res) => res,
            Err(err) => {
                #[cfg(feature = "log")]
                log::debug!("Error in response: {:?}", err);

                if let Some(logger) = this.logger.take() {
                    let status = err.as_response_error().status_code();
                    log_response(&logger, *this.time, status, &HeaderMap::new());
                }
                return Poll::Ready(Err(err));
            }
        };

        if let Some(correlator) = this.correlator.take() {
            res.headers_mut().insert(CORRELATOR_HTTP_HEADER.clone(), correlator);
        }
        if let Some(logger) = this.logger.take() {
            log_response(&logger, *this.time, res.status(), res.headers());
        }

        Poll::Ready(Ok(res))
    }
}

fn log_response(logger: &Logger, entry_time: OffsetDateTime, status: StatusCode, headers: &HeaderMap) {
    let latency = (OffsetDateTime::now_utc() - entry_time).whole_milliseconds();
    let ctx = RespLogContext {
        status: status.as_u16(),
        latency: u64::try_from(latency).unwrap_or_default(),
        location: headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned(),
    };
    logger.info_with(&ctx, RESPONSE_LOG_MESSAGE);
}
