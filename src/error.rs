use actix_web::http::StatusCode;
use actix_web::http::header::ContentType;
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use serde::Serialize;

use crate::context::LogContext;
use crate::logger::Logger;
use crate::middleware::RequestLogger;

/// Error carrying everything needed to answer an HTTP request.
///
/// Only `code` and `description` reach the client, as
/// `{"error": "<code>", "error_description": "<description>"}`.
/// `message` and `alarm` are written to the log only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct Error {
    #[serde(skip)]
    pub message: String,
    #[serde(skip)]
    pub status: StatusCode,
    #[serde(skip)]
    pub alarm: Option<String>,
    #[serde(rename = "error")]
    pub code: String,
    #[serde(rename = "error_description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Error {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Error {
            message: message.into(),
            status,
            alarm: None,
            code: code.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into()).filter(|d: &String| !d.is_empty());
        self
    }

    /// Tags the error so that logging it raises an operational alarm.
    pub fn with_alarm(mut self, alarm: impl Into<String>) -> Self {
        self.alarm = Some(alarm.into()).filter(|a: &String| !a.is_empty());
        self
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Error::new(StatusCode::INTERNAL_SERVER_ERROR, "server_error", message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Error::new(StatusCode::BAD_GATEWAY, "server_error", message)
    }

    pub fn invalid_request(message: impl Into<String>, description: impl Into<String>) -> Self {
        Error::new(StatusCode::BAD_REQUEST, "invalid_request", message).with_description(description)
    }

    pub fn unauthorized_client(message: impl Into<String>, description: impl Into<String>) -> Self {
        Error::new(StatusCode::FORBIDDEN, "unauthorized_client", message)
            .with_description(description)
    }

    pub fn not_found() -> Self {
        Error::new(StatusCode::NOT_FOUND, "invalid_request", "not found").with_description("not found")
    }

    /// Logs the error: with an alarm at `ERROR` carrying the `alarm` field,
    /// otherwise at `INFO` for client errors and `ERROR` for the rest.
    pub fn log(&self, logger: &Logger) {
        match &self.alarm {
            Some(alarm) => logger.error_with(&LogContext::alarm(alarm.as_str()), &self.message),
            None if self.status.is_client_error() => logger.info(&self.message),
            None => logger.error(&self.message),
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn error_response(&self) -> HttpResponse {
        match serde_json::to_string(self) {
            Ok(body) => HttpResponse::build(self.status)
                .content_type(ContentType::json())
                .body(body),
            Err(_) => HttpResponse::InternalServerError().finish(),
        }
    }
}

/// Answers `req` with `err` and logs it with the request logger.
///
/// Errors other than [`Error`] are logged at `ERROR` and answered with a
/// generic `server_error`.
pub fn reply_with_error(req: &HttpRequest, err: &(dyn std::error::Error + 'static)) -> HttpResponse {
    let logger = RequestLogger::of(req);
    match err.downcast_ref::<Error>() {
        Some(e) => {
            e.log(&logger);
            e.error_response()
        }
        None => {
            logger.error(err);
            Error::server_error("").error_response()
        }
    }
}

/// Serializes `value` as a JSON response, or answers with a `server_error`
/// when it cannot be serialized.
pub fn write_json<T: Serialize + ?Sized>(req: &HttpRequest, value: &T) -> HttpResponse {
    match serde_json::to_string(value) {
        Ok(body) => HttpResponse::Ok().content_type(ContentType::json()).body(body),
        Err(err) => reply_with_error(req, &err),
    }
}
