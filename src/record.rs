//! Composition of log records.
//!
//! A record is a single JSON object terminated by a newline:
//! `time`, `lvl`, the members of the bound context, the members of the
//! per-call context and finally `msg`. Contexts are serialized on their own
//! and their members are spliced into the record, so a record never contains
//! nested objects coming from a context.

use std::{any::Any, fmt};

use serde::Serialize;
use time::{OffsetDateTime, UtcOffset, macros::format_description};

use crate::level::Level;

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("failed to serialize log record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("log context must serialize to a JSON object")]
    NotAnObject,
    #[error("failed to format log timestamp: {0}")]
    Time(#[from] time::error::Format),
}

/// Something whose JSON members can be spliced into a log record.
///
/// Implemented for every [`Serialize`] type. Fields skipped by serde
/// (e.g. `skip_serializing_if = "String::is_empty"`) never reach the record.
pub trait Fields {
    /// Appends the members of the serialized object, without braces, and
    /// returns the number of bytes written.
    fn write_fields(&self, buf: &mut Vec<u8>) -> Result<usize, ComposeError>;
}

impl<T: Serialize> Fields for T {
    fn write_fields(&self, buf: &mut Vec<u8>) -> Result<usize, ComposeError> {
        let doc = serde_json::to_vec(self)?;
        match doc.as_slice() {
            b"null" => Ok(0),
            [b'{', members @ .., b'}'] => {
                buf.extend_from_slice(members);
                Ok(members.len())
            }
            _ => Err(ComposeError::NotAnObject),
        }
    }
}

/// A context that can be bound to a [`Logger`](crate::Logger) and later
/// recovered with its concrete type.
pub trait BoundContext: Fields + Send + Sync {
    fn as_fields(&self) -> &dyn Fields;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Serialize + Send + Sync + 'static> BoundContext for T {
    fn as_fields(&self) -> &dyn Fields {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Formats `time` in UTC with millisecond precision, e.g.
/// `2017-09-21T10:02:28.427Z`.
pub fn format_time(time: OffsetDateTime) -> Result<String, ComposeError> {
    let utc = time.to_offset(UtcOffset::UTC);
    Ok(utc.format(format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
    ))?)
}

/// Appends one complete record to `buf`.
///
/// On error `buf` may hold a partial record and must be discarded.
pub fn compose(
    buf: &mut Vec<u8>,
    time: OffsetDateTime,
    level: Level,
    context: Option<&dyn Fields>,
    extra: Option<&dyn Fields>,
    message: &dyn fmt::Display,
) -> Result<(), ComposeError> {
    buf.push(b'{');
    write_field(buf, "time", &format_time(time)?)?;
    buf.push(b',');
    write_field(buf, "lvl", level.as_str())?;
    buf.push(b',');
    for ctx in [context, extra].into_iter().flatten() {
        if ctx.write_fields(buf)? > 0 {
            buf.push(b',');
        }
    }
    write_field(buf, "msg", &message.to_string())?;
    buf.extend_from_slice(b"}\n");
    Ok(())
}

fn write_field(buf: &mut Vec<u8>, key: &str, value: &str) -> Result<(), ComposeError> {
    serde_json::to_writer(&mut *buf, key)?;
    buf.push(b':');
    serde_json::to_writer(&mut *buf, value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{LogContext, ReqLogContext, RespLogContext};
    use std::collections::BTreeMap;
    use time::macros::datetime;

    fn render(context: Option<&dyn Fields>, extra: Option<&dyn Fields>, msg: &str) -> String {
        let mut buf = Vec::new();
        compose(
            &mut buf,
            datetime!(2017-09-21 10:02:28.427 UTC),
            Level::Info,
            context,
            extra,
            &msg,
        )
        .unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_compose_without_contexts() {
        assert_eq!(
            render(None, None, "hi"),
            "{\"time\":\"2017-09-21T10:02:28.427Z\",\"lvl\":\"INFO\",\"msg\":\"hi\"}\n"
        );
    }

    #[test]
    fn test_compose_flattens_contexts_in_order() {
        let ctx = LogContext {
            transaction_id: "t".to_string(),
            operation: "o".to_string(),
            ..Default::default()
        };
        let req = ReqLogContext {
            method: "GET".to_string(),
            ..Default::default()
        };
        assert_eq!(
            render(Some(&ctx), Some(&req), "hi"),
            "{\"time\":\"2017-09-21T10:02:28.427Z\",\"lvl\":\"INFO\",\"trans\":\"t\",\"op\":\"o\",\"method\":\"GET\",\"msg\":\"hi\"}\n"
        );
    }

    #[test]
    fn test_compose_empty_context_adds_nothing() {
        let empty = LogContext::default();
        let resp = RespLogContext::default();
        assert_eq!(render(Some(&empty), Some(&resp), "x"), render(None, None, "x"));
    }

    #[test]
    fn test_compose_numbers_and_escaping() {
        let resp = RespLogContext {
            status: 201,
            latency: 12,
            location: "/users/1".to_string(),
        };
        let line = render(None, Some(&resp), "say \"hi\"\n\t100%");
        assert!(line.contains(",\"status\":201,\"latency\":12,\"location\":\"/users/1\","));
        assert!(line.ends_with(",\"msg\":\"say \\\"hi\\\"\\n\\t100%\"}\n"));

        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["msg"], "say \"hi\"\n\t100%");
    }

    #[test]
    fn test_compose_arbitrary_serializable_context() {
        #[derive(Serialize)]
        struct Feature {
            feat: u32,
        }
        let mut map = BTreeMap::new();
        map.insert("a", 1);
        let line = render(Some(&Feature { feat: 3 }), Some(&map), "m");
        assert!(line.contains("\"lvl\":\"INFO\",\"feat\":3,\"a\":1,\"msg\":\"m\""));
        let none: Option<Feature> = None;
        assert_eq!(render(Some(&none), None, "m"), render(None, None, "m"));
    }

    #[test]
    fn test_compose_rejects_non_object_context() {
        let mut buf = Vec::new();
        let err = compose(
            &mut buf,
            OffsetDateTime::now_utc(),
            Level::Info,
            Some(&vec![1, 2, 3]),
            None,
            &"m",
        )
        .unwrap_err();
        assert!(matches!(err, ComposeError::NotAnObject));
    }

    #[test]
    fn test_format_time_is_utc_milliseconds() {
        let t = datetime!(2020-01-02 03:04:05.006789 +02:00);
        assert_eq!(format_time(t).unwrap(), "2020-01-02T01:04:05.006Z");
    }
}
