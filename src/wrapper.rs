#[cfg(feature = "log")]
pub mod rust_log {
    //! Bridge from the `log` facade: records emitted with `log::info!` and
    //! friends are written by a [`Logger`], key-values included.

    use serde::ser::{Serialize, SerializeMap, Serializer};
    use serde_json::Value;

    use crate::level::Level;
    use crate::logger::Logger;

    /// `log` backend writing through a [`Logger`].
    ///
    /// # Examples
    /// ```rust
    /// use actix_web_middleware_ctxlog::{LogContext, Logger, rust_log::StdLogger};
    ///
    /// let mut logger = Logger::new();
    /// logger.set_log_context(LogContext::new("logger", "demo"));
    /// StdLogger::new(logger).init().ok();
    /// log::info!(user = "bob"; "bridged");
    /// ```
    #[derive(Debug)]
    pub struct StdLogger {
        logger: Logger,
    }

    impl StdLogger {
        pub fn new(logger: Logger) -> Self {
            StdLogger { logger }
        }

        /// Installs this logger as the global `log` backend.
        pub fn init(self) -> Result<(), log::SetLoggerError> {
            log::set_max_level(level_filter(self.logger.level()));
            log::set_boxed_logger(Box::new(self))
        }
    }

    fn level_filter(level: Level) -> log::LevelFilter {
        match level {
            Level::Debug => log::LevelFilter::Trace,
            Level::Info => log::LevelFilter::Info,
            Level::Warn => log::LevelFilter::Warn,
            Level::Error | Level::Fatal => log::LevelFilter::Error,
        }
    }

    impl log::Log for StdLogger {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            self.logger.enabled(metadata.level().into())
        }

        fn log(&self, record: &log::Record) {
            let level = Level::from(record.level());
            if !self.logger.enabled(level) {
                return;
            }
            let mut kvs = KeyValues::default();
            let _ = record.key_values().visit(&mut kvs);
            if kvs.0.is_empty() {
                self.logger.log(level, record.args());
            } else {
                self.logger.log_with(level, &kvs, record.args());
            }
        }

        fn flush(&self) {}
    }

    /// Key-values of a record, kept in emission order.
    #[derive(Default)]
    struct KeyValues(Vec<(String, Value)>);

    impl<'kvs> log::kv::VisitSource<'kvs> for KeyValues {
        fn visit_pair(
            &mut self,
            key: log::kv::Key<'kvs>,
            value: log::kv::Value<'kvs>,
        ) -> Result<(), log::kv::Error> {
            let value = if let Some(v) = value.to_bool() {
                Value::from(v)
            } else if let Some(v) = value.to_u64() {
                Value::from(v)
            } else if let Some(v) = value.to_i64() {
                Value::from(v)
            } else if let Some(n) = value.to_f64().and_then(serde_json::Number::from_f64) {
                Value::Number(n)
            } else {
                Value::from(value.to_string())
            };
            self.0.push((key.as_str().to_owned(), value));
            Ok(())
        }
    }

    impl Serialize for KeyValues {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let mut map = serializer.serialize_map(Some(self.0.len()))?;
            for (key, value) in &self.0 {
                map.serialize_entry(key, value)?;
            }
            map.end()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::context::LogContext;
        use crate::logger::LogWriter;
        use crate::testing::Buffer;
        use log::Log;

        fn bridge(buf: &Buffer, level: Level) -> StdLogger {
            let mut logger = Logger::with_level(level);
            logger.set_writer(LogWriter::new(buf.clone()));
            logger.set_log_context(LogContext::new("svc", ""));
            StdLogger::new(logger)
        }

        #[test]
        fn test_bridge_writes_records() {
            let buf = Buffer::default();
            let std_logger = bridge(&buf, Level::Info);
            let kvs: &[(&str, log::kv::Value)] = &[
                ("user", log::kv::Value::from("bob")),
                ("n", log::kv::Value::from(42u64)),
            ];

            std_logger.log(
                &log::Record::builder()
                    .args(format_args!("hello {}", 1))
                    .level(log::Level::Warn)
                    .key_values(&kvs)
                    .build(),
            );
            std_logger.log(
                &log::Record::builder()
                    .args(format_args!("plain"))
                    .level(log::Level::Error)
                    .build(),
            );

            let line = buf.contents();
            let first = line.lines().next().unwrap();
            assert!(first.ends_with(
                ",\"lvl\":\"WARN\",\"svc\":\"svc\",\"user\":\"bob\",\"n\":42,\"msg\":\"hello 1\"}"
            ));
            let records = buf.records();
            assert_eq!(records[1]["lvl"], "ERROR");
            assert_eq!(records[1]["msg"], "plain");
        }

        #[test]
        fn test_init_installs_backend() {
            let buf = Buffer::default();
            bridge(&buf, Level::Warn).init().unwrap();
            assert_eq!(log::max_level(), log::LevelFilter::Warn);

            log::info!("filtered");
            log::warn!(code = 7; "installed");
            let records = buf.records();
            assert!(records.iter().all(|r| r["msg"] != "filtered"));
            let record = records.iter().find(|r| r["msg"] == "installed").unwrap();
            assert_eq!(record["lvl"], "WARN");
            assert_eq!(record["code"], 7);
        }

        #[test]
        fn test_bridge_filters_levels() {
            let buf = Buffer::default();
            let std_logger = bridge(&buf, Level::Warn);
            assert!(!std_logger.enabled(&log::Metadata::builder().level(log::Level::Info).build()));
            assert!(std_logger.enabled(&log::Metadata::builder().level(log::Level::Error).build()));

            std_logger.log(
                &log::Record::builder()
                    .args(format_args!("skipped"))
                    .level(log::Level::Trace)
                    .build(),
            );
            assert!(buf.contents().is_empty());
            assert_eq!(level_filter(Level::Fatal), log::LevelFilter::Error);
            assert_eq!(level_filter(Level::Debug), log::LevelFilter::Trace);
        }
    }
}
