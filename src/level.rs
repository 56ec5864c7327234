use std::{
    fmt,
    str::FromStr,
    sync::atomic::{AtomicU8, Ordering},
};

/// Severity of a log record.
///
/// Levels are totally ordered: `Debug < Info < Warn < Error < Fatal`.
/// `Fatal` is a label only, emitting at this level never terminates the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Level {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
    Fatal = 4,
}

/// Canonical level names, indexed by level.
pub const LOG_LEVEL_NAMES: [&str; 5] = ["DEBUG", "INFO", "WARN", "ERROR", "FATAL"];

static DEFAULT_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);

impl Level {
    pub const ALL: [Level; 5] = [
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::Fatal,
    ];

    /// Canonical uppercase name, as written in the `lvl` field.
    pub fn as_str(self) -> &'static str {
        LOG_LEVEL_NAMES[self as usize]
    }

    /// Case-insensitive lookup. Unknown names fall back to `Info`.
    pub fn from_name(name: &str) -> Level {
        name.parse().unwrap_or(Level::Info)
    }

    fn from_u8(value: u8) -> Level {
        Level::ALL
            .get(value as usize)
            .copied()
            .unwrap_or(Level::Info)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned by [`Level::from_str`] for names outside [`LOG_LEVEL_NAMES`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level: {0}")]
pub struct ParseLevelError(String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LOG_LEVEL_NAMES
            .iter()
            .position(|name| name.eq_ignore_ascii_case(s))
            .map(|idx| Level::ALL[idx])
            .ok_or_else(|| ParseLevelError(s.to_string()))
    }
}

#[cfg(feature = "log")]
impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Trace | log::Level::Debug => Level::Debug,
            log::Level::Info => Level::Info,
            log::Level::Warn => Level::Warn,
            log::Level::Error => Level::Error,
        }
    }
}

/// Sets the level given to loggers constructed from now on.
///
/// Existing loggers keep their level. The value is advisory: concurrent
/// readers may observe either the old or the new default.
pub fn set_default_level(name: &str) {
    DEFAULT_LEVEL.store(Level::from_name(name) as u8, Ordering::Relaxed);
}

/// Level given to newly constructed loggers.
pub fn default_level() -> Level {
    Level::from_u8(DEFAULT_LEVEL.load(Ordering::Relaxed))
}
