//! Per-request log severity.
//!
//! The severity rides on the [`RequestContext`] under a key private to this module,
//! so caller-supplied context values can never collide with it. The public contract
//! is the pair [`RequestContext::with_log_level`] / [`LogLevel::from_context`].

use std::fmt;

use crate::RequestContext;

/// Severity of a log line, ordered from [`LogLevel::DEBUG`] to [`LogLevel::FATAL`].
///
/// Values outside the five named levels can be built with [`LogLevel::from`]; they
/// display as `UNKNOWN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogLevel(u8);

impl LogLevel {
    /// Diagnostic detail.
    pub const DEBUG: Self = Self(0);
    /// Normal operation. Default when a context carries no level.
    pub const INFO: Self = Self(1);
    /// Something unexpected but recoverable.
    pub const WARN: Self = Self(2);
    /// A failed operation.
    pub const ERROR: Self = Self(3);
    /// An unrecoverable failure.
    pub const FATAL: Self = Self(4);

    /// Name of the level, `UNKNOWN` for out-of-range values.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self.0 {
            0 => "DEBUG",
            1 => "INFO",
            2 => "WARN",
            3 => "ERROR",
            4 => "FATAL",
            _ => "UNKNOWN",
        }
    }

    /// Level carried by `ctx`, or [`LogLevel::INFO`] when none was set.
    #[must_use]
    pub fn from_context(ctx: &RequestContext) -> Self {
        ctx.log_level().unwrap_or(Self::INFO)
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::INFO
    }
}

impl From<u8> for LogLevel {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy)]
struct LogLevelKey(LogLevel);

impl RequestContext {
    /// Attaches a log severity to this request, replacing any previous one.
    #[must_use]
    pub fn with_log_level(self, level: LogLevel) -> Self {
        self.with_value(LogLevelKey(level))
    }

    /// Log severity attached to this request, if any.
    #[must_use]
    pub fn log_level(&self) -> Option<LogLevel> {
        self.value::<LogLevelKey>().map(|key| key.0)
    }
}
