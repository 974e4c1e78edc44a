//! Log events as seen by the email sink
//!
//! A [`LogEvent`] is an owned snapshot of a `tracing` event, taken when the
//! event is recorded so it can be queued and rendered later on the batching
//! worker.

use crate::error::{EmailSinkError, Result};
use chrono::{DateTime, FixedOffset, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Severity of a log event, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Deserialize, Serialize)]
pub enum Level {
    #[default]
    #[serde(alias = "verbose", alias = "trace")]
    Verbose,
    #[serde(alias = "debug")]
    Debug,
    #[serde(alias = "information", alias = "info")]
    Information,
    #[serde(alias = "warning", alias = "warn")]
    Warning,
    #[serde(alias = "error")]
    Error,
    #[serde(alias = "fatal")]
    Fatal,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Verbose => "Verbose",
            Level::Debug => "Debug",
            Level::Information => "Information",
            Level::Warning => "Warning",
            Level::Error => "Error",
            Level::Fatal => "Fatal",
        }
    }

    /// Three-letter abbreviation used by the `:u3` and `:w3` level formats
    pub fn short_name(&self) -> &'static str {
        match self {
            Level::Verbose => "VRB",
            Level::Debug => "DBG",
            Level::Information => "INF",
            Level::Warning => "WRN",
            Level::Error => "ERR",
            Level::Fatal => "FTL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = EmailSinkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "verbose" | "trace" => Ok(Level::Verbose),
            "debug" => Ok(Level::Debug),
            "information" | "info" => Ok(Level::Information),
            "warning" | "warn" => Ok(Level::Warning),
            "error" => Ok(Level::Error),
            "fatal" => Ok(Level::Fatal),
            other => Err(EmailSinkError::invalid_argument(format!(
                "unknown log level '{}'",
                other
            ))),
        }
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Verbose,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Information,
            tracing::Level::WARN => Level::Warning,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// A single log event queued for email delivery
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    pub timestamp: DateTime<FixedOffset>,
    pub level: Level,
    pub message: String,
    /// Rendered error attached to the event, if any
    pub exception: Option<String>,
    pub properties: BTreeMap<String, String>,
}

impl LogEvent {
    /// Create an event stamped with the current local time
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now().fixed_offset(),
            level,
            message: message.into(),
            exception: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<FixedOffset>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Capture a `tracing` event
    ///
    /// The `message` field becomes the message, an `exception` or `error`
    /// field becomes the exception, and every other field is kept as a
    /// property rendered with its `Debug` (or string) value.
    pub fn from_tracing(event: &tracing::Event<'_>) -> Self {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut log_event = Self::new((*event.metadata().level()).into(), visitor.message);
        log_event.exception = visitor.exception;
        log_event.properties = visitor.properties;
        log_event
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    exception: Option<String>,
    properties: BTreeMap<String, String>,
}

impl FieldVisitor {
    fn record_value(&mut self, name: &str, value: String) {
        match name {
            "message" => self.message = value,
            "exception" | "error" if self.exception.is_none() => self.exception = Some(value),
            _ => {
                self.properties.insert(name.to_string(), value);
            }
        }
    }
}

impl tracing::field::Visit for FieldVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.record_value(field.name(), value.to_string());
    }

    fn record_error(
        &mut self,
        field: &tracing::field::Field,
        value: &(dyn std::error::Error + 'static),
    ) {
        self.record_value(field.name(), value.to_string());
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        self.record_value(field.name(), format!("{:?}", value));
    }
}
