//! Rendering log events into email text
//!
//! Two capabilities are available:
//! - [`TextFormatter`] renders one event; the sink calls it for each event
//!   of a batch and concatenates the output.
//! - [`BatchTextFormatter`] additionally renders a whole batch at once, so it
//!   can wrap the events in a header and footer (an HTML table, for example).
//!
//! Which one is used is decided when the sink is configured, through the
//! [`BodyFormatter`] variant, not by inspecting the formatter at runtime.

mod template;

pub use template::MessageTemplateFormatter;

use crate::error::Result;
use crate::event::LogEvent;
use std::fmt;
use std::sync::Arc;

/// Subject template used when none is configured
pub const DEFAULT_SUBJECT_TEMPLATE: &str = "Log Messages";

/// Body template used when none is configured
pub const DEFAULT_BODY_TEMPLATE: &str =
    "{Timestamp:yyyy-MM-dd HH:mm:ss.fff zzz} [{Level}] {Message}{NewLine}{Exception}";

/// Renders a single log event to text
pub trait TextFormatter: Send + Sync {
    /// Append the rendering of `event` to `output`
    fn format(&self, event: &LogEvent, output: &mut String) -> Result<()>;
}

/// A formatter that controls the structure of the whole batch
pub trait BatchTextFormatter: TextFormatter {
    /// Append the rendering of all `events`, in order, to `output`
    ///
    /// The default renders each event with [`TextFormatter::format`].
    fn format_batch(&self, events: &[LogEvent], output: &mut String) -> Result<()> {
        for event in events {
            self.format(event, output)?;
        }
        Ok(())
    }
}

/// The body formatter configured for a sink
#[derive(Clone)]
pub enum BodyFormatter {
    /// Rendered once per event; each rendering ends on its own line
    PerEvent(Arc<dyn TextFormatter>),
    /// Rendered once for the whole batch
    Batch(Arc<dyn BatchTextFormatter>),
}

impl BodyFormatter {
    pub fn per_event(formatter: impl TextFormatter + 'static) -> Self {
        Self::PerEvent(Arc::new(formatter))
    }

    pub fn batch(formatter: impl BatchTextFormatter + 'static) -> Self {
        Self::Batch(Arc::new(formatter))
    }

    /// Render the body for `events`
    pub fn render(&self, events: &[LogEvent]) -> Result<String> {
        let mut body = String::new();
        match self {
            BodyFormatter::PerEvent(formatter) => {
                for event in events {
                    formatter.format(event, &mut body)?;
                    if !body.is_empty() && !body.ends_with('\n') {
                        body.push('\n');
                    }
                }
            }
            BodyFormatter::Batch(formatter) => formatter.format_batch(events, &mut body)?,
        }
        Ok(body)
    }
}

impl Default for BodyFormatter {
    fn default() -> Self {
        Self::per_event(MessageTemplateFormatter::new(DEFAULT_BODY_TEMPLATE))
    }
}

impl fmt::Debug for BodyFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyFormatter::PerEvent(_) => f.write_str("BodyFormatter::PerEvent"),
            BodyFormatter::Batch(_) => f.write_str("BodyFormatter::Batch"),
        }
    }
}
