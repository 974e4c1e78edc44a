//! `tracing` integration
//!
//! [`EmailLayer`] turns `tracing` events into [`LogEvent`]s and queues them
//! for the batching worker. Queueing never blocks the caller.

use crate::batching::{EventSender, is_flushing};
use crate::event::{Level, LogEvent};
use tracing::Subscriber;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// Target prefix of this crate's own diagnostics
const SELF_TARGET: &str = "tideway_email_sink";

/// A `tracing_subscriber` layer that mails log events
///
/// Built with [`EmailLayerBuilder`](crate::EmailLayerBuilder).
///
/// # Example
///
/// ```rust,ignore
/// use tracing_subscriber::prelude::*;
///
/// let (layer, guard) = EmailLayerBuilder::new("app@example.com", "ops@example.com", "smtp.example.com")
///     .minimum_level(Level::Error)
///     .build()?;
///
/// tracing_subscriber::registry().with(layer).init();
/// // ...
/// guard.shutdown().await?;
/// ```
#[derive(Debug, Clone)]
pub struct EmailLayer {
    sender: EventSender,
    minimum_level: Level,
}

impl EmailLayer {
    pub(crate) fn new(sender: EventSender, minimum_level: Level) -> Self {
        Self {
            sender,
            minimum_level,
        }
    }

    pub fn minimum_level(&self) -> Level {
        self.minimum_level
    }

    /// Queue an event directly, bypassing `tracing`
    ///
    /// The minimum level still applies. Returns false if the event was
    /// filtered out or dropped.
    pub fn enqueue(&self, event: LogEvent) -> bool {
        if event.level < self.minimum_level {
            return false;
        }
        self.sender.enqueue(event)
    }

    /// Events dropped because the queue was full or the worker had stopped
    pub fn dropped_events(&self) -> u64 {
        self.sender.dropped_events()
    }

    fn accepts(&self, target: &str, level: Level) -> bool {
        level >= self.minimum_level && !target.starts_with(SELF_TARGET) && !is_flushing()
    }
}

impl<S: Subscriber> Layer<S> for EmailLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !self.accepts(metadata.target(), Level::from(*metadata.level())) {
            return;
        }
        self.sender.enqueue(LogEvent::from_tracing(event));
    }
}
