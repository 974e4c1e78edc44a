//! The email sink
//!
//! Turns one batch of log events into one email and hands it to the
//! transport. Batching, level filtering and scheduling happen upstream;
//! see [`crate::batching`].

use crate::error::{EmailSinkError, Result};
use crate::event::LogEvent;
use crate::format::TextFormatter;
use crate::message::EmailMessage;
use crate::options::EmailSinkOptions;
use crate::transport::EmailTransport;

/// Sends batches of log events as email
///
/// The sink owns its transport. [`dispose`](EmailSink::dispose) consumes the
/// sink, so the transport is released exactly once.
pub struct EmailSink {
    options: EmailSinkOptions,
    transport: Box<dyn EmailTransport>,
}

impl EmailSink {
    /// Create a sink that delivers through `transport`
    pub fn new(options: EmailSinkOptions, transport: impl EmailTransport + 'static) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            transport: Box::new(transport),
        })
    }

    /// Create a sink that delivers over SMTP using the host settings in
    /// `options`
    #[cfg(feature = "smtp")]
    pub fn smtp(options: EmailSinkOptions) -> Result<Self> {
        let transport = crate::transport::SmtpTransport::new(options.smtp_config())?;
        Self::new(options, transport)
    }

    pub fn options(&self) -> &EmailSinkOptions {
        &self.options
    }

    /// Compose the message for a batch, or `None` for an empty batch
    pub fn compose(&self, events: &[LogEvent]) -> Result<Option<EmailMessage>> {
        if events.is_empty() {
            return Ok(None);
        }

        let body = self.options.body.render(events)?;
        let subject = render_subject(events, self.options.subject.as_ref())?;

        Ok(Some(EmailMessage::new(
            self.options.from.clone(),
            self.options.to.iter().cloned(),
            subject,
            body,
            self.options.is_body_html,
        )))
    }

    /// Send one batch as a single email
    ///
    /// Empty batches are ignored. Rendering and transport failures are
    /// returned unchanged; nothing is retried.
    pub async fn emit_batch(&self, events: &[LogEvent]) -> Result<()> {
        let Some(message) = self.compose(events)? else {
            return Ok(());
        };
        self.transport.send(&message).await
    }

    pub fn is_healthy(&self) -> bool {
        self.transport.is_healthy()
    }

    /// Release the transport
    pub async fn dispose(self) -> Result<()> {
        self.transport.release().await
    }
}

impl std::fmt::Debug for EmailSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailSink")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// The most severe event of a batch; the earliest one wins a tie
pub fn most_severe(events: &[LogEvent]) -> Option<&LogEvent> {
    events.iter().fold(None, |best: Option<&LogEvent>, event| match best {
        Some(best) if best.level >= event.level => Some(best),
        _ => Some(event),
    })
}

/// Render the subject line for a non-empty batch
///
/// The most severe event is rendered with `formatter` and only its first
/// line is kept.
pub fn render_subject(events: &[LogEvent], formatter: &dyn TextFormatter) -> Result<String> {
    let event = most_severe(events)
        .ok_or_else(|| EmailSinkError::invalid_argument("cannot render a subject for an empty batch"))?;

    let mut rendered = String::new();
    formatter.format(event, &mut rendered)?;

    Ok(first_line(&rendered).to_string())
}

fn first_line(text: &str) -> &str {
    match text.find(['\r', '\n']) {
        Some(end) => &text[..end],
        None => text,
    }
}
