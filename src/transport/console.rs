//! Console transport for development
//!
//! Prints log emails to stdout instead of sending them.
//!
//! # Security Warning
//!
//! Log bodies often carry sensitive data. Body content is redacted unless
//! full output is enabled; do not enable it where stdout is collected.

use super::EmailTransport;
use crate::error::Result;
use crate::message::EmailMessage;
use async_trait::async_trait;

/// A transport that prints messages to stdout
///
/// Output goes through `println!` rather than `tracing` so that printing
/// a log email never produces new log events.
///
/// # Example
///
/// ```rust,ignore
/// use tideway_email_sink::transport::ConsoleTransport;
///
/// // Default: body redacted
/// let transport = ConsoleTransport::new();
///
/// // Development only: print the rendered log lines
/// let transport = ConsoleTransport::new().with_full_output(true);
/// ```
#[derive(Debug, Clone)]
pub struct ConsoleTransport {
    prefix: String,
    show_full_content: bool,
}

impl ConsoleTransport {
    pub fn new() -> Self {
        Self::with_prefix("[LOG EMAIL]")
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            show_full_content: false,
        }
    }

    /// Print body lines instead of a redacted size summary
    pub fn with_full_output(mut self, enabled: bool) -> Self {
        self.show_full_content = enabled;
        self
    }

    fn render(&self, message: &EmailMessage) -> Vec<String> {
        let p = &self.prefix;
        let mut lines = vec![
            format!("{} ════════════════════════════════════════", p),
            format!("{} From:    {}", p, message.from()),
            format!("{} To:      {} recipient(s)", p, message.to().len()),
            format!("{} Subject: {}", p, message.subject()),
            format!("{} ────────────────────────────────────────", p),
        ];

        let kind = if message.is_body_html() { "HTML" } else { "TEXT" };
        if self.show_full_content {
            lines.push(format!("{} [{}]", p, kind));
            lines.extend(message.body().lines().map(|line| format!("{} {}", p, line)));
        } else {
            lines.push(format!("{} [{}] {} bytes [REDACTED]", p, kind, message.body().len()));
        }

        lines.push(format!("{} ════════════════════════════════════════", p));
        lines
    }
}

impl Default for ConsoleTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmailTransport for ConsoleTransport {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        message.validate()?;
        for line in self.render(message) {
            println!("{}", line);
        }
        Ok(())
    }
}
