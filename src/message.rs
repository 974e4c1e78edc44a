//! The outgoing email produced for one batch of log events

use crate::error::{EmailSinkError, Result};

/// An email message ready to be handed to a transport
///
/// Messages are immutable once built; the sink creates one per non-empty
/// batch and drops it after the transport has accepted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    from: String,
    to: Vec<String>,
    subject: String,
    body: String,
    is_body_html: bool,
}

impl EmailMessage {
    pub fn new(
        from: impl Into<String>,
        to: impl IntoIterator<Item = impl Into<String>>,
        subject: impl Into<String>,
        body: impl Into<String>,
        is_body_html: bool,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into_iter().map(Into::into).collect(),
            subject: subject.into(),
            body: body.into(),
            is_body_html,
        }
    }

    /// Sender address
    pub fn from(&self) -> &str {
        &self.from
    }

    /// Recipient addresses, in configuration order
    pub fn to(&self) -> &[String] {
        &self.to
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn is_body_html(&self) -> bool {
        self.is_body_html
    }

    /// Check the message has a sender and at least one recipient
    pub fn validate(&self) -> Result<()> {
        if self.from.trim().is_empty() {
            return Err(EmailSinkError::invalid_argument("Email 'from' is required"));
        }
        if self.to.is_empty() {
            return Err(EmailSinkError::invalid_argument("Email 'to' is required"));
        }
        Ok(())
    }
}
