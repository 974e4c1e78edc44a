/// The error type for the email sink
#[derive(Debug, thiserror::Error)]
pub enum EmailSinkError {
    /// A required setting was missing or malformed. Raised before any I/O.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A formatter failed while rendering the subject or body
    #[error("Formatting failed: {0}")]
    Format(String),

    /// The transport could not deliver the message
    #[error("Transport error: {0}")]
    Transport(String),

    /// The batching worker has stopped and accepts no more work
    #[error("Email sink is closed")]
    Closed,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EmailSinkError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Whether the error was raised while validating configuration
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}

impl From<std::fmt::Error> for EmailSinkError {
    fn from(_: std::fmt::Error) -> Self {
        Self::Format("formatter returned an error".to_string())
    }
}

/// Result type alias for email sink operations
pub type Result<T> = std::result::Result<T, EmailSinkError>;
