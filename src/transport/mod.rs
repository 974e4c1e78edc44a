//! Mail transports
//!
//! A transport delivers a composed [`EmailMessage`]. Backends:
//! - `SmtpTransport` - SMTP via lettre (`smtp` feature, on by default)
//! - `SqlServerTransport` - SQL Server Database Mail (`sqlserver` feature)
//! - [`InMemoryTransport`] - records messages, for tests
//! - [`ConsoleTransport`] - prints messages to stdout, for development
//!
//! # Example
//!
//! ```rust,ignore
//! use tideway_email_sink::transport::{EmailTransport, SmtpConfig, SmtpTransport};
//!
//! let transport = SmtpTransport::new(SmtpConfig::new("smtp.example.com").port(587))?;
//! transport.send(&message).await?;
//! transport.release().await?;
//! ```

mod console;
mod memory;
#[cfg(feature = "smtp")]
mod smtp;
mod sql_server;

pub use console::ConsoleTransport;
pub use memory::InMemoryTransport;
#[cfg(feature = "smtp")]
pub use smtp::{SmtpConfig, SmtpTransport};
#[cfg(not(feature = "sqlserver"))]
pub(crate) use sql_server::validate_settings;
#[cfg(feature = "sqlserver")]
pub use sql_server::{DbMailRequest, SEND_DBMAIL_STATEMENT, SqlServerTransport};

use crate::error::Result;
use crate::message::EmailMessage;
use async_trait::async_trait;

/// Delivery mechanism for composed messages
///
/// Implementations own their connection or client handle. The sink calls
/// [`release`](EmailTransport::release) exactly once when it is disposed.
///
/// # Example
///
/// ```rust,ignore
/// use tideway_email_sink::{EmailMessage, Result};
/// use tideway_email_sink::transport::EmailTransport;
/// use async_trait::async_trait;
///
/// struct WebhookTransport;
///
/// #[async_trait]
/// impl EmailTransport for WebhookTransport {
///     async fn send(&self, message: &EmailMessage) -> Result<()> {
///         // Hand the message to your provider
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Deliver a message
    ///
    /// Failures are returned to the caller and never retried here.
    async fn send(&self, message: &EmailMessage) -> Result<()>;

    /// Release connections or clients held by the transport
    async fn release(&self) -> Result<()> {
        Ok(())
    }

    /// Whether the backend is believed to be usable
    fn is_healthy(&self) -> bool {
        true
    }
}

#[async_trait]
impl<T: EmailTransport + ?Sized> EmailTransport for Box<T> {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        (**self).send(message).await
    }

    async fn release(&self) -> Result<()> {
        (**self).release().await
    }

    fn is_healthy(&self) -> bool {
        (**self).is_healthy()
    }
}
