//! Tideway Email Sink - send application logs by email
//!
//! Log events recorded with `tracing` are grouped into batches and each batch
//! is delivered as a single email. The subject is taken from the most severe
//! event of the batch; the body renders every event in order.
//!
//! # Features
//!
//! - **SMTP** (default `smtp` feature): delivery through lettre, with
//!   plaintext, implicit TLS or STARTTLS connections
//! - **SQL Server** (`sqlserver` feature): relay through Database Mail
//! - **Templates**: subject and body rendered from message templates, or any
//!   [`TextFormatter`] / [`BatchTextFormatter`]
//! - **Batching**: size limit, flush period, bounded queue
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tideway_email_sink::{EmailLayerBuilder, Level};
//!
//! #[tokio::main]
//! async fn main() -> tideway_email_sink::Result<()> {
//!     let (layer, guard) = EmailLayerBuilder::new("app@example.com", "ops@example.com", "smtp.example.com")
//!         .subject_template("[{Level}] {Message}")
//!         .minimum_level(Level::Error)
//!         .build()?;
//!
//!     tideway_email_sink::init_tracing_with_email(layer)?;
//!
//!     tracing::error!(order_id = 42, "Payment provider unavailable");
//!
//!     // Send anything still queued and release the transport
//!     guard.shutdown().await
//! }
//! ```

pub mod address;
pub mod batching;
mod builder;
mod error;
mod event;
pub mod format;
mod layer;
mod message;
mod options;
mod sink;
pub mod transport;
mod utils;

// Re-exports for public API
pub use batching::{BatchingOptions, EmailSinkGuard, EventSender, spawn_batching};
pub use builder::EmailLayerBuilder;
pub use error::{EmailSinkError, Result};
pub use event::{Level, LogEvent};
pub use format::{BatchTextFormatter, BodyFormatter, MessageTemplateFormatter, TextFormatter};
pub use layer::EmailLayer;
pub use message::EmailMessage;
pub use options::{Credentials, DEFAULT_PORT, EmailSinkOptions, SecureSocketOptions};
pub use sink::{EmailSink, most_severe, render_subject};
pub use transport::{ConsoleTransport, EmailTransport, InMemoryTransport};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with console output and the email layer
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "debug", "my_app=debug")
/// - `TIDEWAY_LOG_JSON`: Set to "true" for JSON formatted console logs
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing_with_email(layer: EmailLayer) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = utils::get_env_with_prefix("LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    let installed = if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .with(layer)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .with(layer)
            .try_init()
    };

    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {}", e).into())
}
