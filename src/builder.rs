//! Registration of the email sink
//!
//! [`EmailLayerBuilder`] collects sink options, the minimum level and the
//! batching settings, then starts the worker and returns the layer to install
//! on a `tracing` subscriber.

use crate::batching::{BatchingOptions, EmailSinkGuard, spawn_batching};
use crate::error::Result;
use crate::event::Level;
use crate::format::{BatchTextFormatter, TextFormatter};
use crate::layer::EmailLayer;
use crate::options::{EmailSinkOptions, SecureSocketOptions};
use crate::sink::EmailSink;
use crate::transport::EmailTransport;
use crate::utils::parse_env;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Relay {
    Smtp,
    SqlServer {
        profile_name: String,
        connection_string: String,
    },
}

/// Builder for an [`EmailLayer`]
///
/// # Example
///
/// ```rust,ignore
/// use tideway_email_sink::{EmailLayerBuilder, Level, SecureSocketOptions};
/// use std::time::Duration;
///
/// let (layer, guard) = EmailLayerBuilder::new("app@example.com", "ops@example.com; dba@example.com", "smtp.example.com")
///     .port(587)
///     .connection_security(SecureSocketOptions::StartTls)
///     .credentials("app", "app-password")
///     .subject_template("[{Level}] {Message}")
///     .minimum_level(Level::Error)
///     .batch_size_limit(100)
///     .period(Duration::from_secs(30))
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct EmailLayerBuilder {
    options: EmailSinkOptions,
    relay: Relay,
    minimum_level: Level,
    batching: BatchingOptions,
}

impl EmailLayerBuilder {
    /// Send through the SMTP server `host`
    ///
    /// `to` may hold several addresses separated by commas or semicolons.
    pub fn new(from: impl Into<String>, to: &str, host: impl Into<String>) -> Self {
        Self::from_options(EmailSinkOptions::new(from, to, host))
    }

    /// Relay through SQL Server Database Mail using `profile_name`
    ///
    /// Requires the `sqlserver` feature when built.
    pub fn sql_server(
        from: impl Into<String>,
        to: &str,
        profile_name: impl Into<String>,
        connection_string: impl Into<String>,
    ) -> Self {
        let mut builder = Self::from_options(EmailSinkOptions::new(from, to, ""));
        builder.relay = Relay::SqlServer {
            profile_name: profile_name.into(),
            connection_string: connection_string.into(),
        };
        builder
    }

    /// Start from existing sink options, delivering over SMTP
    pub fn from_options(options: EmailSinkOptions) -> Self {
        Self {
            options,
            relay: Relay::Smtp,
            minimum_level: Level::Verbose,
            batching: BatchingOptions::default(),
        }
    }

    /// Load sink and batching options from the environment
    ///
    /// See [`EmailSinkOptions::from_env`] and [`BatchingOptions::from_env`].
    /// `EMAIL_MINIMUM_LEVEL` sets the minimum level.
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::from_options(EmailSinkOptions::from_env()?);
        builder.batching = BatchingOptions::from_env();
        if let Some(level) = parse_env("EMAIL_MINIMUM_LEVEL") {
            builder.minimum_level = level;
        }
        Ok(builder)
    }

    pub fn port(mut self, port: u16) -> Self {
        self.options = self.options.port(port);
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.options = self.options.credentials(username, password);
        self
    }

    pub fn connection_security(mut self, security: SecureSocketOptions) -> Self {
        self.options = self.options.connection_security(security);
        self
    }

    pub fn accept_invalid_certificates(mut self, accept: bool) -> Self {
        self.options = self.options.accept_invalid_certificates(accept);
        self
    }

    pub fn subject_template(mut self, template: impl Into<String>) -> Self {
        self.options = self.options.subject_template(template);
        self
    }

    pub fn subject_formatter(mut self, formatter: impl TextFormatter + 'static) -> Self {
        self.options = self.options.subject_formatter(formatter);
        self
    }

    pub fn body_template(mut self, template: impl Into<String>) -> Self {
        self.options = self.options.body_template(template);
        self
    }

    pub fn body_formatter(mut self, formatter: impl TextFormatter + 'static) -> Self {
        self.options = self.options.body_formatter(formatter);
        self
    }

    pub fn batch_body_formatter(mut self, formatter: impl BatchTextFormatter + 'static) -> Self {
        self.options = self.options.batch_body_formatter(formatter);
        self
    }

    pub fn html(mut self, is_body_html: bool) -> Self {
        self.options = self.options.html(is_body_html);
        self
    }

    /// Ignore events below `level` (default: `Verbose`)
    pub fn minimum_level(mut self, level: Level) -> Self {
        self.minimum_level = level;
        self
    }

    pub fn batch_size_limit(mut self, limit: usize) -> Self {
        self.batching = self.batching.batch_size_limit(limit);
        self
    }

    pub fn period(mut self, period: Duration) -> Self {
        self.batching = self.batching.period(period);
        self
    }

    pub fn queue_limit(mut self, limit: Option<usize>) -> Self {
        self.batching = self.batching.queue_limit(limit);
        self
    }

    pub fn eagerly_emit_first_event(mut self, eager: bool) -> Self {
        self.batching = self.batching.eagerly_emit_first_event(eager);
        self
    }

    /// Replace all batching settings at once
    pub fn batching(mut self, batching: BatchingOptions) -> Self {
        self.batching = batching;
        self
    }

    pub fn options(&self) -> &EmailSinkOptions {
        &self.options
    }

    /// Build the sink for the configured relay and start the worker
    ///
    /// Must be called inside a tokio runtime.
    pub fn build(self) -> Result<(EmailLayer, EmailSinkGuard)> {
        let sink = match &self.relay {
            Relay::Smtp => smtp_sink(self.options)?,
            Relay::SqlServer {
                profile_name,
                connection_string,
            } => sql_server_sink(self.options, profile_name, connection_string)?,
        };
        start(sink, self.batching, self.minimum_level)
    }

    /// Build the sink with a custom transport and start the worker
    pub fn build_with_transport(self, transport: impl EmailTransport + 'static) -> Result<(EmailLayer, EmailSinkGuard)> {
        let sink = EmailSink::new(self.options, transport)?;
        start(sink, self.batching, self.minimum_level)
    }
}

fn start(sink: EmailSink, batching: BatchingOptions, minimum_level: Level) -> Result<(EmailLayer, EmailSinkGuard)> {
    let (guard, sender) = spawn_batching(sink, batching)?;
    Ok((EmailLayer::new(sender, minimum_level), guard))
}

#[cfg(feature = "smtp")]
fn smtp_sink(options: EmailSinkOptions) -> Result<EmailSink> {
    EmailSink::smtp(options)
}

#[cfg(not(feature = "smtp"))]
fn smtp_sink(_options: EmailSinkOptions) -> Result<EmailSink> {
    Err(crate::error::EmailSinkError::invalid_argument(
        "SMTP delivery requires the `smtp` feature",
    ))
}

#[cfg(feature = "sqlserver")]
fn sql_server_sink(options: EmailSinkOptions, profile_name: &str, connection_string: &str) -> Result<EmailSink> {
    let transport = crate::transport::SqlServerTransport::new(profile_name, connection_string)?;
    EmailSink::new(options, transport)
}

#[cfg(not(feature = "sqlserver"))]
fn sql_server_sink(_options: EmailSinkOptions, profile_name: &str, connection_string: &str) -> Result<EmailSink> {
    crate::transport::validate_settings(profile_name, connection_string)?;
    Err(crate::error::EmailSinkError::invalid_argument(
        "SQL Server delivery requires the `sqlserver` feature",
    ))
}
