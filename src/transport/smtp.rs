//! SMTP transport using lettre
//!
//! A new connection is opened for every message and closed after it is
//! sent; log email volume is low enough that pooling buys nothing.

use super::EmailTransport;
use crate::error::{EmailSinkError, Result};
use crate::message::EmailMessage;
use crate::options::{Credentials, SecureSocketOptions, DEFAULT_PORT};
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::{
        authentication::Credentials as SmtpCredentials,
        client::{Tls, TlsParameters},
    },
};

/// SMTP connection settings
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// SMTP server hostname
    pub host: String,
    /// SMTP server port (default: 25)
    pub port: u16,
    pub credentials: Option<Credentials>,
    /// TLS negotiation mode (default: `Auto`)
    pub security: SecureSocketOptions,
    /// Skip server certificate and hostname checks. Test servers only.
    pub accept_invalid_certificates: bool,
}

impl SmtpConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            credentials: None,
            security: SecureSocketOptions::default(),
            accept_invalid_certificates: false,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    pub fn security(mut self, security: SecureSocketOptions) -> Self {
        self.security = security;
        self
    }

    pub fn accept_invalid_certificates(mut self, accept: bool) -> Self {
        self.accept_invalid_certificates = accept;
        self
    }
}

/// SMTP transport
///
/// # Example
///
/// ```rust,ignore
/// use tideway_email_sink::transport::{SmtpConfig, SmtpTransport};
/// use tideway_email_sink::SecureSocketOptions;
///
/// let config = SmtpConfig::new("smtp.example.com")
///     .port(587)
///     .security(SecureSocketOptions::StartTls)
///     .credentials("alerts", "app-password");
///
/// let transport = SmtpTransport::new(config)?;
/// ```
pub struct SmtpTransport {
    config: SmtpConfig,
}

impl SmtpTransport {
    /// Create a transport; fails if no host is configured
    pub fn new(config: SmtpConfig) -> Result<Self> {
        if config.host.trim().is_empty() {
            return Err(EmailSinkError::invalid_argument("SMTP 'host' is required"));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &SmtpConfig {
        &self.config
    }

    fn tls_parameters(&self) -> Result<TlsParameters> {
        TlsParameters::builder(self.config.host.clone())
            .dangerous_accept_invalid_certs(self.config.accept_invalid_certificates)
            .dangerous_accept_invalid_hostnames(self.config.accept_invalid_certificates)
            .build()
            .map_err(|e| EmailSinkError::transport(format!("Failed to configure TLS: {}", e)))
    }

    fn connect(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let tls = match self.config.security.resolve(self.config.port) {
            SecureSocketOptions::None => Tls::None,
            SecureSocketOptions::SslOnConnect => Tls::Wrapper(self.tls_parameters()?),
            SecureSocketOptions::StartTls => Tls::Required(self.tls_parameters()?),
            SecureSocketOptions::StartTlsWhenAvailable | SecureSocketOptions::Auto => {
                Tls::Opportunistic(self.tls_parameters()?)
            }
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.host)
            .port(self.config.port)
            .tls(tls);

        if let Some(credentials) = &self.config.credentials {
            builder = builder.credentials(SmtpCredentials::new(
                credentials.username.clone(),
                credentials.password.clone(),
            ));
        }

        Ok(builder.build())
    }
}

/// Convert a message into a lettre MIME message
pub(crate) fn build_message(message: &EmailMessage) -> Result<Message> {
    let from: Mailbox = message
        .from()
        .parse()
        .map_err(|e| EmailSinkError::transport(format!("Invalid 'from' address: {}", e)))?;

    let mut builder = Message::builder().from(from).subject(message.subject());

    for to in message.to() {
        let mailbox: Mailbox = to
            .parse()
            .map_err(|e| EmailSinkError::transport(format!("Invalid 'to' address '{}': {}", to, e)))?;
        builder = builder.to(mailbox);
    }

    let content_type = if message.is_body_html() {
        ContentType::TEXT_HTML
    } else {
        ContentType::TEXT_PLAIN
    };

    builder
        .header(content_type)
        .body(message.body().to_string())
        .map_err(|e| EmailSinkError::transport(format!("Failed to build email: {}", e)))
}

#[async_trait]
impl EmailTransport for SmtpTransport {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        message.validate()?;

        let mime = build_message(message)?;
        let transport = self.connect()?;

        transport
            .send(mime)
            .await
            .map_err(|e| EmailSinkError::transport(format!("Failed to send email: {}", e)))?;

        tracing::debug!(
            host = %self.config.host,
            recipients = message.to().len(),
            "Log email sent"
        );
        Ok(())
    }
}

// Implement Debug manually to keep credentials out of output
impl std::fmt::Debug for SmtpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpTransport")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("security", &self.config.security)
            .finish()
    }
}
