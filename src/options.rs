//! Email sink options
//!
//! [`EmailSinkOptions`] carries everything the sink and its SMTP transport
//! need: addresses, server settings and the subject/body formatters. It is a
//! plain mutable struct with builder-style setters; the sink takes ownership
//! and never changes it afterwards.

use crate::address::{split_addresses, validate_address};
use crate::error::{EmailSinkError, Result};
use crate::format::{
    BatchTextFormatter, BodyFormatter, DEFAULT_SUBJECT_TEMPLATE, MessageTemplateFormatter,
    TextFormatter,
};
use crate::utils::{get_env_with_prefix, parse_env};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Default SMTP port
pub const DEFAULT_PORT: u16 = 25;

/// Port conventionally used for implicit TLS
const IMPLICIT_TLS_PORT: u16 = 465;

/// TLS negotiation for the SMTP connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecureSocketOptions {
    /// Plain text, no TLS
    None,
    /// Implicit TLS on port 465, opportunistic STARTTLS elsewhere
    #[default]
    Auto,
    /// TLS from the first byte (implicit TLS)
    SslOnConnect,
    /// STARTTLS, failing if the server does not offer it
    StartTls,
    /// STARTTLS when offered, plain text otherwise
    StartTlsWhenAvailable,
}

impl SecureSocketOptions {
    /// Resolve `Auto` to a concrete mode for `port`
    pub fn resolve(self, port: u16) -> Self {
        match self {
            SecureSocketOptions::Auto if port == IMPLICIT_TLS_PORT => SecureSocketOptions::SslOnConnect,
            SecureSocketOptions::Auto => SecureSocketOptions::StartTlsWhenAvailable,
            other => other,
        }
    }
}

impl FromStr for SecureSocketOptions {
    type Err = EmailSinkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "none" | "plain" => Ok(Self::None),
            "auto" => Ok(Self::Auto),
            "sslonconnect" | "tls" | "ssl" => Ok(Self::SslOnConnect),
            "starttls" => Ok(Self::StartTls),
            "starttlswhenavailable" | "opportunistic" => Ok(Self::StartTlsWhenAvailable),
            other => Err(EmailSinkError::invalid_argument(format!(
                "unknown connection security '{}'",
                other
            ))),
        }
    }
}

/// SMTP authentication credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Settings for an email sink
#[derive(Clone)]
pub struct EmailSinkOptions {
    /// Sender address
    pub from: String,
    /// Recipient addresses
    pub to: Vec<String>,
    /// SMTP server hostname
    pub host: String,
    /// SMTP server port (default: 25)
    pub port: u16,
    pub credentials: Option<Credentials>,
    /// TLS negotiation mode (default: `Auto`)
    pub connection_security: SecureSocketOptions,
    /// Skip server certificate and hostname checks (default: false)
    pub accept_invalid_certificates: bool,
    /// Renders the subject from the most severe event of a batch
    pub subject: Arc<dyn TextFormatter>,
    /// Renders the body
    pub body: BodyFormatter,
    /// Send the body as HTML (default: false)
    pub is_body_html: bool,
}

impl Default for EmailSinkOptions {
    fn default() -> Self {
        Self {
            from: String::new(),
            to: Vec::new(),
            host: String::new(),
            port: DEFAULT_PORT,
            credentials: None,
            connection_security: SecureSocketOptions::default(),
            accept_invalid_certificates: false,
            subject: Arc::new(MessageTemplateFormatter::new(DEFAULT_SUBJECT_TEMPLATE)),
            body: BodyFormatter::default(),
            is_body_html: false,
        }
    }
}

impl EmailSinkOptions {
    /// Create options for sending from `from` to the comma or semicolon
    /// separated recipient list `to` through the SMTP server `host`
    pub fn new(from: impl Into<String>, to: &str, host: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: split_addresses(to),
            host: host.into(),
            ..Self::default()
        }
    }

    /// Replace the recipient list with already separated addresses
    pub fn to_addresses(mut self, to: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.to = to.into_iter().map(Into::into).collect();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    pub fn connection_security(mut self, security: SecureSocketOptions) -> Self {
        self.connection_security = security;
        self
    }

    pub fn accept_invalid_certificates(mut self, accept: bool) -> Self {
        self.accept_invalid_certificates = accept;
        self
    }

    /// Use a message template for the subject, e.g. `"[{Level}] {Message}"`
    pub fn subject_template(self, template: impl Into<String>) -> Self {
        self.subject_formatter(MessageTemplateFormatter::new(template))
    }

    pub fn subject_formatter(mut self, formatter: impl TextFormatter + 'static) -> Self {
        self.subject = Arc::new(formatter);
        self
    }

    /// Use a message template rendered once per event for the body
    pub fn body_template(self, template: impl Into<String>) -> Self {
        self.body_formatter(MessageTemplateFormatter::new(template))
    }

    pub fn body_formatter(mut self, formatter: impl TextFormatter + 'static) -> Self {
        self.body = BodyFormatter::per_event(formatter);
        self
    }

    /// Use a formatter that renders the whole batch as one body
    pub fn batch_body_formatter(mut self, formatter: impl BatchTextFormatter + 'static) -> Self {
        self.body = BodyFormatter::batch(formatter);
        self
    }

    pub fn html(mut self, is_body_html: bool) -> Self {
        self.is_body_html = is_body_html;
        self
    }

    /// Check the sender and recipients
    ///
    /// Host settings are checked by the SMTP transport, since other
    /// transports do not use them.
    pub fn validate(&self) -> Result<()> {
        if self.from.trim().is_empty() {
            return Err(EmailSinkError::invalid_argument("Email 'from' is required"));
        }
        validate_address(crate::address::bare_address(&self.from))?;

        if self.to.is_empty() {
            return Err(EmailSinkError::invalid_argument("Email 'to' is required"));
        }
        for address in &self.to {
            validate_address(address)?;
        }
        Ok(())
    }

    /// SMTP settings for building an `SmtpTransport`
    #[cfg(feature = "smtp")]
    pub fn smtp_config(&self) -> crate::transport::SmtpConfig {
        crate::transport::SmtpConfig {
            host: self.host.clone(),
            port: self.port,
            credentials: self.credentials.clone(),
            security: self.connection_security,
            accept_invalid_certificates: self.accept_invalid_certificates,
        }
    }

    /// Load options from environment variables
    ///
    /// Reads `TIDEWAY_EMAIL_*`, falling back to `EMAIL_*`:
    /// - `FROM`, `TO`, `HOST` (required)
    /// - `PORT` (default: 25)
    /// - `USERNAME` / `PASSWORD` (optional, both needed for auth)
    /// - `SECURITY` (`none`, `auto`, `ssl_on_connect`, `start_tls`,
    ///   `start_tls_when_available`; default: `auto`)
    /// - `SUBJECT`, `BODY` (message templates)
    /// - `HTML` (default: false)
    pub fn from_env() -> Result<Self> {
        let required = |key: &str| {
            get_env_with_prefix(key).ok_or_else(|| {
                EmailSinkError::invalid_argument(format!("{} environment variable not set", key))
            })
        };

        let mut options = Self::new(required("EMAIL_FROM")?, &required("EMAIL_TO")?, required("EMAIL_HOST")?);

        if let Some(port) = parse_env("EMAIL_PORT") {
            options.port = port;
        }

        if let (Some(username), Some(password)) = (
            get_env_with_prefix("EMAIL_USERNAME"),
            get_env_with_prefix("EMAIL_PASSWORD"),
        ) {
            options.credentials = Some(Credentials::new(username, password));
        }

        if let Some(security) = get_env_with_prefix("EMAIL_SECURITY") {
            options.connection_security = security.parse()?;
        }

        if let Some(subject) = get_env_with_prefix("EMAIL_SUBJECT") {
            options = options.subject_template(subject);
        }

        if let Some(body) = get_env_with_prefix("EMAIL_BODY") {
            options = options.body_template(body);
        }

        if let Some(html) = parse_env("EMAIL_HTML") {
            options.is_body_html = html;
        }

        options.validate()?;
        Ok(options)
    }
}

impl fmt::Debug for EmailSinkOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailSinkOptions")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("credentials", &self.credentials)
            .field("connection_security", &self.connection_security)
            .field("body", &self.body)
            .field("is_body_html", &self.is_body_html)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = EmailSinkOptions::new("from@test.com", "to@test.com", "smtp.test.com");

        assert_eq!(options.port, 25);
        assert_eq!(options.to, vec!["to@test.com"]);
        assert!(options.credentials.is_none());
        assert_eq!(options.connection_security, SecureSocketOptions::Auto);
        assert!(!options.is_body_html);
        assert!(matches!(options.body, BodyFormatter::PerEvent(_)));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_recipient_string_is_split() {
        let options = EmailSinkOptions::new("from@test.com", "to@a, Name <to@b>; to@c", "smtp");
        assert_eq!(options.to, vec!["to@a", "to@b", "to@c"]);
    }

    #[test]
    fn test_validation_errors() {
        let missing_from = EmailSinkOptions::new("", "to@test.com", "smtp");
        assert!(missing_from.validate().unwrap_err().to_string().contains("'from'"));

        let missing_to = EmailSinkOptions::new("from@test.com", " ; ", "smtp");
        assert!(missing_to.validate().unwrap_err().to_string().contains("'to'"));

        let bad_to = EmailSinkOptions::new("from@test.com", "nobody", "smtp");
        assert!(bad_to.validate().unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_from_with_display_name_is_valid() {
        let options = EmailSinkOptions::new("Alerts <alerts@test.com>", "to@test.com", "smtp");
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_secure_socket_options_resolve() {
        assert_eq!(SecureSocketOptions::Auto.resolve(465), SecureSocketOptions::SslOnConnect);
        assert_eq!(SecureSocketOptions::Auto.resolve(25), SecureSocketOptions::StartTlsWhenAvailable);
        assert_eq!(SecureSocketOptions::None.resolve(465), SecureSocketOptions::None);
    }

    #[test]
    fn test_secure_socket_options_parse() {
        assert_eq!("start_tls".parse::<SecureSocketOptions>().unwrap(), SecureSocketOptions::StartTls);
        assert_eq!("SslOnConnect".parse::<SecureSocketOptions>().unwrap(), SecureSocketOptions::SslOnConnect);
        assert_eq!(
            "start-tls-when-available".parse::<SecureSocketOptions>().unwrap(),
            SecureSocketOptions::StartTlsWhenAvailable
        );
        assert!("sometimes".parse::<SecureSocketOptions>().is_err());
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let options = EmailSinkOptions::new("from@test.com", "to@test.com", "smtp")
            .credentials("user", "hunter2");
        let debug = format!("{:?}", options);
        assert!(debug.contains("user"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_from_env() {
        unsafe {
            std::env::set_var("TIDEWAY_EMAIL_FROM", "env-from@test.com");
            std::env::set_var("TIDEWAY_EMAIL_TO", "a@test.com;b@test.com");
            std::env::set_var("TIDEWAY_EMAIL_HOST", "smtp.env.test");
            std::env::set_var("TIDEWAY_EMAIL_PORT", "2525");
            std::env::set_var("TIDEWAY_EMAIL_SECURITY", "none");
            std::env::set_var("TIDEWAY_EMAIL_HTML", "true");
        }

        let options = EmailSinkOptions::from_env().unwrap();
        assert_eq!(options.from, "env-from@test.com");
        assert_eq!(options.to, vec!["a@test.com", "b@test.com"]);
        assert_eq!(options.host, "smtp.env.test");
        assert_eq!(options.port, 2525);
        assert_eq!(options.connection_security, SecureSocketOptions::None);
        assert!(options.is_body_html);

        unsafe {
            for key in ["FROM", "TO", "HOST", "PORT", "SECURITY", "HTML"] {
                std::env::remove_var(format!("TIDEWAY_EMAIL_{}", key));
            }
        }
    }
}
