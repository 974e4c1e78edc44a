//! SQL Server Database Mail relay
//!
//! Hands messages to `msdb.dbo.sp_send_dbmail`; SQL Server's mail subsystem
//! performs the actual delivery using a configured Database Mail profile.

use crate::error::{EmailSinkError, Result};
#[cfg(feature = "sqlserver")]
use crate::message::EmailMessage;

/// Stored procedure call issued for each message
#[cfg(feature = "sqlserver")]
pub const SEND_DBMAIL_STATEMENT: &str = "EXEC msdb.dbo.sp_send_dbmail \
     @profile_name = @P1, @from_address = @P2, @recipients = @P3, \
     @subject = @P4, @body = @P5, @body_format = @P6";

/// Parameters passed to `sp_send_dbmail`, in statement order
#[cfg(feature = "sqlserver")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbMailRequest {
    pub profile_name: String,
    pub from_address: String,
    /// Semicolon-separated, as Database Mail expects
    pub recipients: String,
    pub subject: String,
    pub body: String,
    /// `HTML` or `TEXT`
    pub body_format: String,
}

#[cfg(feature = "sqlserver")]
impl DbMailRequest {
    pub fn new(profile_name: &str, message: &EmailMessage) -> Self {
        Self {
            profile_name: profile_name.to_string(),
            from_address: message.from().to_string(),
            recipients: message.to().join(";"),
            subject: message.subject().to_string(),
            body: message.body().to_string(),
            body_format: if message.is_body_html() { "HTML" } else { "TEXT" }.to_string(),
        }
    }
}

/// Check the Database Mail settings before anything connects
pub(crate) fn validate_settings(profile_name: &str, connection_string: &str) -> Result<()> {
    if profile_name.trim().is_empty() {
        return Err(EmailSinkError::invalid_argument(
            "Database Mail 'profile_name' cannot be empty",
        ));
    }
    if connection_string.trim().is_empty() {
        return Err(EmailSinkError::invalid_argument(
            "SQL Server 'connection_string' cannot be empty",
        ));
    }
    Ok(())
}

#[cfg(feature = "sqlserver")]
pub use client::SqlServerTransport;

#[cfg(feature = "sqlserver")]
mod client {
    use super::{DbMailRequest, SEND_DBMAIL_STATEMENT, validate_settings};
    use crate::error::{EmailSinkError, Result};
    use crate::message::EmailMessage;
    use crate::transport::EmailTransport;
    use async_trait::async_trait;
    use tiberius::{Client, Config};
    use tokio::net::TcpStream;
    use tokio::sync::Mutex;
    use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

    type SqlClient = Client<Compat<TcpStream>>;

    /// Transport that relays messages through SQL Server Database Mail
    ///
    /// The connection is opened on the first send and reused until the
    /// transport is released. A failed call drops the connection so the next
    /// send reconnects.
    pub struct SqlServerTransport {
        profile_name: String,
        config: Config,
        client: Mutex<Option<SqlClient>>,
    }

    impl SqlServerTransport {
        /// Create a transport from a Database Mail profile and an ADO.NET
        /// style connection string
        ///
        /// Fails without connecting if either is empty or the connection
        /// string cannot be parsed.
        pub fn new(profile_name: impl Into<String>, connection_string: &str) -> Result<Self> {
            let profile_name = profile_name.into();
            validate_settings(&profile_name, connection_string)?;

            let config = Config::from_ado_string(connection_string).map_err(|e| {
                EmailSinkError::invalid_argument(format!("Invalid SQL Server connection string: {}", e))
            })?;

            Ok(Self {
                profile_name,
                config,
                client: Mutex::new(None),
            })
        }

        pub fn profile_name(&self) -> &str {
            &self.profile_name
        }

        async fn connect(&self) -> Result<SqlClient> {
            let tcp = TcpStream::connect(self.config.get_addr())
                .await
                .map_err(|e| EmailSinkError::transport(format!("Failed to connect to SQL Server: {}", e)))?;
            tcp.set_nodelay(true)
                .map_err(|e| EmailSinkError::transport(format!("Failed to configure socket: {}", e)))?;

            Client::connect(self.config.clone(), tcp.compat_write())
                .await
                .map_err(|e| EmailSinkError::transport(format!("Failed to open SQL Server session: {}", e)))
        }
    }

    #[async_trait]
    impl EmailTransport for SqlServerTransport {
        async fn send(&self, message: &EmailMessage) -> Result<()> {
            let request = DbMailRequest::new(&self.profile_name, message);

            let mut guard = self.client.lock().await;
            if guard.is_none() {
                *guard = Some(self.connect().await?);
            }
            let Some(client) = guard.as_mut() else {
                return Err(EmailSinkError::transport("SQL Server connection unavailable"));
            };

            let result = client
                .execute(
                    SEND_DBMAIL_STATEMENT,
                    &[
                        &request.profile_name,
                        &request.from_address,
                        &request.recipients,
                        &request.subject,
                        &request.body,
                        &request.body_format,
                    ],
                )
                .await;

            if let Err(e) = result {
                *guard = None;
                return Err(EmailSinkError::transport(format!("sp_send_dbmail failed: {}", e)));
            }
            Ok(())
        }

        async fn release(&self) -> Result<()> {
            let client = self.client.lock().await.take();
            if let Some(client) = client {
                client
                    .close()
                    .await
                    .map_err(|e| EmailSinkError::transport(format!("Failed to close SQL Server connection: {}", e)))?;
            }
            Ok(())
        }
    }

    impl std::fmt::Debug for SqlServerTransport {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("SqlServerTransport")
                .field("profile_name", &self.profile_name)
                .field("addr", &self.config.get_addr())
                .finish()
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "sqlserver")]
    #[test]
    fn test_statement_binds_every_request_field() {
        for placeholder in ["@P1", "@P2", "@P3", "@P4", "@P5", "@P6"] {
            assert!(SEND_DBMAIL_STATEMENT.contains(placeholder));
        }
        assert!(SEND_DBMAIL_STATEMENT.starts_with("EXEC msdb.dbo.sp_send_dbmail"));
    }

    #[cfg(feature = "sqlserver")]
    #[test]
    fn test_request_maps_message_fields() {
        let message = EmailMessage::new(
            "alerts@example.com",
            ["ops@example.com", "dba@example.com"],
            "[Error] B",
            "<b>B</b>",
            true,
        );
        let request = DbMailRequest::new("LogProfile", &message);

        assert_eq!(request.profile_name, "LogProfile");
        assert_eq!(request.from_address, "alerts@example.com");
        assert_eq!(request.recipients, "ops@example.com;dba@example.com");
        assert_eq!(request.subject, "[Error] B");
        assert_eq!(request.body, "<b>B</b>");
        assert_eq!(request.body_format, "HTML");
    }

    #[cfg(feature = "sqlserver")]
    #[test]
    fn test_request_plain_text_format() {
        let message = EmailMessage::new("a@example.com", ["b@example.com"], "s", "b", false);
        assert_eq!(DbMailRequest::new("p", &message).body_format, "TEXT");
    }

    #[test]
    fn test_validate_settings() {
        assert!(validate_settings("LogProfile", "Server=tcp:db,1433").is_ok());
        assert!(validate_settings("", "Server=tcp:db,1433").unwrap_err().is_invalid_argument());
        assert!(validate_settings("LogProfile", "").unwrap_err().is_invalid_argument());
    }
}
