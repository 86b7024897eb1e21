//! SMTP transport over `lettre`.

use crate::config::{Security, SmtpConfig};
use crate::envelope::envelope_for;
use crate::error::{Error, Result};
use crate::transport::{Connection, Transport};
use lettre::Transport as _;
use lettre::transport::smtp::SmtpTransportBuilder;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::transport::smtp::extension::ClientId;
use mailforge_mime::Message;
use tracing::{debug, info, warn};

/// Transport that delivers messages to an SMTP server.
#[derive(Debug, Clone)]
pub struct SmtpTransport {
    config: SmtpConfig,
}

impl SmtpTransport {
    /// Creates a transport for the given server configuration.
    #[must_use]
    pub const fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    /// Returns the server configuration.
    #[must_use]
    pub const fn config(&self) -> &SmtpConfig {
        &self.config
    }

    fn builder(&self) -> Result<SmtpTransportBuilder> {
        let host = self.config.host.as_str();
        let mut builder = match self.config.security {
            Security::Tls => lettre::SmtpTransport::relay(host)?,
            Security::StartTls => {
                let params = TlsParameters::new(host.to_string())?;
                lettre::SmtpTransport::builder_dangerous(host).tls(Tls::Required(params))
            }
            Security::None => lettre::SmtpTransport::builder_dangerous(host).tls(Tls::None),
        };

        builder = builder.port(self.config.port);

        if let Some((user, pass)) = self.config.credentials() {
            builder = builder.credentials(Credentials::new(user.to_string(), pass.to_string()));
        }

        if let Some(timeout) = self.config.timeout {
            builder = builder.timeout(Some(timeout));
        }

        if let Some(ref name) = self.config.hello_name {
            builder = builder.hello_name(ClientId::Domain(name.clone()));
        }

        Ok(builder)
    }
}

impl Transport for SmtpTransport {
    fn connect(&self) -> Result<Box<dyn Connection>> {
        let transport = self.builder()?.build();

        if !transport.test_connection()? {
            warn!(host = %self.config.host, port = self.config.port, "SMTP server did not accept connection");
        }
        info!(
            host = %self.config.host,
            port = self.config.port,
            security = ?self.config.security,
            "SMTP connection established"
        );

        Ok(Box::new(SmtpConnection {
            transport: Some(transport),
            host: self.config.host.clone(),
        }))
    }
}

/// Open SMTP session.
///
/// The underlying transport keeps the server connection open between sends
/// and shuts it down when closed or dropped.
struct SmtpConnection {
    transport: Option<lettre::SmtpTransport>,
    host: String,
}

impl Connection for SmtpConnection {
    fn send(&mut self, message: &Message) -> Result<()> {
        let transport = self.transport.as_ref().ok_or(Error::Closed)?;
        let envelope = envelope_for(message)?;
        let wire = message.format_without(&["bcc"])?;

        transport.send_raw(&envelope, wire.as_bytes())?;
        debug!(
            host = %self.host,
            recipients = envelope.to().len(),
            bytes = wire.len(),
            "message sent"
        );
        Ok(())
    }

    fn is_alive(&mut self) -> bool {
        self.transport
            .as_ref()
            .is_some_and(|transport| transport.test_connection().unwrap_or(false))
    }

    fn close(&mut self) -> Result<()> {
        if self.transport.take().is_some() {
            debug!(host = %self.host, "SMTP connection closed");
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_builder_accepts_every_security_mode() {
        for security in [Security::None, Security::StartTls, Security::Tls] {
            let config = SmtpConfig::builder("localhost")
                .security(security)
                .credentials("user", "pass")
                .timeout(Duration::from_secs(1))
                .hello_name("client.example.com")
                .build();
            assert!(SmtpTransport::new(config).builder().is_ok());
        }
    }

    #[test]
    fn test_connect_to_closed_port_fails() {
        let config = SmtpConfig::builder("127.0.0.1")
            .security(Security::None)
            .port(1)
            .timeout(Duration::from_secs(1))
            .build();
        let transport = SmtpTransport::new(config);
        assert!(matches!(transport.connect(), Err(Error::Smtp(_))));
    }
}
