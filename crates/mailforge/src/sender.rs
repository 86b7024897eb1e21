//! Sending composed messages.

use crate::assembler::MessageAssembler;
use crate::capability::Capabilities;
use crate::config::{Compose, SenderConfig};
use crate::error::Result;
use crate::templates::Templates;
use mailforge_mime::Message;
use mailforge_smtp::{Connection, SmtpTransport, Transport};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Composes messages and hands them to a transport.
///
/// Without an open connection every send opens and closes its own one.
/// [`EmailSender::session`] keeps a connection open for several sends.
pub struct EmailSender {
    config: SenderConfig,
    templates: Templates,
    capabilities: Capabilities,
    transport: Option<Arc<dyn Transport>>,
    connection: Option<Box<dyn Connection>>,
}

impl EmailSender {
    /// Creates a sender that delivers over SMTP using `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in templates fail to load.
    pub fn new(config: SenderConfig) -> Result<Self> {
        Ok(Self {
            config,
            templates: Templates::new()?,
            capabilities: Capabilities::none(),
            transport: None,
            connection: None,
        })
    }

    /// Delivers through `transport` instead of SMTP.
    #[must_use]
    pub fn with_transport(self, transport: impl Transport + 'static) -> Self {
        self.with_shared_transport(Arc::new(transport))
    }

    pub(crate) fn with_shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the optional collaborators.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &SenderConfig {
        &self.config
    }

    /// Returns the configuration for changes; they apply from the next message.
    pub const fn config_mut(&mut self) -> &mut SenderConfig {
        &mut self.config
    }

    /// Returns the template environments.
    #[must_use]
    pub const fn templates(&self) -> &Templates {
        &self.templates
    }

    /// Returns the template environments for changes.
    pub const fn templates_mut(&mut self) -> &mut Templates {
        &mut self.templates
    }

    /// Points template environments at directories.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory is missing or a template fails to parse.
    pub fn set_template_paths(
        &mut self,
        html: Option<&Path>,
        text: Option<&Path>,
        html_table: Option<&Path>,
        text_table: Option<&Path>,
    ) -> Result<()> {
        self.templates
            .set_template_paths(html, text, html_table, text_table)
    }

    /// Assembles a message without sending it.
    ///
    /// # Errors
    ///
    /// Returns any composition error.
    pub fn get_message(&self, compose: &Compose) -> Result<Message> {
        MessageAssembler::new(&self.config, &self.templates, &self.capabilities).assemble(compose)
    }

    /// Assembles and sends a message, returning what was sent.
    ///
    /// # Errors
    ///
    /// Returns any composition or transport error; nothing is sent if
    /// composition fails.
    pub fn send(&mut self, compose: &Compose) -> Result<Message> {
        let message = self.get_message(compose)?;
        self.send_message(&message)?;
        Ok(message)
    }

    /// Sends an assembled message.
    ///
    /// # Errors
    ///
    /// Returns the transport error.
    pub fn send_message(&mut self, message: &Message) -> Result<()> {
        if let Some(connection) = self.connection.as_mut() {
            connection.send(message)?;
        } else {
            let mut connection = self.transport().connect()?;
            let sent = connection.send(message);
            let closed = connection.close();
            sent?;
            closed?;
        }
        info!(
            subject = message.subject().unwrap_or_default(),
            to = message.to().unwrap_or_default(),
            "message sent"
        );
        Ok(())
    }

    /// Opens a connection used by the following sends, replacing any open one.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be opened.
    pub fn connect(&mut self) -> Result<()> {
        self.close()?;
        self.connection = Some(self.transport().connect()?);
        debug!(host = %self.config.host, port = self.config.port, "connection opened");
        Ok(())
    }

    /// Closes the open connection, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to acknowledge the close.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut connection) = self.connection.take() {
            connection.close()?;
            debug!("connection closed");
        }
        Ok(())
    }

    /// Whether a connection is being held open.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.connection.is_some()
    }

    /// Opens a connection that stays open until the returned guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be opened.
    pub fn session(&mut self) -> Result<Session<'_>> {
        self.connect()?;
        Ok(Session { sender: self })
    }

    fn transport(&self) -> Arc<dyn Transport> {
        self.transport.as_ref().map_or_else(
            || Arc::new(SmtpTransport::new(self.config.smtp_config())) as Arc<dyn Transport>,
            Arc::clone,
        )
    }
}

/// Copies configuration, templates and transport; the connection stays behind.
impl Clone for EmailSender {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            templates: self.templates.clone(),
            capabilities: self.capabilities.clone(),
            transport: self.transport.clone(),
            connection: None,
        }
    }
}

impl fmt::Debug for EmailSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailSender")
            .field("config", &self.config)
            .field("capabilities", &self.capabilities)
            .field("custom_transport", &self.transport.is_some())
            .field("connected", &self.is_alive())
            .finish_non_exhaustive()
    }
}

/// Open connection scope; closes the connection when dropped.
pub struct Session<'a> {
    sender: &'a mut EmailSender,
}

impl Deref for Session<'_> {
    type Target = EmailSender;

    fn deref(&self) -> &Self::Target {
        self.sender
    }
}

impl DerefMut for Session<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.sender
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.sender.close() {
            warn!(error = %e, "failed to close connection");
        }
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
    use crate::error::Error;
    use mailforge_smtp::MemoryTransport;

    fn sender(outbox: &MemoryTransport) -> EmailSender {
        let config = SenderConfig::builder("localhost", 25)
            .sender("me@example.com")
            .receivers(["you@example.com"])
            .build();
        EmailSender::new(config)
            .unwrap()
            .with_transport(outbox.clone())
    }

    #[test]
    fn test_send_opens_and_closes() {
        let outbox = MemoryTransport::new();
        let mut sender = sender(&outbox);

        sender.send(&Compose::new().subject("one").text("1")).unwrap();
        sender.send(&Compose::new().subject("two").text("2")).unwrap();

        assert_eq!(outbox.messages().len(), 2);
        assert_eq!(outbox.connection_count(), 2);
        assert!(!sender.is_alive());
    }

    #[test]
    fn test_session_reuses_connection() {
        let outbox = MemoryTransport::new();
        let mut sender = sender(&outbox);
        {
            let mut session = sender.session().unwrap();
            assert!(session.is_alive());
            session.send(&Compose::new().subject("one").text("1")).unwrap();
            session.send(&Compose::new().subject("two").text("2")).unwrap();
        }
        assert!(!sender.is_alive());
        assert_eq!(outbox.connection_count(), 1);
        assert_eq!(outbox.messages().len(), 2);
    }

    #[test]
    fn test_session_closes_on_error() {
        let outbox = MemoryTransport::new();
        let mut sender = sender(&outbox);
        let result = (|| -> Result<()> {
            let mut session = sender.session()?;
            session.send(&Compose::new().text("no subject"))?;
            Ok(())
        })();
        assert!(matches!(result, Err(Error::MissingSubject)));
        assert!(!sender.is_alive());
        assert!(outbox.messages().is_empty());
    }

    #[test]
    fn test_clone_drops_connection() {
        let outbox = MemoryTransport::new();
        let mut sender = sender(&outbox);
        sender.connect().unwrap();

        let copy = sender.clone();
        assert!(sender.is_alive());
        assert!(!copy.is_alive());
        assert_eq!(copy.config(), sender.config());
        sender.close().unwrap();
    }

    #[test]
    fn test_config_changes_apply() {
        let outbox = MemoryTransport::new();
        let mut sender = sender(&outbox);
        sender.config_mut().defaults.subject = Some("Configured".to_string());

        let message = sender.send(&Compose::new().text("x")).unwrap();
        assert_eq!(message.subject(), Some("Configured"));
    }
}
