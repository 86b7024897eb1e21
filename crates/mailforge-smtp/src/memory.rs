//! In-memory transport that records delivered messages.

use crate::envelope::envelope_for;
use crate::error::{Error, Result};
use crate::transport::{Connection, Transport};
use lettre::address::Envelope;
use mailforge_mime::Message;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// A message accepted by [`MemoryTransport`] together with its envelope.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Envelope the message was delivered with.
    pub envelope: Envelope,
    /// Bytes as they would have been transmitted.
    pub wire: String,
    /// The message itself.
    pub message: Message,
}

/// Transport that keeps every delivered message in a shared outbox.
///
/// Clones share the outbox, so a test can keep one handle and give another
/// to the code under test.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    outbox: Arc<Mutex<Vec<Delivery>>>,
    connections: Arc<Mutex<usize>>,
}

impl MemoryTransport {
    /// Creates an empty transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all deliveries so far.
    #[must_use]
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns all delivered messages.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.deliveries()
            .into_iter()
            .map(|delivery| delivery.message)
            .collect()
    }

    /// Number of connections opened so far.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        *self
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for MemoryTransport {
    fn connect(&self) -> Result<Box<dyn Connection>> {
        *self
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner) += 1;
        debug!("memory transport connected");
        Ok(Box::new(MemoryConnection {
            outbox: Arc::clone(&self.outbox),
            open: true,
        }))
    }
}

struct MemoryConnection {
    outbox: Arc<Mutex<Vec<Delivery>>>,
    open: bool,
}

impl Connection for MemoryConnection {
    fn send(&mut self, message: &Message) -> Result<()> {
        if !self.open {
            return Err(Error::Closed);
        }
        let envelope = envelope_for(message)?;
        let wire = message.format_without(&["bcc"])?;
        debug!(recipients = envelope.to().len(), "memory transport accepted message");

        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Delivery {
                envelope,
                wire,
                message: message.clone(),
            });
        Ok(())
    }

    fn is_alive(&mut self) -> bool {
        self.open
    }

    fn close(&mut self) -> Result<()> {
        self.open = false;
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
    use mailforge_mime::{Headers, Part};

    fn message() -> Message {
        let headers: Headers = [
            ("From", "me@example.com"),
            ("Subject", "Hi"),
            ("To", "you@example.com"),
            ("Bcc", "boss@example.com"),
        ]
        .into_iter()
        .collect();
        Message::new(headers, Part::text("plain", "Hello"))
    }

    #[test]
    fn test_memory_transport_records_messages() {
        let transport = MemoryTransport::new();
        let mut conn = transport.connect().unwrap();
        conn.send(&message()).unwrap();
        conn.close().unwrap();

        let deliveries = transport.deliveries();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].envelope.to().len(), 2);
        assert!(!deliveries[0].wire.contains("boss@example.com"));
        assert_eq!(deliveries[0].message.subject(), Some("Hi"));
        assert_eq!(transport.connection_count(), 1);
    }

    #[test]
    fn test_closed_connection_rejects_send() {
        let transport = MemoryTransport::new();
        let mut conn = transport.connect().unwrap();
        assert!(conn.is_alive());
        conn.close().unwrap();
        conn.close().unwrap();
        assert!(!conn.is_alive());
        assert!(matches!(conn.send(&message()), Err(Error::Closed)));
    }
}
