//! # mailforge-smtp
//!
//! Transport collaborator for mailforge: delivers assembled
//! [`mailforge_mime::Message`]s.
//!
//! ## Features
//!
//! - **Transport abstraction**: [`Transport`] opens a [`Connection`] that
//!   sends messages until closed
//! - **SMTP**: [`SmtpTransport`] over `lettre`, with STARTTLS, implicit TLS
//!   or plaintext and optional credentials
//! - **In-memory outbox**: [`MemoryTransport`] records deliveries for tests
//!   and dry runs
//! - **Envelope**: sender and recipients (including Bcc) taken from the
//!   message headers, with the `Bcc` header stripped from the wire bytes
//!
//! ## Quick Start
//!
//! ```no_run
//! use mailforge_smtp::{Security, SmtpConfig, SmtpTransport, Transport};
//! # fn run(message: &mailforge_mime::Message) -> mailforge_smtp::Result<()> {
//! let config = SmtpConfig::builder("smtp.example.com")
//!     .security(Security::StartTls)
//!     .credentials("me@example.com", "app-password")
//!     .build();
//!
//! let transport = SmtpTransport::new(config);
//! let mut connection = transport.connect()?;
//! connection.send(message)?;
//! connection.close()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod config;
mod envelope;
mod error;
mod memory;
mod smtp;
mod transport;

pub use config::{Security, SmtpConfig, SmtpConfigBuilder};
pub use envelope::{envelope_for, parse_address};
pub use error::{Error, Result};
pub use memory::{Delivery, MemoryTransport};
pub use smtp::SmtpTransport;
pub use transport::{Connection, Transport};
