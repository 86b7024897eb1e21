//! # mailforge
//!
//! Compose and send formatted email without building MIME trees by hand.
//!
//! ## Features
//!
//! - **Bodies**: text and HTML bodies rendered as templates, with access to
//!   the sender, the machine, the current user and time, and an error report
//! - **Inline images**: files, bytes, records or figures embedded by
//!   Content-ID and referenced from the HTML body
//! - **Tables**: rendered through themes in both bodies, or attached as CSV,
//!   HTML, text or spreadsheet files
//! - **Attachments**: literal content under a filename, or files by path
//! - **Sending**: one connection per message, or a scoped session reusing one
//! - **Logging**: `tracing` layers that mail single events or batches
//!
//! ## Quick Start
//!
//! ```
//! use mailforge::{Compose, EmailSender, SenderConfig};
//! use mailforge_smtp::MemoryTransport;
//!
//! let outbox = MemoryTransport::new();
//! let config = SenderConfig::builder("smtp.example.com", 587)
//!     .sender("reports@example.com")
//!     .build();
//! let mut sender = EmailSender::new(config).unwrap().with_transport(outbox.clone());
//!
//! let message = sender
//!     .send(
//!         &Compose::new()
//!             .subject("Daily report")
//!             .receiver("team@example.com")
//!             .text("Hi {{ name }}, all systems nominal.")
//!             .param("name", "team")
//!             .attachment("data.txt", "Some content"),
//!     )
//!     .unwrap();
//!
//! assert_eq!(message.root.mime_type(), "multipart/mixed");
//! assert_eq!(outbox.messages().len(), 1);
//! ```
//!
//! ### Composing without sending
//!
//! ```
//! use mailforge::{Compose, EmailSender, SenderConfig};
//!
//! let sender = EmailSender::new(SenderConfig::new("localhost", 25)).unwrap();
//! let message = sender
//!     .get_message(&Compose::new().subject("Hi").sender("me@example.com").text("Hello"))
//!     .unwrap();
//! assert_eq!(message.root.mime_type(), "text/plain");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod assembler;
mod attachment;
mod body;
mod capability;
mod config;
mod error;
mod error_report;
mod image;
pub mod log;
mod sender;
pub mod table;
pub mod templates;

pub use address::EmailAddress;
pub use assembler::MessageAssembler;
pub use attachment::{Attachment, AttachmentEncoder, Attachments};
pub use body::{BodyInputs, BodyRenderer, Channel, check_body, current_user, node_name};
pub use capability::{Capabilities, CssInliner, Figure, SpreadsheetWriter};
pub use config::{Compose, Defaults, Resolved, SenderConfig, SenderConfigBuilder};
pub use error::{Error, Result};
pub use error_report::{ErrorRenderer, ErrorReport, RenderKind};
pub use image::{BodyImage, ImageSpec};
pub use mailforge_mime::{Message, Part};
pub use mailforge_smtp::Security;
pub use sender::{EmailSender, Session};
pub use table::{BodyTable, StyledTable, Table};
pub use templates::{TemplateKind, Templates};
