//! # mailforge-mime
//!
//! MIME message model and serialization for outgoing email.
//!
//! ## Features
//!
//! - **Part tree**: Leaf parts and mixed, alternative, related containers
//! - **Serialization**: CRLF wire format with boundaries and MIME-Version
//! - **Encoding**: Base64, Quoted-Printable, RFC 2047 header encoding
//! - **Identifiers**: Unique Message-IDs, Content-IDs and boundaries
//!
//! ## Quick Start
//!
//! ```
//! use mailforge_mime::{Headers, Message, Part};
//!
//! let mut headers = Headers::new();
//! headers.add("From", "sender@example.com");
//! headers.add("Subject", "Test");
//! headers.add("To", "recipient@example.com");
//!
//! let root = Part::multipart(
//!     "alternative",
//!     vec![Part::text("plain", "Hello"), Part::text("html", "<p>Hello</p>")],
//! );
//! let message = Message::new(headers, root);
//!
//! let wire = message.format().unwrap();
//! assert!(wire.contains("multipart/alternative"));
//! ```
//!
//! ### Encoding
//!
//! ```
//! use mailforge_mime::encoding::{decode_base64, encode_base64, encode_rfc2047};
//!
//! let encoded = encode_base64(b"Hello, World!");
//! assert_eq!(decode_base64(&encoded).unwrap(), b"Hello, World!");
//! assert_eq!(encode_rfc2047("Héllo"), "=?utf-8?B?SMOpbGxv?=");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod content_type;
mod error;
mod header;
mod message;

pub mod encoding;
pub mod id;

pub use content_type::ContentType;
pub use encoding::TransferEncoding;
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Message, Part};
