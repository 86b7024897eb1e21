//! Error types for transport operations.

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Transport error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid email address in a message header.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Envelope could not be built from the message headers.
    #[error("Invalid envelope: {0}")]
    Envelope(#[from] lettre::error::Error),

    /// SMTP transport error (connection, TLS, authentication, rejected command).
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// Message could not be serialized.
    #[error("MIME error: {0}")]
    Mime(#[from] mailforge_mime::Error),

    /// Operation on a connection that was already closed.
    #[error("Connection is closed")]
    Closed,
}

impl Error {
    /// Returns true if the server rejected the transaction permanently (5xx).
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Smtp(err) if err.is_permanent())
    }

    /// Returns true if the server reported a transient failure (4xx).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Smtp(err) if err.is_transient())
    }
}
