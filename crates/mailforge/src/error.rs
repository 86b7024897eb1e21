//! Error types for email composition.

use thiserror::Error;

/// Errors that can occur while composing or sending an email.
///
/// Every composition error aborts the whole assembly; partial messages are
/// never returned.
#[derive(Debug, Error)]
pub enum Error {
    /// No subject given and none configured.
    #[error("Email must have a subject")]
    MissingSubject,

    /// Both an inline body and a template were given for one channel.
    #[error("Either {channel} body or {channel} template must be given, not both")]
    AmbiguousBody {
        /// Body channel (`text` or `html`).
        channel: &'static str,
    },

    /// A string did not resolve to an existing file.
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// Value of a type the encoder cannot handle.
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    /// Table cannot be converted to the requested format.
    #[error("Unsupported conversion: {0}")]
    UnsupportedConversion(String),

    /// Structured image record is missing required keys.
    #[error("Missing field(s): {}", .0.join(", "))]
    MissingField(Vec<String>),

    /// Optional collaborator is not available.
    #[error("Missing capability: {0}")]
    MissingCapability(String),

    /// Invalid argument value.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Log handler has nobody to send to.
    #[error("Missing receiver")]
    MissingReceiver,

    /// Template parsing or rendering failed.
    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    /// I/O error (reading attachments, images or templates).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration could not be parsed.
    #[error("Configuration error: {0}")]
    Serde(#[from] serde_json::Error),

    /// MIME serialization failed.
    #[error("MIME error: {0}")]
    Mime(#[from] mailforge_mime::Error),

    /// Transport failed to connect or deliver.
    #[error("Transport error: {0}")]
    Transport(#[from] mailforge_smtp::Error),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
