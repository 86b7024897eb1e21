//! Attachment encoding.
//!
//! Attachments come in two forms. Named attachments pair an output filename
//! with a content source, and the filename's extension picks the format of
//! table content. File attachments are paths whose basename becomes the
//! filename.

use crate::capability::{Capabilities, Figure};
use crate::error::{Error, Result};
use crate::image::{json_type, value_bytes};
use crate::table::Table;
use mailforge_mime::Part;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::trace;

/// Content source of an attachment.
#[derive(Clone)]
pub enum Attachment {
    /// File read from disk.
    Path(PathBuf),
    /// Literal text when named; a path reference in file form.
    Text(String),
    /// Raw bytes used verbatim.
    Bytes(Vec<u8>),
    /// Table serialized by the filename's extension.
    Table(Table),
    /// Figure exported in the filename's format.
    Figure(Arc<dyn Figure>),
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Self::Table(table) => write!(f, "Table({} rows)", table.len()),
            Self::Figure(figure) => f.debug_tuple("Figure").field(figure).finish(),
        }
    }
}

impl Attachment {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Path(_) => "path",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Table(_) => "table",
            Self::Figure(_) => "figure",
        }
    }
}

impl From<&str> for Attachment {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Attachment {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<PathBuf> for Attachment {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for Attachment {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<Vec<u8>> for Attachment {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Table> for Attachment {
    fn from(table: Table) -> Self {
        Self::Table(table)
    }
}

/// The attachments of one message, in insertion order per form.
#[derive(Debug, Clone, Default)]
pub struct Attachments {
    named: Vec<(String, Attachment)>,
    files: Vec<Attachment>,
}

impl Attachments {
    /// No attachments.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds content under an output filename.
    pub fn add_named(&mut self, filename: impl Into<String>, content: impl Into<Attachment>) {
        self.named.push((filename.into(), content.into()));
    }

    /// Adds a file whose basename becomes the filename.
    pub fn add_file(&mut self, file: impl Into<Attachment>) {
        self.files.push(file.into());
    }

    /// Number of attachments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.named.len() + self.files.len()
    }

    /// Whether there are no attachments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.named.is_empty() && self.files.is_empty()
    }

    /// Encodes every attachment, named ones first.
    ///
    /// # Errors
    ///
    /// Returns the first encoding error; no parts are returned in that case.
    pub fn to_parts(&self, capabilities: &Capabilities) -> Result<Vec<Part>> {
        let encoder = AttachmentEncoder::new(capabilities);
        let mut parts = Vec::with_capacity(self.len());
        for (filename, content) in &self.named {
            parts.push(encoder.encode_named(filename, content)?);
        }
        for file in &self.files {
            parts.push(encoder.encode_file(file)?);
        }
        Ok(parts)
    }
}

impl TryFrom<&Value> for Attachments {
    type Error = Error;

    /// An object maps filenames to text or byte arrays; an array or a single
    /// string lists file paths.
    fn try_from(value: &Value) -> Result<Self> {
        let mut attachments = Self::new();
        match value {
            Value::Object(map) => {
                for (filename, content) in map {
                    let content = match content {
                        Value::String(text) => Attachment::Text(text.clone()),
                        Value::Array(_) => Attachment::Bytes(value_bytes(content)?),
                        other => {
                            return Err(Error::UnsupportedType(format!(
                                "attachment '{filename}' of type '{}'",
                                json_type(other)
                            )));
                        }
                    };
                    attachments.add_named(filename.as_str(), content);
                }
            }
            Value::Array(items) => {
                for item in items {
                    let path = item.as_str().ok_or_else(|| {
                        Error::UnsupportedType(format!("attachment of type '{}'", json_type(item)))
                    })?;
                    attachments.add_file(path);
                }
            }
            Value::String(path) => attachments.add_file(path.as_str()),
            other => {
                return Err(Error::UnsupportedType(format!(
                    "attachments of type '{}'",
                    json_type(other)
                )));
            }
        }
        Ok(attachments)
    }
}

/// Turns attachment content into MIME parts.
#[derive(Debug, Clone, Copy)]
pub struct AttachmentEncoder<'a> {
    capabilities: &'a Capabilities,
}

impl<'a> AttachmentEncoder<'a> {
    /// Creates an encoder using the given collaborators.
    #[must_use]
    pub const fn new(capabilities: &'a Capabilities) -> Self {
        Self { capabilities }
    }

    /// Encodes content under an explicit filename.
    ///
    /// # Errors
    ///
    /// - `UnsupportedConversion` for a table with an unknown extension
    /// - `MissingCapability` for `.xlsx` without a spreadsheet writer
    /// - `Io` if a file or figure cannot be read
    pub fn encode_named(&self, filename: &str, content: &Attachment) -> Result<Part> {
        let bytes = match content {
            Attachment::Text(text) => text.clone().into_bytes(),
            Attachment::Bytes(bytes) => bytes.clone(),
            Attachment::Path(path) => std::fs::read(path)?,
            Attachment::Table(table) => self.serialize_table(filename, table)?,
            Attachment::Figure(figure) => {
                figure.export(extension(filename).as_deref().unwrap_or("png"))?
            }
        };
        trace!(filename, kind = content.kind(), bytes = bytes.len(), "attachment encoded");
        Ok(Part::attachment(filename, bytes))
    }

    /// Encodes a file reference, named after its basename.
    ///
    /// # Errors
    ///
    /// - `InvalidReference` if a string does not name an existing file
    /// - `UnsupportedType` for content that is not a file reference
    /// - `Io` if the file cannot be read
    pub fn encode_file(&self, file: &Attachment) -> Result<Part> {
        let path = match file {
            Attachment::Path(path) => path.clone(),
            Attachment::Text(reference) => {
                let path = PathBuf::from(reference);
                if !path.is_file() {
                    return Err(Error::InvalidReference(format!(
                        "Attachment '{reference}' is not a file. Perhaps a mistyped path?"
                    )));
                }
                path
            }
            other => {
                return Err(Error::UnsupportedType(format!(
                    "unnamed attachment of kind '{}' needs a filename",
                    other.kind()
                )));
            }
        };
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| Error::InvalidReference(format!("'{}' has no file name", path.display())))?;
        let bytes = std::fs::read(&path)?;
        trace!(filename = %filename, bytes = bytes.len(), "file attached");
        Ok(Part::attachment(&filename, bytes))
    }

    fn serialize_table(&self, filename: &str, table: &Table) -> Result<Vec<u8>> {
        match extension(filename).as_deref() {
            Some("csv") => table.to_csv(),
            Some("html") => Ok(table.to_html().into_bytes()),
            Some("txt") => Ok(table.to_text().into_bytes()),
            Some("xlsx") => {
                let writer = self.capabilities.spreadsheet.as_ref().ok_or_else(|| {
                    Error::MissingCapability("a spreadsheet writer is needed for .xlsx".to_string())
                })?;
                Ok(writer.write_xlsx(table)?)
            }
            _ => Err(Error::UnsupportedConversion(format!(
                "Unknown conversion to file type of '{filename}'"
            ))),
        }
    }
}

fn extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
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
    use crate::capability::SpreadsheetWriter;
    use serde_json::json;
    use std::io;

    #[derive(Debug)]
    struct FakeXlsx;

    impl SpreadsheetWriter for FakeXlsx {
        fn write_xlsx(&self, table: &Table) -> io::Result<Vec<u8>> {
            Ok(format!("xlsx:{}", table.len()).into_bytes())
        }
    }

    fn table() -> Table {
        let mut table = Table::new(["a", "b"]);
        table.push_row(["1", "2"]).unwrap();
        table
    }

    #[test]
    fn test_named_text_is_literal() {
        let caps = Capabilities::none();
        let part = AttachmentEncoder::new(&caps)
            .encode_named("data.txt", &Attachment::from("Some content"))
            .unwrap();
        assert_eq!(part.filename().as_deref(), Some("data.txt"));
        assert_eq!(part.body, b"Some content");
        assert_eq!(part.mime_type(), "application/octet-stream");
    }

    #[test]
    fn test_named_table_by_extension() {
        let caps = Capabilities::none();
        let encoder = AttachmentEncoder::new(&caps);
        let content = Attachment::from(table());

        let csv = encoder.encode_named("report.csv", &content).unwrap();
        assert_eq!(String::from_utf8(csv.body).unwrap(), ",a,b\n0,1,2\n");

        let html = encoder.encode_named("report.HTML", &content).unwrap();
        assert!(String::from_utf8(html.body).unwrap().contains("<table"));

        let text = encoder.encode_named("report.txt", &content).unwrap();
        assert_eq!(text.body, table().to_text().into_bytes());

        let err = encoder.encode_named("report.pdf", &content).unwrap_err();
        assert!(matches!(err, Error::UnsupportedConversion(_)));
    }

    #[test]
    fn test_xlsx_needs_capability() {
        let content = Attachment::from(table());
        let caps = Capabilities::none();
        let err = AttachmentEncoder::new(&caps)
            .encode_named("report.xlsx", &content)
            .unwrap_err();
        assert!(matches!(err, Error::MissingCapability(_)));

        let caps = Capabilities::none().with_spreadsheet(FakeXlsx);
        let part = AttachmentEncoder::new(&caps)
            .encode_named("report.xlsx", &content)
            .unwrap();
        assert_eq!(part.body, b"xlsx:1");
    }

    #[test]
    fn test_file_uses_basename() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# Notes").unwrap();

        let caps = Capabilities::none();
        let encoder = AttachmentEncoder::new(&caps);
        let part = encoder.encode_file(&Attachment::from(path.as_path())).unwrap();
        assert_eq!(part.filename().as_deref(), Some("notes.md"));
        assert_eq!(part.body, b"# Notes");

        let by_string = encoder
            .encode_file(&Attachment::from(path.to_string_lossy().into_owned()))
            .unwrap();
        assert_eq!(by_string.filename().as_deref(), Some("notes.md"));
    }

    #[test]
    fn test_file_rejects_bare_string() {
        let caps = Capabilities::none();
        let err = AttachmentEncoder::new(&caps)
            .encode_file(&Attachment::from("just some text"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidReference(msg) if msg.contains("Perhaps a mistyped path?")));
    }

    #[test]
    fn test_file_rejects_bytes() {
        let caps = Capabilities::none();
        let err = AttachmentEncoder::new(&caps)
            .encode_file(&Attachment::from(vec![1, 2, 3]))
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedType(_)));
    }

    #[test]
    fn test_attachments_from_json() {
        let attachments =
            Attachments::try_from(&json!({"a.txt": "hello", "b.bin": [0, 255]})).unwrap();
        assert_eq!(attachments.len(), 2);
        let parts = attachments.to_parts(&Capabilities::none()).unwrap();
        assert_eq!(parts[0].body, b"hello");
        assert_eq!(parts[1].body, vec![0, 255]);

        assert!(matches!(
            Attachments::try_from(&json!({"a.txt": 5})).unwrap_err(),
            Error::UnsupportedType(_)
        ));
        assert!(matches!(
            Attachments::try_from(&json!(true)).unwrap_err(),
            Error::UnsupportedType(_)
        ));
    }
}
