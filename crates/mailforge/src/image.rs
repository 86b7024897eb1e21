//! Inline images for HTML bodies.

use crate::capability::Figure;
use crate::error::{Error, Result};
use mailforge_mime::{ContentType, Part};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Structured image record: raw bytes plus their MIME type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageSpec {
    /// Image bytes.
    pub content: Option<Vec<u8>>,
    /// MIME subtype (`png`, `jpeg`, ...).
    pub subtype: Option<String>,
    /// MIME main type; `image` when absent.
    pub maintype: Option<String>,
}

impl ImageSpec {
    /// Record with content and subtype.
    #[must_use]
    pub fn new(content: Vec<u8>, subtype: impl Into<String>) -> Self {
        Self {
            content: Some(content),
            subtype: Some(subtype.into()),
            maintype: None,
        }
    }
}

/// Value that can be embedded as an inline image.
#[derive(Clone)]
pub enum BodyImage {
    /// File on disk; the type is guessed from the extension.
    Path(PathBuf),
    /// Raw PNG bytes.
    Bytes(Vec<u8>),
    /// Structured record.
    Spec(ImageSpec),
    /// Figure exported as PNG.
    Figure(Arc<dyn Figure>),
    /// String that must name an existing file.
    Reference(String),
}

impl fmt::Debug for BodyImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Self::Spec(spec) => f.debug_tuple("Spec").field(&spec.subtype).finish(),
            Self::Figure(figure) => f.debug_tuple("Figure").field(figure).finish(),
            Self::Reference(reference) => f.debug_tuple("Reference").field(reference).finish(),
        }
    }
}

impl BodyImage {
    /// Resolves the image to its bytes and content type.
    ///
    /// # Errors
    ///
    /// - `MissingField` if a record lacks `content` and/or `subtype`
    /// - `UnsupportedType` if a file's type cannot be guessed
    /// - `InvalidReference` if a string does not name an existing file
    /// - `Io` if a file or figure cannot be read
    pub fn resolve(&self) -> Result<(ContentType, Vec<u8>)> {
        match self {
            Self::Bytes(bytes) => Ok((ContentType::new("image", "png"), bytes.clone())),
            Self::Figure(figure) => Ok((ContentType::new("image", "png"), figure.export("png")?)),
            Self::Spec(spec) => {
                let mut missing = Vec::new();
                if spec.content.is_none() {
                    missing.push("content".to_string());
                }
                if spec.subtype.is_none() {
                    missing.push("subtype".to_string());
                }
                match (&spec.content, &spec.subtype) {
                    (Some(content), Some(subtype)) => {
                        let maintype = spec.maintype.as_deref().unwrap_or("image");
                        Ok((ContentType::new(maintype, subtype.as_str()), content.clone()))
                    }
                    _ => Err(Error::MissingField(missing)),
                }
            }
            Self::Path(path) => read_image(path),
            Self::Reference(reference) => {
                let path = PathBuf::from(reference);
                if !path.is_file() {
                    return Err(Error::InvalidReference(format!(
                        "Unknown image string '{reference}'. Maybe incorrect path?"
                    )));
                }
                read_image(&path)
            }
        }
    }

    /// Builds the inline MIME part for this image.
    ///
    /// # Errors
    ///
    /// See [`BodyImage::resolve`].
    pub fn to_part(&self, content_id: &str) -> Result<Part> {
        let (content_type, content) = self.resolve()?;
        Ok(Part::inline(&content_type, content, content_id))
    }
}

fn read_image(path: &std::path::Path) -> Result<(ContentType, Vec<u8>)> {
    let guessed = mime_guess::from_path(path).first().ok_or_else(|| {
        Error::UnsupportedType(format!("cannot determine image type of '{}'", path.display()))
    })?;
    let content = std::fs::read(path)?;
    Ok((
        ContentType::new(guessed.type_().as_str(), guessed.subtype().as_str()),
        content,
    ))
}

impl From<PathBuf> for BodyImage {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&std::path::Path> for BodyImage {
    fn from(path: &std::path::Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<Vec<u8>> for BodyImage {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<ImageSpec> for BodyImage {
    fn from(spec: ImageSpec) -> Self {
        Self::Spec(spec)
    }
}

impl From<&str> for BodyImage {
    fn from(reference: &str) -> Self {
        Self::Reference(reference.to_string())
    }
}

impl From<String> for BodyImage {
    fn from(reference: String) -> Self {
        Self::Reference(reference)
    }
}

impl TryFrom<&Value> for BodyImage {
    type Error = Error;

    /// Strings are file references; objects are records whose `content` is
    /// a UTF-8 string or an array of byte values.
    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::String(reference) => Ok(Self::Reference(reference.clone())),
            Value::Object(map) => {
                let content = map.get("content").map(value_bytes).transpose()?;
                let text = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);
                Ok(Self::Spec(ImageSpec {
                    content,
                    subtype: text("subtype"),
                    maintype: text("maintype"),
                }))
            }
            other => Err(Error::UnsupportedType(format!(
                "Unknown image type '{}'",
                json_type(other)
            ))),
        }
    }
}

pub(crate) fn value_bytes(value: &Value) -> Result<Vec<u8>> {
    match value {
        Value::String(text) => Ok(text.clone().into_bytes()),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|byte| u8::try_from(byte).ok())
                    .ok_or_else(|| Error::UnsupportedType("content must contain bytes".to_string()))
            })
            .collect(),
        other => Err(Error::UnsupportedType(format!(
            "content of type '{}'",
            json_type(other)
        ))),
    }
}

pub(crate) const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
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
    use serde_json::json;
    use std::io;

    #[derive(Debug)]
    struct Chart;

    impl Figure for Chart {
        fn export(&self, format: &str) -> io::Result<Vec<u8>> {
            Ok(format!("chart as {format}").into_bytes())
        }
    }

    #[test]
    fn test_missing_subtype() {
        let image = BodyImage::Spec(ImageSpec {
            content: Some(b"data".to_vec()),
            ..ImageSpec::default()
        });
        let err = image.resolve().unwrap_err();
        assert!(matches!(&err, Error::MissingField(fields) if fields == &["subtype"]));
        assert!(err.to_string().contains("subtype"));
    }

    #[test]
    fn test_missing_both_fields() {
        let err = BodyImage::Spec(ImageSpec::default()).resolve().unwrap_err();
        assert!(matches!(&err, Error::MissingField(fields) if fields == &["content", "subtype"]));
    }

    #[test]
    fn test_spec_maintype_default() {
        let (ct, content) = BodyImage::from(ImageSpec::new(b"gif".to_vec(), "gif"))
            .resolve()
            .unwrap();
        assert_eq!(ct.mime_type(), "image/gif");
        assert_eq!(content, b"gif");
    }

    #[test]
    fn test_bytes_are_png() {
        let (ct, _) = BodyImage::from(vec![1, 2, 3]).resolve().unwrap();
        assert_eq!(ct.mime_type(), "image/png");
    }

    #[test]
    fn test_figure_exports_png() {
        let (ct, content) = BodyImage::Figure(Arc::new(Chart)).resolve().unwrap();
        assert_eq!(ct.mime_type(), "image/png");
        assert_eq!(content, b"chart as png");
    }

    #[test]
    fn test_path_guesses_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.jpg");
        std::fs::write(&path, b"jpeg bytes").unwrap();

        let (ct, content) = BodyImage::from(path.as_path()).resolve().unwrap();
        assert_eq!(ct.mime_type(), "image/jpeg");
        assert_eq!(content, b"jpeg bytes");

        let reference = path.to_string_lossy().into_owned();
        assert!(BodyImage::from(reference).resolve().is_ok());
    }

    #[test]
    fn test_unknown_reference() {
        let err = BodyImage::from("no/such/image.png").resolve().unwrap_err();
        assert!(matches!(err, Error::InvalidReference(msg) if msg.contains("Maybe incorrect path?")));
    }

    #[test]
    fn test_from_json() {
        let image = BodyImage::try_from(&json!({"content": [137, 80], "subtype": "png"})).unwrap();
        let (ct, content) = image.resolve().unwrap();
        assert_eq!(ct.mime_type(), "image/png");
        assert_eq!(content, vec![137, 80]);

        let err = BodyImage::try_from(&json!(42)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedType(_)));
    }

    #[test]
    fn test_to_part() {
        let part = BodyImage::from(vec![0u8; 4]).to_part("abc@example.com").unwrap();
        assert_eq!(part.content_id(), Some("abc@example.com"));
        assert_eq!(part.body, vec![0u8; 4]);
    }
}
