//! Rendering of an error (type, message and trace) into a body.

use crate::error::{Error, Result};
use html_escape::encode_text;
use serde::Serialize;
use std::fmt;

/// Snapshot of an error for inclusion in an email.
///
/// The trace holds one entry per error in the `source()` chain, outermost
/// first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    /// Name of the error type.
    pub exception_type: String,
    /// Display text of the error.
    pub exception_message: String,
    /// Formatted trace lines.
    pub traceback: Vec<String>,
}

impl ErrorReport {
    /// Creates a report from a type name and message.
    #[must_use]
    pub fn new(exception_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            exception_type: exception_type.into(),
            exception_message: message.into(),
            traceback: Vec::new(),
        }
    }

    /// Sets the trace lines.
    #[must_use]
    pub fn with_traceback(mut self, traceback: Vec<String>) -> Self {
        self.traceback = traceback;
        self
    }

    /// Captures an error, its type name and its source chain.
    #[must_use]
    pub fn from_error<E: std::error::Error>(err: &E) -> Self {
        let type_name = std::any::type_name::<E>();
        let short = type_name.rsplit("::").next().unwrap_or(type_name);
        Self::from_dyn(short, err)
    }

    /// Captures a type-erased error under the given type name.
    #[must_use]
    pub fn from_dyn(exception_type: &str, err: &dyn std::error::Error) -> Self {
        let mut traceback = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            traceback.push(format!("  caused by: {cause}"));
            source = cause.source();
        }
        Self::new(exception_type, err.to_string()).with_traceback(traceback)
    }

    fn trace_block(&self) -> String {
        self.traceback.join("\n")
    }
}

/// Output markup of a rendered error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderKind {
    /// Plain text traceback block.
    Text,
    /// HTML with inline styles.
    HtmlInline,
    /// HTML with class names for external styling.
    Html,
}

impl RenderKind {
    /// Parses a content-type tag: `text`, `html-inline` or `html`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for any other tag.
    pub fn parse(tag: &str) -> Result<Self> {
        match tag {
            "text" => Ok(Self::Text),
            "html-inline" => Ok(Self::HtmlInline),
            "html" => Ok(Self::Html),
            other => Err(Error::InvalidArgument(format!(
                "Invalid content type: {other}"
            ))),
        }
    }
}

/// An optional error bound to the markup it renders as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRenderer {
    kind: RenderKind,
    report: Option<ErrorReport>,
}

impl ErrorRenderer {
    /// Creates a renderer for a content-type tag.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the tag is not recognized.
    pub fn new(tag: &str, report: Option<ErrorReport>) -> Result<Self> {
        Ok(Self::with_kind(RenderKind::parse(tag)?, report))
    }

    /// Creates a renderer for an already parsed kind.
    #[must_use]
    pub const fn with_kind(kind: RenderKind, report: Option<ErrorReport>) -> Self {
        Self { kind, report }
    }

    /// True iff an error is present.
    #[must_use]
    pub const fn has_error(&self) -> bool {
        self.report.is_some()
    }

    /// The captured report, if any.
    #[must_use]
    pub const fn report(&self) -> Option<&ErrorReport> {
        self.report.as_ref()
    }

    /// Name of the error type.
    #[must_use]
    pub fn exception_type(&self) -> Option<&str> {
        self.report.as_ref().map(|r| r.exception_type.as_str())
    }

    /// Display text of the error.
    #[must_use]
    pub fn exception_message(&self) -> Option<&str> {
        self.report.as_ref().map(|r| r.exception_message.as_str())
    }

    /// Trace lines of the error.
    #[must_use]
    pub fn traceback(&self) -> Option<&[String]> {
        self.report.as_ref().map(|r| r.traceback.as_slice())
    }

    /// Renders according to the bound kind; empty without an error.
    #[must_use]
    pub fn render(&self) -> String {
        let rendered = match self.kind {
            RenderKind::Text => self.as_text(),
            RenderKind::HtmlInline => self.as_html_inline(),
            RenderKind::Html => self.as_html(),
        };
        rendered.unwrap_or_default()
    }

    /// Traceback block as plain text.
    #[must_use]
    pub fn as_text(&self) -> Option<String> {
        let report = self.report.as_ref()?;
        Some(format!(
            "Traceback (most recent call last):\n{}\n{}: {}",
            report.trace_block(),
            report.exception_type,
            report.exception_message
        ))
    }

    /// Escaped HTML with inline styles.
    #[must_use]
    pub fn as_html_inline(&self) -> Option<String> {
        let report = self.report.as_ref()?;
        Some(format!(
            concat!(
                "<div>\n",
                "    <h4>Traceback (most recent call last):</h4>\n",
                "    <pre><code>{trace}</code></pre>\n",
                "    <span style=\"color: red; font-weight: bold\">{kind}</span>: <span>{message}</span>\n",
                "</div>"
            ),
            trace = encode_text(&report.trace_block()),
            kind = encode_text(&report.exception_type),
            message = encode_text(&report.exception_message),
        ))
    }

    /// Escaped HTML with class names.
    #[must_use]
    pub fn as_html(&self) -> Option<String> {
        let report = self.report.as_ref()?;
        Some(format!(
            concat!(
                "<div class=\"error\">\n",
                "    <h4 class=\"header\">Traceback (most recent call last):</h4>\n",
                "    <pre class=\"traceback\"><code>{trace}</code></pre>\n",
                "    <div class=\"exception\">\n",
                "        <span class=\"exception-type\">{kind}</span>: <span class=\"exception-value\">{message}</span>\n",
                "    </div>\n",
                "</div>"
            ),
            trace = encode_text(&report.trace_block()),
            kind = encode_text(&report.exception_type),
            message = encode_text(&report.exception_message),
        ))
    }
}

impl fmt::Display for ErrorRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
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
    use std::io;

    fn report() -> ErrorReport {
        ErrorReport::new("ValueError", "Bad <value>")
            .with_traceback(vec!["  at step one".to_string(), "  at step two".to_string()])
    }

    #[test]
    fn test_without_error_renders_empty() {
        let renderer = ErrorRenderer::new("text", None).unwrap();
        assert!(!renderer.has_error());
        assert_eq!(renderer.to_string(), "");
        assert!(renderer.as_html().is_none());
        assert!(renderer.exception_type().is_none());
    }

    #[test]
    fn test_invalid_tag() {
        let err = ErrorRenderer::new("markdown", None).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_text_rendering() {
        let renderer = ErrorRenderer::new("text", Some(report())).unwrap();
        assert_eq!(
            renderer.render(),
            "Traceback (most recent call last):\n  at step one\n  at step two\nValueError: Bad <value>"
        );
    }

    #[test]
    fn test_html_rendering_is_escaped() {
        let inline = ErrorRenderer::new("html-inline", Some(report())).unwrap();
        let html = inline.render();
        assert!(html.contains("Bad &lt;value&gt;"));
        assert!(html.contains("color: red"));

        let classed = ErrorRenderer::new("html", Some(report())).unwrap();
        let html = classed.render();
        assert!(html.contains("class=\"exception-type\">ValueError</span>"));
        assert!(html.contains("Bad &lt;value&gt;"));
    }

    #[test]
    fn test_from_error_captures_chain() {
        #[derive(Debug, thiserror::Error)]
        #[error("outer failure")]
        struct Outer(#[source] io::Error);

        let err = Outer(io::Error::new(io::ErrorKind::NotFound, "missing file"));
        let report = ErrorReport::from_error(&err);
        assert_eq!(report.exception_type, "Outer");
        assert_eq!(report.exception_message, "outer failure");
        assert_eq!(report.traceback, vec!["  caused by: missing file".to_string()]);
    }
}
