//! MIME message structure and serialization.

use crate::content_type::ContentType;
use crate::encoding::{TransferEncoding, decode_rfc2231, encode_rfc2231};
use crate::error::{Error, Result};
use crate::header::{Headers, split_addresses};
use crate::id::make_boundary;
use std::fmt;

/// MIME part: a leaf with content or a multipart container of child parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Part headers (content headers only).
    pub headers: Headers,
    /// Decoded content of a leaf part; empty for containers.
    pub body: Vec<u8>,
    /// Child parts of a multipart container.
    pub parts: Vec<Part>,
}

impl Part {
    /// Creates a new leaf part.
    #[must_use]
    pub const fn new(headers: Headers, body: Vec<u8>) -> Self {
        Self {
            headers,
            body,
            parts: Vec::new(),
        }
    }

    /// Creates a `text/<sub_type>` part encoded in UTF-8.
    ///
    /// The content always ends with a newline.
    #[must_use]
    pub fn text(sub_type: &str, content: &str) -> Self {
        let mut content = content.to_string();
        if !content.ends_with('\n') {
            content.push('\n');
        }

        let content_type = ContentType::new("text", sub_type).with_parameter("charset", "utf-8");
        let mut headers = Headers::new();
        headers.add("Content-Type", content_type.to_string());
        headers.add(
            "Content-Transfer-Encoding",
            TransferEncoding::for_text(&content).to_string(),
        );
        Self::new(headers, content.into_bytes())
    }

    /// Creates a base64 encoded `application/octet-stream` attachment.
    ///
    /// Non-ASCII filenames are written as an RFC 2231 `filename*` parameter.
    #[must_use]
    pub fn attachment(filename: &str, content: Vec<u8>) -> Self {
        let disposition = if filename.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) {
            format!("attachment; filename=\"{}\"", filename.replace('"', "\\\""))
        } else {
            format!("attachment; filename*={}", encode_rfc2231(filename))
        };
        let mut headers = Headers::new();
        headers.add("Content-Type", ContentType::octet_stream().to_string());
        headers.add("Content-Transfer-Encoding", TransferEncoding::Base64.to_string());
        headers.add("Content-Disposition", disposition);
        Self::new(headers, content)
    }

    /// Creates a base64 encoded inline part addressable by its Content-ID.
    ///
    /// `content_id` is given without angle brackets.
    #[must_use]
    pub fn inline(content_type: &ContentType, content: Vec<u8>, content_id: &str) -> Self {
        let mut headers = Headers::new();
        headers.add("Content-Type", content_type.to_string());
        headers.add("Content-Transfer-Encoding", TransferEncoding::Base64.to_string());
        headers.add("Content-ID", format!("<{content_id}>"));
        headers.add("Content-Disposition", "inline");
        Self::new(headers, content)
    }

    /// Creates a `multipart/<sub_type>` container with a fresh boundary.
    #[must_use]
    pub fn multipart(sub_type: &str, parts: Vec<Self>) -> Self {
        let mut headers = Headers::new();
        headers.add(
            "Content-Type",
            ContentType::multipart(sub_type, make_boundary()).to_string(),
        );
        Self {
            headers,
            body: Vec::new(),
            parts,
        }
    }

    /// Gets the content type.
    ///
    /// # Errors
    ///
    /// Returns an error if content type header is invalid.
    pub fn content_type(&self) -> Result<ContentType> {
        self.headers
            .get("content-type")
            .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)
    }

    /// Returns `main/sub` of the content type, or `text/plain` when unreadable.
    #[must_use]
    pub fn mime_type(&self) -> String {
        self.content_type()
            .map_or_else(|_| "text/plain".to_string(), |ct| ct.mime_type())
    }

    /// Gets the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
    }

    /// Checks if this part is a multipart container.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.content_type().is_ok_and(|ct| ct.is_multipart())
    }

    /// Returns the attachment filename from `Content-Disposition`, if any.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        let disposition = self.headers.get("content-disposition")?;
        disposition.split(';').find_map(|param| {
            let (key, value) = param.trim().split_once('=')?;
            let key = key.trim();
            if key.eq_ignore_ascii_case("filename*") {
                decode_rfc2231(value.trim()).ok()
            } else if key.eq_ignore_ascii_case("filename") {
                Some(value.trim().trim_matches('"').replace("\\\"", "\""))
            } else {
                None
            }
        })
    }

    /// Returns the Content-ID without angle brackets, if any.
    #[must_use]
    pub fn content_id(&self) -> Option<&str> {
        self.headers
            .get("content-id")
            .map(|id| id.trim_start_matches('<').trim_end_matches('>'))
    }

    /// Gets the content as text.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not valid UTF-8.
    pub fn body_text(&self) -> Result<String> {
        String::from_utf8(self.body.clone()).map_err(Into::into)
    }

    /// Finds the first part (depth first, self included) with the given `main/sub` type.
    #[must_use]
    pub fn find(&self, mime_type: &str) -> Option<&Self> {
        if self.mime_type().eq_ignore_ascii_case(mime_type) {
            return Some(self);
        }
        self.parts.iter().find_map(|part| part.find(mime_type))
    }

    /// Writes headers, blank line and body.
    ///
    /// # Errors
    ///
    /// Returns an error if a multipart container has no boundary.
    pub fn write_to(&self, out: &mut String) -> Result<()> {
        out.push_str(&self.headers.to_string());
        out.push_str("\r\n");
        self.write_body(out)
    }

    fn write_body(&self, out: &mut String) -> Result<()> {
        let content_type = self.content_type()?;
        if !content_type.is_multipart() {
            let encoded = self.transfer_encoding().encode(&self.body);
            out.push_str(&encoded);
            if !encoded.ends_with("\r\n") {
                out.push_str("\r\n");
            }
            return Ok(());
        }

        let boundary = content_type.boundary().ok_or(Error::MissingBoundary)?;
        for part in &self.parts {
            out.push_str("--");
            out.push_str(boundary);
            out.push_str("\r\n");
            part.write_to(out)?;
            out.push_str("\r\n");
        }
        out.push_str("--");
        out.push_str(boundary);
        out.push_str("--\r\n");
        Ok(())
    }
}

/// Assembled email message: envelope-level headers over a root part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message headers (From, To, Subject, ...).
    pub headers: Headers,
    /// Root part carrying the content headers and body.
    pub root: Part,
}

impl Message {
    /// Creates a message from its headers and root part.
    #[must_use]
    pub const fn new(headers: Headers, root: Part) -> Self {
        Self { headers, root }
    }

    /// Gets the content type of the root part.
    ///
    /// # Errors
    ///
    /// Returns an error if content type header is invalid.
    pub fn content_type(&self) -> Result<ContentType> {
        self.root.content_type()
    }

    /// Checks if this is a multipart message.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.root.is_multipart()
    }

    /// Gets the From header.
    #[must_use]
    pub fn from(&self) -> Option<&str> {
        self.headers.get("from")
    }

    /// Gets the To header.
    #[must_use]
    pub fn to(&self) -> Option<&str> {
        self.headers.get("to")
    }

    /// Gets the Subject header.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.headers.get("subject")
    }

    /// Gets the Date header.
    #[must_use]
    pub fn date(&self) -> Option<&str> {
        self.headers.get("date")
    }

    /// Gets the Message-ID header.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.headers.get("message-id")
    }

    /// Splits a comma-joined address header (To, Cc, Bcc) into addresses.
    #[must_use]
    pub fn addresses(&self, name: &str) -> Vec<String> {
        self.headers
            .get_all(name)
            .into_iter()
            .flat_map(split_addresses)
            .map(ToString::to_string)
            .collect()
    }

    /// Finds the first text/plain part.
    #[must_use]
    pub fn text_part(&self) -> Option<&Part> {
        self.root.find("text/plain")
    }

    /// Finds the first text/html part.
    #[must_use]
    pub fn html_part(&self) -> Option<&Part> {
        self.root.find("text/html")
    }

    /// Serializes the message with CRLF line endings, skipping the named headers.
    ///
    /// # Errors
    ///
    /// Returns an error if the part tree cannot be serialized.
    pub fn format_without(&self, skipped: &[&str]) -> Result<String> {
        let mut out = String::new();
        for (name, value) in self.headers.iter() {
            if skipped.iter().any(|skip| skip.eq_ignore_ascii_case(name)) {
                continue;
            }
            let mut line = Headers::new();
            line.add(name, value);
            out.push_str(&line.to_string());
        }
        if !self.headers.contains("mime-version") {
            out.push_str("MIME-Version: 1.0\r\n");
        }
        self.root.write_to(&mut out)?;
        Ok(out)
    }

    /// Serializes the complete message with CRLF line endings.
    ///
    /// # Errors
    ///
    /// Returns an error if the part tree cannot be serialized.
    pub fn format(&self) -> Result<String> {
        self.format_without(&[])
    }

    /// Serializes the complete message to bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the part tree cannot be serialized.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.format().map(String::into_bytes)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formatted = self.format().map_err(|_| fmt::Error)?;
        f.write_str(&formatted)
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

    fn headers() -> Headers {
        [
            ("From", "sender@example.com"),
            ("Subject", "Test"),
            ("To", "a@example.com, b@example.com"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_text_part_appends_newline() {
        let part = Part::text("plain", "Hello, World!");
        assert_eq!(part.body_text().unwrap(), "Hello, World!\n");
        assert_eq!(part.mime_type(), "text/plain");
        assert_eq!(part.transfer_encoding(), TransferEncoding::SevenBit);
    }

    #[test]
    fn test_text_part_non_ascii_is_quoted_printable() {
        let part = Part::text("html", "<p>Héllo</p>");
        assert_eq!(part.transfer_encoding(), TransferEncoding::QuotedPrintable);
    }

    #[test]
    fn test_attachment_part() {
        let part = Part::attachment("data.txt", b"Some content".to_vec());
        assert_eq!(part.mime_type(), "application/octet-stream");
        assert_eq!(part.filename().as_deref(), Some("data.txt"));
        assert_eq!(part.body, b"Some content");
    }

    #[test]
    fn test_attachment_non_ascii_filename() {
        let part = Part::attachment("résumé.txt", b"cv".to_vec());
        assert_eq!(
            part.headers.get("Content-Disposition"),
            Some("attachment; filename*=utf-8''r%C3%A9sum%C3%A9.txt")
        );
        assert_eq!(part.filename().as_deref(), Some("résumé.txt"));

        let mut wire = String::new();
        part.write_to(&mut wire).unwrap();
        assert!(wire.contains("Content-Disposition: attachment; filename*=utf-8''r%C3%A9sum%C3%A9.txt\r\n"));
    }

    #[test]
    fn test_addresses_keep_quoted_commas() {
        let headers: Headers = [("To", "\"Doe, Jane\" <jane@example.com>, ops@example.com")]
            .into_iter()
            .collect();
        let message = Message::new(headers, Part::text("plain", "Hi"));
        assert_eq!(
            message.addresses("to"),
            vec!["\"Doe, Jane\" <jane@example.com>".to_string(), "ops@example.com".to_string()]
        );
    }

    #[test]
    fn test_non_ascii_sender_keeps_address() {
        let headers: Headers = [("From", "Jörg Müller <jorg@example.com>"), ("To", "a@example.com")]
            .into_iter()
            .collect();
        let formatted = Message::new(headers, Part::text("plain", "Hi")).format().unwrap();
        assert!(formatted.starts_with("From: =?utf-8?B?SsO2cmcgTcO8bGxlcg==?= <jorg@example.com>\r\n"));
    }

    #[test]
    fn test_no_line_exceeds_limit() {
        let receivers: Vec<String> = (0..60).map(|n| format!("receiver{n}@example.com")).collect();
        let headers: Headers = [
            ("From", "sender@example.com".to_string()),
            ("To", receivers.join(", ")),
            ("Subject", "Hyvää huomenta, tässä on viikoittainen raportti sinulle!".to_string()),
        ]
        .into_iter()
        .collect();
        let message = Message::new(headers, Part::text("plain", "Hi"));

        let formatted = message.format().unwrap();
        assert!(formatted.split("\r\n").all(|line| line.len() <= 998));
        assert_eq!(message.addresses("to"), receivers);
    }

    #[test]
    fn test_inline_part() {
        let ct = ContentType::new("image", "png");
        let part = Part::inline(&ct, vec![1, 2, 3], "abc@example.com");
        assert_eq!(part.content_id(), Some("abc@example.com"));
        assert_eq!(part.headers.get("Content-ID"), Some("<abc@example.com>"));
        assert_eq!(part.headers.get("Content-Disposition"), Some("inline"));
    }

    #[test]
    fn test_single_part_serialization() {
        let message = Message::new(headers(), Part::text("plain", "Hello"));
        let formatted = message.format().unwrap();

        assert_eq!(
            formatted,
            concat!(
                "From: sender@example.com\r\n",
                "Subject: Test\r\n",
                "To: a@example.com, b@example.com\r\n",
                "MIME-Version: 1.0\r\n",
                "Content-Type: text/plain; charset=utf-8\r\n",
                "Content-Transfer-Encoding: 7bit\r\n",
                "\r\n",
                "Hello\r\n",
            )
        );
    }

    #[test]
    fn test_multipart_serialization() {
        let root = Part::multipart(
            "mixed",
            vec![
                Part::multipart("alternative", vec![Part::text("plain", "Hi")]),
                Part::attachment("data.txt", b"Some content".to_vec()),
            ],
        );
        let boundary = root.content_type().unwrap().boundary().unwrap().to_string();
        let message = Message::new(headers(), root);
        let formatted = message.format().unwrap();

        assert!(formatted.contains("Content-Type: multipart/mixed; boundary="));
        assert!(formatted.contains(&format!("--{boundary}\r\n")));
        assert!(formatted.ends_with(&format!("--{boundary}--\r\n")));
        assert!(formatted.contains("U29tZSBjb250ZW50\r\n"));
        assert!(formatted.contains("filename=\"data.txt\""));
        assert!(!formatted.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn test_format_without_skips_headers() {
        let mut headers = headers();
        headers.add("Bcc", "hidden@example.com");
        let message = Message::new(headers, Part::text("plain", "Hi"));

        let formatted = message.format_without(&["bcc"]).unwrap();
        assert!(!formatted.contains("hidden@example.com"));
        assert!(message.format().unwrap().contains("Bcc: hidden@example.com"));
    }

    #[test]
    fn test_message_accessors() {
        let root = Part::multipart(
            "alternative",
            vec![Part::text("plain", "Text"), Part::text("html", "<b>Html</b>")],
        );
        let message = Message::new(headers(), root);

        assert!(message.is_multipart());
        assert_eq!(message.from(), Some("sender@example.com"));
        assert_eq!(message.subject(), Some("Test"));
        assert_eq!(
            message.addresses("to"),
            vec!["a@example.com".to_string(), "b@example.com".to_string()]
        );
        assert_eq!(message.text_part().unwrap().body_text().unwrap(), "Text\n");
        assert_eq!(
            message.html_part().unwrap().body_text().unwrap(),
            "<b>Html</b>\n"
        );
    }
}
