//! MIME encoding and decoding utilities.
//!
//! Supports Base64, Quoted-Printable, RFC 2047 header words and RFC 2231
//! parameter values.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;
use std::fmt::Write as _;

/// Maximum encoded line length (RFC 2045).
const MAX_LINE_LENGTH: usize = 76;

/// Longest line allowed by RFC 5322 before a body needs encoding.
const MAX_RAW_LINE_LENGTH: usize = 998;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            _ => Self::SevenBit,
        }
    }

    /// Picks the encoding for a text body.
    ///
    /// Short-lined ASCII goes out as-is, everything else is quoted-printable.
    #[must_use]
    pub fn for_text(text: &str) -> Self {
        let plain = text.is_ascii()
            && text
                .lines()
                .all(|line| line.len() <= MAX_RAW_LINE_LENGTH && !line.contains('\0'));
        if plain {
            Self::SevenBit
        } else {
            Self::QuotedPrintable
        }
    }

    /// Encodes a body for the wire. Lines are joined with CRLF.
    #[must_use]
    pub fn encode(self, body: &[u8]) -> String {
        match self {
            Self::Base64 => encode_base64_lines(body),
            Self::QuotedPrintable => encode_quoted_printable(&String::from_utf8_lossy(body)),
            Self::SevenBit => normalize_line_endings(&String::from_utf8_lossy(body)),
        }
    }

    /// Decodes a wire body back to raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid for this encoding.
    pub fn decode(self, body: &str) -> Result<Vec<u8>> {
        match self {
            Self::Base64 => {
                let cleaned: String = body.chars().filter(|c| !c.is_whitespace()).collect();
                decode_base64(&cleaned)
            }
            Self::QuotedPrintable => decode_quoted_printable(body).map(String::into_bytes),
            Self::SevenBit => Ok(body.replace("\r\n", "\n").into_bytes()),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
        }
    }
}

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64 wrapped at 76 columns with CRLF breaks.
#[must_use]
pub fn encode_base64_lines(data: &[u8]) -> String {
    let encoded = encode_base64(data);
    let lines: Vec<&str> = encoded
        .as_bytes()
        .chunks(MAX_LINE_LENGTH)
        // Base64 output is pure ASCII, so chunk boundaries are char boundaries
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
        .collect();
    lines.join("\r\n")
}

/// Decodes Base64 data.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    STANDARD.decode(data).map_err(Into::into)
}

/// Converts bare LF (and stray CR) line endings to CRLF.
#[must_use]
pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n").replace('\n', "\r\n")
}

/// Encodes text using Quoted-Printable encoding (RFC 2045).
///
/// Hard line breaks are kept as CRLF; long lines get soft breaks and
/// whitespace at the end of a line is escaped.
#[must_use]
pub fn encode_quoted_printable(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n");
    let mut result = String::with_capacity(normalized.len());

    for (i, line) in normalized.split('\n').enumerate() {
        if i > 0 {
            result.push_str("\r\n");
        }
        encode_quoted_printable_line(line.as_bytes(), &mut result);
    }

    result
}

fn encode_quoted_printable_line(bytes: &[u8], out: &mut String) {
    let mut line_length = 0;

    for (i, &byte) in bytes.iter().enumerate() {
        let at_end = i + 1 == bytes.len();
        let literal = matches!(byte, b'!'..=b'<' | b'>'..=b'~')
            || (matches!(byte, b' ' | b'\t') && !at_end);
        let width = if literal { 1 } else { 3 };

        // Leave one column for the soft break marker
        if line_length + width > MAX_LINE_LENGTH - 1 {
            out.push_str("=\r\n");
            line_length = 0;
        }

        if literal {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "={byte:02X}");
        }
        line_length += width;
    }
}

/// Decodes Quoted-Printable text (RFC 2045).
///
/// # Errors
///
/// Returns an error if the input contains invalid escape sequences.
pub fn decode_quoted_printable(text: &str) -> Result<String> {
    let mut result = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '=' {
            // Soft line break
            if chars.peek() == Some(&'\r') {
                chars.next();
                if chars.peek() == Some(&'\n') {
                    chars.next();
                    continue;
                }
            } else if chars.peek() == Some(&'\n') {
                chars.next();
                continue;
            }

            let hex: String = chars.by_ref().take(2).collect();
            if hex.len() == 2 {
                let byte = u8::from_str_radix(&hex, 16)
                    .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
                result.push(byte);
            } else {
                return Err(Error::InvalidEncoding(
                    "Incomplete escape sequence".to_string(),
                ));
            }
        } else if ch == '\r' && chars.peek() == Some(&'\n') {
            // Hard line break: CRLF on the wire, LF in memory
        } else {
            let mut buf = [0; 4];
            result.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
        }
    }

    String::from_utf8(result).map_err(Into::into)
}

/// Longest encoded-word allowed by RFC 2047.
const MAX_ENCODED_WORD: usize = 75;

/// Encodes a header value using RFC 2047 encoding when it is not plain ASCII.
///
/// Format: `=?utf-8?B?encoded-text?=`. Long values become several
/// encoded-words separated by spaces, each at most 75 characters and each
/// holding whole characters.
#[must_use]
pub fn encode_rfc2047(text: &str) -> String {
    if text.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) {
        return text.to_string();
    }

    // "=?utf-8?B?" + "?=" leaves 63 characters, i.e. 45 bytes of base64 input.
    let max_bytes = (MAX_ENCODED_WORD - 12) / 4 * 3;
    let mut words = Vec::new();
    let mut chunk = String::new();
    for ch in text.chars() {
        if chunk.len() + ch.len_utf8() > max_bytes {
            words.push(format!("=?utf-8?B?{}?=", encode_base64(chunk.as_bytes())));
            chunk.clear();
        }
        chunk.push(ch);
    }
    if !chunk.is_empty() {
        words.push(format!("=?utf-8?B?{}?=", encode_base64(chunk.as_bytes())));
    }
    words.join(" ")
}

/// Encodes a parameter value as RFC 2231 extended value: `utf-8''r%C3%A9sum%C3%A9.txt`.
#[must_use]
pub fn encode_rfc2231(value: &str) -> String {
    let mut encoded = String::from("utf-8''");
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            encoded.push(char::from(byte));
        } else {
            let _ = write!(encoded, "%{byte:02X}");
        }
    }
    encoded
}

/// Decodes an RFC 2231 extended value; the charset is assumed to be UTF-8.
///
/// # Errors
///
/// Returns an error for a malformed percent escape or invalid UTF-8.
pub fn decode_rfc2231(value: &str) -> Result<String> {
    let encoded = value.splitn(3, '\'').nth(2).unwrap_or(value);
    let mut bytes = Vec::with_capacity(encoded.len());
    let mut rest = encoded.as_bytes();
    while let Some((&byte, tail)) = rest.split_first() {
        if byte == b'%' {
            let hex = tail
                .get(..2)
                .and_then(|hex| std::str::from_utf8(hex).ok())
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                .ok_or_else(|| Error::InvalidEncoding(format!("bad percent escape in {value}")))?;
            bytes.push(hex);
            rest = &tail[2..];
        } else {
            bytes.push(byte);
            rest = tail;
        }
    }
    String::from_utf8(bytes).map_err(Into::into)
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

    #[test]
    fn test_base64_encode_decode() {
        let data = b"Hello, World!";
        let encoded = encode_base64(data);
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");

        let decoded = decode_base64(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_base64_lines_wrap_at_76() {
        let data = vec![0u8; 200];
        let encoded = encode_base64_lines(&data);
        let lines: Vec<&str> = encoded.split("\r\n").collect();
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|line| line.len() <= 76));
        assert_eq!(TransferEncoding::Base64.decode(&encoded).unwrap(), data);
    }

    #[test]
    fn test_transfer_encoding_for_text() {
        assert_eq!(
            TransferEncoding::for_text("Hello\nWorld\n"),
            TransferEncoding::SevenBit
        );
        assert_eq!(
            TransferEncoding::for_text("Héllo"),
            TransferEncoding::QuotedPrintable
        );
        let long_line = "a".repeat(1200);
        assert_eq!(
            TransferEncoding::for_text(&long_line),
            TransferEncoding::QuotedPrintable
        );
    }

    #[test]
    fn test_quoted_printable_encode() {
        assert_eq!(encode_quoted_printable("Hello, World!"), "Hello, World!");

        let encoded = encode_quoted_printable("Héllo, Wørld!");
        assert!(encoded.contains("=C3=A9"));
    }

    #[test]
    fn test_quoted_printable_keeps_hard_breaks() {
        let encoded = encode_quoted_printable("first line\nsecond line\n");
        assert_eq!(encoded, "first line\r\nsecond line\r\n");
    }

    #[test]
    fn test_quoted_printable_escapes_trailing_space() {
        let encoded = encode_quoted_printable("ends with space \nnext");
        assert_eq!(encoded, "ends with space=20\r\nnext");
    }

    #[test]
    fn test_quoted_printable_soft_breaks_long_lines() {
        let text = "é".repeat(60);
        let encoded = encode_quoted_printable(&text);
        assert!(encoded.split("\r\n").all(|line| line.len() <= 76));
        assert_eq!(decode_quoted_printable(&encoded).unwrap(), text);
    }

    #[test]
    fn test_quoted_printable_decode() {
        assert_eq!(decode_quoted_printable("H=C3=A9llo").unwrap(), "Héllo");
        assert_eq!(
            decode_quoted_printable("Hello=\r\nWorld").unwrap(),
            "HelloWorld"
        );
        assert!(decode_quoted_printable("broken=4").is_err());
    }

    #[test]
    fn test_rfc2047_encode() {
        assert_eq!(encode_rfc2047("Hello? a=b"), "Hello? a=b");

        let encoded = encode_rfc2047("Héllo");
        assert_eq!(encoded, "=?utf-8?B?SMOpbGxv?=");
    }

    #[test]
    fn test_rfc2047_splits_long_values() {
        let subject = "Hyvää huomenta, tässä on viikoittainen raportti sinulle!";
        let encoded = encode_rfc2047(subject);
        let words: Vec<&str> = encoded.split(' ').collect();
        assert!(words.len() > 1);
        assert!(words.iter().all(|word| word.len() <= 75));

        let decoded: Vec<u8> = words
            .iter()
            .flat_map(|word| {
                let payload = word.trim_start_matches("=?utf-8?B?").trim_end_matches("?=");
                decode_base64(payload).unwrap()
            })
            .collect();
        assert_eq!(String::from_utf8(decoded).unwrap(), subject);
    }

    #[test]
    fn test_rfc2231_round_trip() {
        let encoded = encode_rfc2231("résumé.txt");
        assert_eq!(encoded, "utf-8''r%C3%A9sum%C3%A9.txt");
        assert_eq!(decode_rfc2231(&encoded).unwrap(), "résumé.txt");
        assert!(decode_rfc2231("utf-8''bad%4").is_err());
    }

    #[test]
    fn test_normalize_line_endings() {
        assert_eq!(normalize_line_endings("a\nb\r\nc"), "a\r\nb\r\nc");
    }
}
