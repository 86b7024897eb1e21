//! MIME header handling.

use crate::encoding::encode_rfc2047;
use std::fmt;

/// Ordered collection of email headers.
///
/// Names keep the case they were inserted with; lookups ignore case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header value, keeping any existing values.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Sets a header value, replacing any existing values.
    ///
    /// A replaced header keeps the position of its first occurrence.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();

        match self.position(&name) {
            Some(index) => {
                self.entries[index] = (name.clone(), value);
                let mut seen = false;
                self.entries.retain(|(existing, _)| {
                    if existing.eq_ignore_ascii_case(&name) {
                        let keep = !seen;
                        seen = true;
                        keep
                    } else {
                        true
                    }
                });
            }
            None => self.entries.push((name, value)),
        }
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Gets all values for a header.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
            .collect()
    }

    /// Checks whether a header is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Removes all values for a header.
    pub fn remove(&mut self, name: &str) {
        self.entries
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
    }

    /// Returns the number of header lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns an iterator over all headers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(name))
    }
}

/// Headers holding address lists; only their display names get encoded.
const ADDRESS_HEADERS: [&str; 6] = ["from", "to", "cc", "bcc", "reply-to", "sender"];

/// Preferred length of a folded header line (RFC 5322 section 2.1.1).
const FOLD_WIDTH: usize = 78;

impl fmt::Display for Headers {
    /// Writes one `Name: value` field per header, CRLF terminated and folded
    /// at spaces so lines stay within 78 characters where possible.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.entries {
            let value = encode_value(name, value);
            f.write_str(&fold(&format!("{name}: {value}")))?;
            f.write_str("\r\n")?;
        }
        Ok(())
    }
}

fn encode_value(name: &str, value: &str) -> String {
    if ADDRESS_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name)) {
        return split_addresses(value)
            .into_iter()
            .map(encode_address)
            .collect::<Vec<_>>()
            .join(", ");
    }
    if name.get(..8).is_some_and(|prefix| prefix.eq_ignore_ascii_case("content-")) {
        // Structured; non-ASCII parameters are already RFC 2231 encoded.
        return value.to_string();
    }
    encode_rfc2047(value)
}

/// Encodes the display name of `Name <addr>`; the address stays ASCII.
fn encode_address(item: &str) -> String {
    match (item.rfind('<'), item.ends_with('>')) {
        (Some(start), true) => {
            let name = item[..start].trim();
            let addr = &item[start..];
            if name.is_empty() {
                return addr.to_string();
            }
            if name.is_ascii() {
                return format!("{name} {addr}");
            }
            let unquoted = name
                .strip_prefix('"')
                .and_then(|n| n.strip_suffix('"'))
                .unwrap_or(name);
            format!("{} {addr}", encode_rfc2047(unquoted))
        }
        _ => item.to_string(),
    }
}

/// Splits an address list at commas outside quotes and angle brackets.
pub(crate) fn split_addresses(value: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut angle = false;
    let mut escaped = false;
    for (i, ch) in value.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            '<' if !quoted => angle = true,
            '>' if !quoted => angle = false,
            ',' if !quoted && !angle => {
                items.push(value[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(value[start..].trim());
    items.retain(|item| !item.is_empty());
    items
}

/// Folds a header field by turning spaces into CRLF + space.
fn fold(line: &str) -> String {
    if line.len() <= FOLD_WIDTH {
        return line.to_string();
    }
    let mut folded = String::with_capacity(line.len() + 16);
    let mut width = 0;
    for (i, word) in line.split(' ').enumerate() {
        if i > 0 {
            if width > 0 && !word.is_empty() && width + 1 + word.len() > FOLD_WIDTH {
                folded.push_str("\r\n");
                width = 0;
            }
            folded.push(' ');
            width += 1;
        }
        folded.push_str(word);
        width += word.len();
    }
    folded
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.add(name, value);
        }
        headers
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

    #[test]
    fn test_headers_new() {
        let headers = Headers::new();
        assert!(headers.is_empty());
    }

    #[test]
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain")); // Case insensitive
    }

    #[test]
    fn test_headers_set_replaces_in_place() {
        let mut headers = Headers::new();
        headers.add("From", "me@example.com");
        headers.add("To", "alice@example.com");
        headers.add("to", "bob@example.com");
        headers.add("Subject", "Hi");
        assert_eq!(headers.get_all("To").len(), 2);

        headers.set("TO", "charlie@example.com");
        let names: Vec<&str> = headers.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["From", "TO", "Subject"]);
        assert_eq!(headers.get("to"), Some("charlie@example.com"));
    }

    #[test]
    fn test_headers_remove() {
        let mut headers = Headers::new();
        headers.add("Subject", "Test");
        assert!(headers.contains("subject"));

        headers.remove("SUBJECT");
        assert!(headers.get("Subject").is_none());
    }

    #[test]
    fn test_headers_display_keeps_order_and_case() {
        let headers: Headers = [("From", "sender@example.com"), ("X-custom", "1")]
            .into_iter()
            .collect();

        assert_eq!(
            headers.to_string(),
            "From: sender@example.com\r\nX-custom: 1\r\n"
        );
    }

    #[test]
    fn test_address_display_name_is_encoded_alone() {
        let mut headers = Headers::new();
        headers.add("From", "Jörg Müller <jorg@example.com>");
        headers.add("To", "\"Doe, Jane\" <jane@example.com>, ops@example.com");
        assert_eq!(
            headers.to_string(),
            concat!(
                "From: =?utf-8?B?SsO2cmcgTcO8bGxlcg==?= <jorg@example.com>\r\n",
                "To: \"Doe, Jane\" <jane@example.com>, ops@example.com\r\n",
            )
        );
    }

    #[test]
    fn test_split_addresses_respects_quotes() {
        assert_eq!(
            split_addresses("\"Doe, Jane\" <jane@example.com>, ops@example.com,"),
            vec!["\"Doe, Jane\" <jane@example.com>", "ops@example.com"]
        );
    }

    #[test]
    fn test_content_headers_are_not_encoded() {
        let mut headers = Headers::new();
        headers.add("Content-Disposition", "attachment; filename*=utf-8''r%C3%A9sum%C3%A9.txt");
        assert_eq!(
            headers.to_string(),
            "Content-Disposition: attachment; filename*=utf-8''r%C3%A9sum%C3%A9.txt\r\n"
        );
    }

    #[test]
    fn test_long_headers_are_folded() {
        let receivers: Vec<String> = (0..60).map(|n| format!("receiver{n}@example.com")).collect();
        let mut headers = Headers::new();
        headers.add("To", receivers.join(", "));
        headers.add("Subject", "Hyvää huomenta, tässä on viikoittainen raportti sinulle!");

        let wire = headers.to_string();
        let lines: Vec<&str> = wire.split("\r\n").filter(|line| !line.is_empty()).collect();
        assert!(lines.len() > 2);
        assert!(lines.iter().all(|line| line.len() <= 78));
        assert!(lines[1..].iter().all(|line| line.starts_with(' ') || line.starts_with("Subject:")));

        let unfolded = wire.replace("\r\n ", " ");
        assert!(unfolded.starts_with(&format!("To: {}\r\n", receivers.join(", "))));
    }

    #[test]
    fn test_headers_display_encodes_non_ascii() {
        let mut headers = Headers::new();
        headers.add("Subject", "Héllo");
        assert_eq!(headers.to_string(), "Subject: =?utf-8?B?SMOpbGxv?=\r\n");
    }
}
