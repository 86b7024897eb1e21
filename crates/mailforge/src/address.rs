//! Structural facets of an email address for use in templates.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

/// An email address string with derived facets.
///
/// No syntax validation is performed: malformed input yields empty or
/// absent facets instead of an error.
///
/// ```
/// use mailforge::EmailAddress;
///
/// let addr = EmailAddress::new("john.smith@en.example.com");
/// assert_eq!(addr.full_name(), "John Smith");
/// assert_eq!(addr.organization().as_deref(), Some("Example"));
/// assert_eq!(addr.top_level_domain().as_deref(), Some(".com"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress {
    address: String,
}

impl EmailAddress {
    /// Wraps an address string.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    /// Returns the address as given.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.address
    }

    /// Part before the `@` (the whole string when there is none).
    #[must_use]
    pub fn local_part(&self) -> &str {
        self.address
            .split_once('@')
            .map_or(self.address.as_str(), |(local, _)| local)
    }

    /// Part after the `@` (empty when there is none).
    #[must_use]
    pub fn domain(&self) -> &str {
        self.address
            .split_once('@')
            .map_or("", |(_, domain)| domain)
    }

    /// Whether the local part looks like `first.last`.
    #[must_use]
    pub fn is_personal(&self) -> bool {
        self.local_part().split('.').count() == 2
    }

    /// Capitalized first dot-segment of a personal address.
    #[must_use]
    pub fn first_name(&self) -> Option<String> {
        self.name_segment(0)
    }

    /// Capitalized second dot-segment of a personal address.
    #[must_use]
    pub fn last_name(&self) -> Option<String> {
        self.name_segment(1)
    }

    /// `First Last` for personal addresses, else the capitalized local part.
    #[must_use]
    pub fn full_name(&self) -> String {
        match (self.first_name(), self.last_name()) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            _ => capitalize(self.local_part()),
        }
    }

    /// Last domain label with a leading dot, e.g. `.com`.
    #[must_use]
    pub fn top_level_domain(&self) -> Option<String> {
        let labels: Vec<&str> = self.domain().split('.').collect();
        (labels.len() > 1).then(|| format!(".{}", labels[labels.len() - 1]))
    }

    /// Second-to-last domain label, e.g. `example`.
    #[must_use]
    pub fn second_level_domain(&self) -> Option<&str> {
        let labels: Vec<&str> = self.domain().split('.').collect();
        (labels.len() > 1).then(|| labels[labels.len() - 2])
    }

    /// Capitalized second level domain, e.g. `Example`.
    #[must_use]
    pub fn organization(&self) -> Option<String> {
        self.second_level_domain().map(capitalize)
    }

    fn name_segment(&self, index: usize) -> Option<String> {
        if !self.is_personal() {
            return None;
        }
        self.local_part().split('.').nth(index).map(capitalize)
    }
}

/// Uppercases the first character and lowercases the rest.
fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    chars.next().map_or_else(String::new, |first| {
        first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect()
    })
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

impl From<&str> for EmailAddress {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

impl Serialize for EmailAddress {
    /// Serializes every facet so templates can use `sender.full_name` etc.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(10))?;
        map.serialize_entry("address", &self.address)?;
        map.serialize_entry("local_part", self.local_part())?;
        map.serialize_entry("domain", self.domain())?;
        map.serialize_entry("is_personal", &self.is_personal())?;
        map.serialize_entry("first_name", &self.first_name())?;
        map.serialize_entry("last_name", &self.last_name())?;
        map.serialize_entry("full_name", &self.full_name())?;
        map.serialize_entry("top_level_domain", &self.top_level_domain())?;
        map.serialize_entry("second_level_domain", &self.second_level_domain())?;
        map.serialize_entry("organization", &self.organization())?;
        map.end()
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
    use proptest::prelude::*;

    #[test]
    fn test_personal_address() {
        let addr = EmailAddress::new("first.last@example.com");
        assert_eq!(addr.local_part(), "first.last");
        assert_eq!(addr.domain(), "example.com");
        assert!(addr.is_personal());
        assert_eq!(addr.first_name().as_deref(), Some("First"));
        assert_eq!(addr.last_name().as_deref(), Some("Last"));
        assert_eq!(addr.full_name(), "First Last");
        assert_eq!(addr.top_level_domain().as_deref(), Some(".com"));
        assert_eq!(addr.second_level_domain(), Some("example"));
        assert_eq!(addr.organization().as_deref(), Some("Example"));
    }

    #[test]
    fn test_non_personal_address() {
        let addr = EmailAddress::new("no-reply@example.com");
        assert!(!addr.is_personal());
        assert!(addr.first_name().is_none());
        assert!(addr.last_name().is_none());
        assert_eq!(addr.full_name(), "No-reply");
    }

    #[test]
    fn test_nested_domain() {
        let addr = EmailAddress::new("john.smith@en.example.co.uk");
        assert_eq!(addr.top_level_domain().as_deref(), Some(".uk"));
        assert_eq!(addr.second_level_domain(), Some("co"));
    }

    #[test]
    fn test_domain_without_dot() {
        let addr = EmailAddress::new("root@localhost");
        assert!(addr.top_level_domain().is_none());
        assert!(addr.organization().is_none());
    }

    #[test]
    fn test_capitalize_lowers_rest() {
        let addr = EmailAddress::new("JOHN.SMITH@EXAMPLE.COM");
        assert_eq!(addr.full_name(), "John Smith");
    }

    #[test]
    fn test_serialize_exposes_facets() {
        let value = serde_json::to_value(EmailAddress::new("jane.doe@acme.org")).unwrap();
        assert_eq!(value["full_name"], "Jane Doe");
        assert_eq!(value["organization"], "Acme");
        assert_eq!(value["address"], "jane.doe@acme.org");
    }

    proptest! {
        #[test]
        fn prop_facets_never_panic(address in ".*") {
            let addr = EmailAddress::new(address);
            let _ = addr.full_name();
            let _ = addr.top_level_domain();
            let _ = addr.organization();
            let _ = serde_json::to_value(&addr);
        }
    }
}
