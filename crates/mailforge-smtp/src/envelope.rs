//! SMTP envelope extraction from message headers.

use crate::error::{Error, Result};
use lettre::Address;
use lettre::address::Envelope;
use mailforge_mime::Message;

/// Headers whose addresses become envelope recipients.
const RECIPIENT_HEADERS: [&str; 3] = ["To", "Cc", "Bcc"];

/// Extracts the bare address from `addr@example.com` or `Name <addr@example.com>`.
///
/// # Errors
///
/// Returns an error if the address is invalid.
pub fn parse_address(value: &str) -> Result<Address> {
    let value = value.trim();
    let bare = match (value.rfind('<'), value.rfind('>')) {
        (Some(start), Some(end)) if start < end => &value[start + 1..end],
        _ => value,
    };

    validate(bare)?;
    bare.parse()
        .map_err(|e| Error::InvalidAddress(format!("{bare}: {e}")))
}

/// Basic shape check before handing the address to the transport.
fn validate(addr: &str) -> Result<()> {
    if addr.is_empty() {
        return Err(Error::InvalidAddress("Address cannot be empty".into()));
    }

    let Some((local, domain)) = addr.split_once('@') else {
        return Err(Error::InvalidAddress(format!("{addr}: address must contain @")));
    };

    if domain.contains('@') {
        return Err(Error::InvalidAddress(format!(
            "{addr}: address must have exactly one @"
        )));
    }

    if local.is_empty() || domain.is_empty() {
        return Err(Error::InvalidAddress(format!(
            "{addr}: local and domain parts cannot be empty"
        )));
    }

    Ok(())
}

/// Builds the envelope of a message: sender from `From`, recipients from `To`, `Cc` and `Bcc`.
///
/// # Errors
///
/// Returns an error if an address is invalid or there are no recipients.
pub fn envelope_for(message: &Message) -> Result<Envelope> {
    let from = message.from().map(parse_address).transpose()?;

    let recipients = RECIPIENT_HEADERS
        .iter()
        .flat_map(|name| message.addresses(name))
        .map(|addr| parse_address(&addr))
        .collect::<Result<Vec<_>>>()?;

    Envelope::new(from, recipients).map_err(Into::into)
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
    use mailforge_mime::{Headers, Part};
    use proptest::prelude::*;

    #[test]
    fn test_parse_bare_address() {
        let addr = parse_address("user@example.com").unwrap();
        assert_eq!(addr.to_string(), "user@example.com");
    }

    #[test]
    fn test_parse_named_address() {
        let addr = parse_address("John Doe <john@example.com>").unwrap();
        assert_eq!(addr.to_string(), "john@example.com");
    }

    #[test]
    fn test_invalid_addresses() {
        assert!(parse_address("").is_err());
        assert!(parse_address("userexample.com").is_err());
        assert!(parse_address("@example.com").is_err());
        assert!(parse_address("user@").is_err());
        assert!(parse_address("a@b@c").is_err());
    }

    #[test]
    fn test_envelope_includes_bcc() {
        let headers: Headers = [
            ("From", "me@example.com"),
            ("To", "a@example.com, b@example.com"),
            ("Cc", "c@example.com"),
            ("Bcc", "hidden@example.com"),
        ]
        .into_iter()
        .collect();
        let message = Message::new(headers, Part::text("plain", "Hi"));

        let envelope = envelope_for(&message).unwrap();
        let to: Vec<String> = envelope.to().iter().map(ToString::to_string).collect();
        assert_eq!(
            to,
            vec![
                "a@example.com",
                "b@example.com",
                "c@example.com",
                "hidden@example.com"
            ]
        );
        assert_eq!(envelope.from().unwrap().to_string(), "me@example.com");
    }

    #[test]
    fn test_envelope_without_recipients_fails() {
        let headers: Headers = [("From", "me@example.com")].into_iter().collect();
        let message = Message::new(headers, Part::text("plain", "Hi"));
        assert!(matches!(envelope_for(&message), Err(Error::Envelope(_))));
    }

    proptest! {
        #[test]
        fn prop_parse_address_never_panics(value in ".*") {
            let _ = parse_address(&value);
        }
    }
}
