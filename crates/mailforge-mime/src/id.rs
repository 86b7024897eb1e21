//! Generation of Message-IDs, Content-IDs and multipart boundaries.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use uuid::Uuid;

/// Per-process sequence that keeps ids generated in the same microsecond apart.
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Generates a bracketed, globally unique id: `<timestamp.pid.seq.random@domain>`.
///
/// Used for the `Message-ID` header and, without the brackets, for the
/// Content-IDs of inline parts.
#[must_use]
pub fn make_msgid(domain: &str) -> String {
    format!("<{}@{domain}>", make_id_token())
}

/// Generates the part of an id that precedes the `@`.
#[must_use]
pub fn make_id_token() -> String {
    let micros = Utc::now().timestamp_micros();
    let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let random = Uuid::new_v4().simple().to_string();
    format!(
        "{micros}.{pid}.{sequence}.{random}",
        pid = std::process::id(),
        random = &random[..16]
    )
}

/// Generates a multipart boundary that cannot collide with encoded content.
#[must_use]
pub fn make_boundary() -> String {
    format!("==============={}==", Uuid::new_v4().simple())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_msgid_shape() {
        let id = make_msgid("mail.example.com");
        assert!(id.starts_with('<'));
        assert!(id.ends_with("@mail.example.com>"));
        assert_eq!(id.matches('@').count(), 1);
    }

    #[test]
    fn test_boundary_is_unique() {
        assert_ne!(make_boundary(), make_boundary());
    }

    proptest! {
        #[test]
        fn prop_msgids_never_repeat(count in 2usize..200) {
            let ids: HashSet<String> = (0..count).map(|_| make_msgid("example.com")).collect();
            prop_assert_eq!(ids.len(), count);
        }
    }
}
