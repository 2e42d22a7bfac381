//! Email recipients of the nightly report.

use std::{collections::BTreeMap, sync::LazyLock};

use regex::Regex;
use tracing::debug;

static ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<[\w\-\.]+@(\w[\w\-]+\.)+\w+>$").expect("Valid regex")
});

/// Recipient display name to `<address>`.
pub type Recipients = BTreeMap<String, String>;

/// Whether `address` has the `<user@domain.tld>` shape.
pub fn is_valid_address(address: &str) -> bool {
    ADDRESS.is_match(address)
}

/// Drop every recipient whose address does not have the expected shape.
pub fn validate_recipients(recipients: Recipients) -> Recipients {
    recipients
        .into_iter()
        .filter(|(name, address)| {
            let valid = is_valid_address(address);
            if !valid {
                debug!("Dropping recipient {name} with malformed address {address}");
            }
            valid
        })
        .collect()
}

/// Parse `Name Surname <address>,Other <address>` as given on the command
/// line. The last word of each item is the address.
pub fn parse_recipients(raw: &str) -> Recipients {
    let parsed = raw
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let (name, address) = match item.rsplit_once(char::is_whitespace) {
                Some((name, address)) => (name.trim(), address),
                None => ("", item),
            };
            (name.to_string(), address.to_string())
        })
        .collect();
    validate_recipients(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_shape() {
        assert!(is_valid_address("<jane.doe@example.com>"));
        assert!(is_valid_address("<build-bot@lab.example.org>"));
        assert!(!is_valid_address("jane.doe@example.com"));
        assert!(!is_valid_address("<jane.doe@localhost>"));
        assert!(!is_valid_address("<jane doe@example.com>"));
    }

    #[test]
    fn test_malformed_recipients_are_dropped() {
        let recipients = Recipients::from([
            ("Jane Doe".to_string(), "<jane@example.com>".to_string()),
            ("Broken".to_string(), "broken@example".to_string()),
        ]);
        let valid = validate_recipients(recipients);
        assert_eq!(valid.len(), 1);
        assert!(valid.contains_key("Jane Doe"));
    }

    #[test]
    fn test_parse_recipients() {
        let parsed = parse_recipients("Jane Doe <jane@example.com>, John <john@example.com>,bad");
        assert_eq!(
            parsed.get("Jane Doe").map(String::as_str),
            Some("<jane@example.com>")
        );
        assert_eq!(
            parsed.get("John").map(String::as_str),
            Some("<john@example.com>")
        );
        assert_eq!(parsed.len(), 2);
    }
}
