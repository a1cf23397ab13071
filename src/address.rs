//! Address parsing — splits `Display Name <address>` into its parts.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static ANGLE_ADDR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^(.*?)<([^>]*)>").unwrap());

/// A parsed email address with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Address {
    pub fn new(email: impl Into<String>, name: Option<String>) -> Self {
        Self {
            email: email.into(),
            name,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} <{}>", self.email),
            None => f.write_str(&self.email),
        }
    }
}

/// Parse free text into an [`Address`].
///
/// Accepts `Name <addr>`, `<addr>` and bare `addr`. A blank name is
/// normalized to `None`. Returns `None` when there is no address at all.
pub fn parse_address(text: &str) -> Option<Address> {
    let text = text.trim();

    let (email, name) = match ANGLE_ADDR.captures(text) {
        Some(caps) => {
            let name = caps.get(1).map_or("", |m| m.as_str()).trim();
            let email = caps.get(2).map_or("", |m| m.as_str()).trim();
            let name = (!name.is_empty()).then(|| name.to_string());
            (email.to_string(), name)
        }
        None => (text.to_string(), None),
    };

    if email.is_empty() {
        return None;
    }

    Some(Address { email, name })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_and_address() {
        let addr = parse_address("Ryan Schmukler <ryan@slingingcode.com>").unwrap();
        assert_eq!(addr.email, "ryan@slingingcode.com");
        assert_eq!(addr.name.as_deref(), Some("Ryan Schmukler"));
    }

    #[test]
    fn bare_address_has_no_name() {
        let addr = parse_address("bob@x.com").unwrap();
        assert_eq!(addr.email, "bob@x.com");
        assert!(addr.name.is_none());
    }

    #[test]
    fn brackets_without_name_give_empty_name() {
        let addr = parse_address("  <bob@x.com>").unwrap();
        assert_eq!(addr.email, "bob@x.com");
        assert!(addr.name.is_none());
    }

    #[test]
    fn whitespace_inside_brackets_is_trimmed() {
        let addr = parse_address("Bob < bob@x.com >").unwrap();
        assert_eq!(addr.email, "bob@x.com");
        assert_eq!(addr.name.as_deref(), Some("Bob"));
    }

    #[test]
    fn empty_input_is_absent() {
        assert!(parse_address("").is_none());
        assert!(parse_address("   ").is_none());
        assert!(parse_address("Nobody <>").is_none());
    }

    #[test]
    fn display_round_trips_the_display_form() {
        let addr = parse_address("Bob <bob@x.com>").unwrap();
        assert_eq!(addr.to_string(), "Bob <bob@x.com>");
        assert_eq!(Address::new("a@b.c", None).to_string(), "a@b.c");
    }
}
