//! Recipient address checks shared by every channel.

use std::sync::LazyLock;

use regex::Regex;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)+$")
        .expect("email pattern is valid")
});

/// Loose `local@domain.tld` check; the provider has the final say.
pub fn is_valid_email(target: &str) -> bool {
    EMAIL.is_match(target.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_addresses() {
        assert!(is_valid_email("anna@example.com"));
        assert!(is_valid_email("first.last+todo@mail.example.org"));
        assert!(is_valid_email("  padded@example.com "));
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in ["", "anna", "anna@", "@example.com", "anna@localhost", "a b@example.com"] {
            assert!(!is_valid_email(bad), "{bad} should be rejected");
        }
    }
}
