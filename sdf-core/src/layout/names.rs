//! Name validity rules
//!
//! Strict mode enforces the restricted identifier grammar
//! `[A-Za-z_][A-Za-z0-9_.$:]*`; relaxed mode accepts any non-empty name
//! without control characters.

use crate::config::NameValidity;

/// Check a name against the given validity rules
pub fn is_valid_name(name: &str, validity: NameValidity) -> bool {
    match validity {
        NameValidity::Strict => {
            let mut chars = name.chars();
            match chars.next() {
                Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
                _ => return false,
            }
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$' | ':'))
        }
        NameValidity::Any => !name.is_empty() && !name.chars().any(char::is_control),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_grammar() {
        for ok in ["x", "_x", "Beam.Current$1", "a:b", "t0"] {
            assert!(is_valid_name(ok, NameValidity::Strict), "{ok}");
        }
        for bad in ["", "1x", "a b", "a-b", "a/b", ".x"] {
            assert!(!is_valid_name(bad, NameValidity::Strict), "{bad}");
        }
    }

    #[test]
    fn test_relaxed() {
        assert!(is_valid_name("a b-c/d", NameValidity::Any));
        assert!(is_valid_name("1x", NameValidity::Any));
        assert!(!is_valid_name("", NameValidity::Any));
        assert!(!is_valid_name("a\tb", NameValidity::Any));
    }
}
