//! Validation of untrusted values read from URLs. Invalid input reads as
//! absent rather than as an error.

use forkline_core::apps::{App, ForkType};
use forkline_crypto::ForkKey;

/// Upper bound for a local session index.
pub const MAX_LOCAL_ID: u32 = 100_000_000;

/// Read the leading integer of `raw`, ignoring anything after it, so `"5abc"`
/// and `"1.5"` are indexes 5 and 1. Negative values and values above
/// [`MAX_LOCAL_ID`] are invalid.
pub fn validated_local_id(raw: &str) -> Option<u32> {
    let trimmed = raw.trim_start();
    let (negative, unsigned) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let digits_end = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unsigned.len());
    let digits = unsigned[..digits_end].trim_start_matches('0');
    if digits_end == 0 {
        return None;
    }
    if digits.is_empty() {
        return Some(0);
    }
    if negative || digits.len() > 9 {
        return None;
    }
    digits.parse::<u32>().ok().filter(|id| *id <= MAX_LOCAL_ID)
}

pub fn validated_app(raw: &str) -> Option<App> {
    raw.parse().ok()
}

pub fn validated_fork_type(raw: &str) -> Option<ForkType> {
    raw.parse().ok()
}

pub fn validated_raw_key(raw: &str) -> Option<ForkKey> {
    ForkKey::from_base64url(raw).ok()
}

/// Truncate on a character boundary.
pub fn truncate_state(raw: &str, max_len: usize) -> String {
    raw.chars().take(max_len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_id_bounds() {
        assert_eq!(validated_local_id("0"), Some(0));
        assert_eq!(validated_local_id("42"), Some(42));
        assert_eq!(validated_local_id("100000000"), Some(MAX_LOCAL_ID));
        assert_eq!(validated_local_id("100000001"), None);
        assert_eq!(validated_local_id("-1"), None);
        assert_eq!(validated_local_id(""), None);
        assert_eq!(validated_local_id("abc"), None);
        assert_eq!(validated_local_id("99999999999999999999"), None);
    }

    #[test]
    fn local_id_reads_leading_integer() {
        assert_eq!(validated_local_id("1.5"), Some(1));
        assert_eq!(validated_local_id("5abc"), Some(5));
        assert_eq!(validated_local_id("+5"), Some(5));
        assert_eq!(validated_local_id("  7"), Some(7));
        assert_eq!(validated_local_id("007"), Some(7));
        assert_eq!(validated_local_id("-0"), Some(0));
        assert_eq!(validated_local_id("+"), None);
        assert_eq!(validated_local_id(".5"), None);
        assert_eq!(validated_local_id("-"), None);
    }

    #[test]
    fn app_and_type() {
        assert_eq!(validated_app("drive"), Some(App::Drive));
        assert_eq!(validated_app("evil"), None);
        assert_eq!(validated_fork_type("switch"), Some(ForkType::Switch));
        assert_eq!(validated_fork_type(""), None);
    }

    #[test]
    fn raw_key_requires_32_bytes() {
        let key = ForkKey::generate();
        assert!(validated_raw_key(&key.to_base64url()).is_some());
        assert!(validated_raw_key("AAAA").is_none());
        assert!(validated_raw_key("").is_none());
    }

    #[test]
    fn truncate_state_limits_length() {
        let long = "a".repeat(250);
        assert_eq!(truncate_state(&long, 100).len(), 100);
        assert_eq!(truncate_state("short", 100), "short");
    }
}
