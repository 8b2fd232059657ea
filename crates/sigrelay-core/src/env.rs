//! Environment variable helpers
//!
//! Used by `RelayConfig::from_env()` and the stderr logger. A variable set
//! to an empty or all-blank string counts as unset.
//!
//! ```ignore
//! use sigrelay_core::env::{env_get, env_get_bool};
//!
//! let max_drain: usize = env_get("SIGRELAY_MAX_DRAIN", 0);
//! let track = env_get_bool("SIGRELAY_TRACK_DISPOSITIONS", true);
//! ```

use std::str::FromStr;

/// Trimmed value of `key`; `None` when unset, blank or not UTF-8
fn env_value(key: &str) -> Option<String> {
    let raw = std::env::var(key).ok()?;
    let val = raw.trim();
    (!val.is_empty()).then(|| val.to_owned())
}

/// Boolean spelling of `val`, `None` if it is neither truthy nor falsy
fn parse_switch(val: &str) -> Option<bool> {
    match val.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Read `key` parsed as `T`, falling back to `default` when unset or unparsable
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Read `key` as an on/off switch
///
/// Unset, blank and unrecognized values give `default`; the last one is
/// logged so a typo in a deployment does not pass silently.
pub fn env_get_bool(key: &str, default: bool) -> bool {
    let Some(val) = env_value(key) else {
        return default;
    };
    parse_switch(&val).unwrap_or_else(|| {
        log::warn!("{}={:?} is not a boolean, using {}", key, val, default);
        default
    })
}

/// Read `key` parsed as `T`, `None` when unset, blank or unparsable
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    env_value(key)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_get_default() {
        let val: usize = env_get("__SIGRELAY_TEST_UNSET__", 42);
        assert_eq!(val, 42);
    }

    #[test]
    fn test_env_get_parsed() {
        std::env::set_var("__SIGRELAY_TEST_NUM__", " 17 ");
        let val: usize = env_get("__SIGRELAY_TEST_NUM__", 0);
        assert_eq!(val, 17);
        std::env::remove_var("__SIGRELAY_TEST_NUM__");
    }

    #[test]
    fn test_env_get_invalid_parse() {
        std::env::set_var("__SIGRELAY_TEST_BAD__", "many");
        let val: usize = env_get("__SIGRELAY_TEST_BAD__", 5);
        assert_eq!(val, 5);
        std::env::remove_var("__SIGRELAY_TEST_BAD__");
    }

    #[test]
    fn test_env_get_bool_variants() {
        for yes in ["1", "true", "TRUE", "yes", " on "] {
            std::env::set_var("__SIGRELAY_TEST_BOOL__", yes);
            assert!(env_get_bool("__SIGRELAY_TEST_BOOL__", false), "{}", yes);
        }
        for no in ["0", "false", "No", "off"] {
            std::env::set_var("__SIGRELAY_TEST_BOOL__", no);
            assert!(!env_get_bool("__SIGRELAY_TEST_BOOL__", true), "{}", no);
        }
        std::env::remove_var("__SIGRELAY_TEST_BOOL__");
        assert!(env_get_bool("__SIGRELAY_TEST_BOOL__", true));
    }

    #[test]
    fn test_env_get_bool_unrecognized_keeps_default() {
        std::env::set_var("__SIGRELAY_TEST_SWITCH__", "garbage");
        assert!(env_get_bool("__SIGRELAY_TEST_SWITCH__", true));
        assert!(!env_get_bool("__SIGRELAY_TEST_SWITCH__", false));
        std::env::remove_var("__SIGRELAY_TEST_SWITCH__");
    }

    #[test]
    fn test_blank_value_is_unset() {
        std::env::set_var("__SIGRELAY_TEST_BLANK__", "   ");
        assert!(env_get_bool("__SIGRELAY_TEST_BLANK__", true));
        let val: Option<String> = env_get_opt("__SIGRELAY_TEST_BLANK__");
        assert!(val.is_none());
        std::env::remove_var("__SIGRELAY_TEST_BLANK__");
    }

    #[test]
    fn test_env_get_opt_none() {
        let val: Option<u32> = env_get_opt("__SIGRELAY_TEST_UNSET__");
        assert!(val.is_none());
    }
}
