//! Identifier helpers

use regex::Regex;
use std::sync::OnceLock;

fn plugin_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9._-]*$").expect("static regex"))
}

/// 플러그인 ID 형식 검사 (소문자, 숫자, `.`, `_`, `-`)
pub fn is_valid_plugin_id(id: &str) -> bool {
    plugin_id_pattern().is_match(id)
}

/// `"ns:dotted.key"` 형태의 키를 (네임스페이스, 키) 로 분리
pub fn split_namespace(key: &str) -> (Option<&str>, &str) {
    match key.split_once(':') {
        Some((ns, rest)) if !ns.is_empty() && !rest.is_empty() => (Some(ns), rest),
        _ => (None, key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_id_format() {
        assert!(is_valid_plugin_id("leave"));
        assert!(is_valid_plugin_id("hr.leave-mgmt_2"));
        assert!(!is_valid_plugin_id(""));
        assert!(!is_valid_plugin_id("Leave"));
        assert!(!is_valid_plugin_id("-leave"));
        assert!(!is_valid_plugin_id("leave mgmt"));
    }

    #[test]
    fn test_split_namespace() {
        assert_eq!(split_namespace("common:buttons.save"), (Some("common"), "buttons.save"));
        assert_eq!(split_namespace("buttons.save"), (None, "buttons.save"));
        assert_eq!(split_namespace(":x"), (None, ":x"));
    }
}
