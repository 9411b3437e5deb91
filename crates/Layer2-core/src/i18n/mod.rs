//! # Localization
//!
//! - `store.rs` - TranslationStore (locale/namespace 번들, fallback, 치환)
//! - `manager.rs` - LocalizationManager (플러그인 번들 로드 + 코어 오버라이드)
//!
//! 코어 오버라이드는 dotted key 로 작성되며 (`"form.submit"`), 다른
//! 네임스페이스를 겨냥할 때는 `"common:form.submit"` 처럼 접두사를 붙입니다.

mod manager;
mod store;

pub use manager::LocalizationManager;
pub use store::TranslationStore;

use erp_foundation::util::{set_path, split_namespace};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// locale → namespace → 중첩 오버라이드 객체
pub type LocaleOverrides = BTreeMap<String, BTreeMap<String, Value>>;

/// 배포 설정의 dotted-key 오버라이드를 중첩 구조로 확장
///
/// 접두사 없는 키는 플러그인 자신의 네임스페이스(= 플러그인 ID)로 갑니다.
pub fn expand_overrides(
    plugin_id: &str,
    raw: &BTreeMap<String, BTreeMap<String, Value>>,
) -> LocaleOverrides {
    let mut expanded = LocaleOverrides::new();

    for (locale, keys) in raw {
        let namespaces = expanded.entry(locale.clone()).or_default();
        for (key, text) in keys {
            let (namespace, path) = match split_namespace(key) {
                (Some(ns), rest) => (ns, rest),
                (None, rest) => (plugin_id, rest),
            };
            let target = namespaces
                .entry(namespace.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            set_path(target, path, text.clone());
        }
    }

    expanded
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dotted_equals_nested() {
        let mut raw = BTreeMap::new();
        raw.insert(
            "en".to_string(),
            BTreeMap::from([
                ("form.submit".to_string(), json!("Send")),
                ("form.errors.required".to_string(), json!("Required")),
                ("title".to_string(), json!("Time Off")),
            ]),
        );

        let expanded = expand_overrides("leave", &raw);

        let hand_built = json!({
            "form": { "submit": "Send", "errors": { "required": "Required" } },
            "title": "Time Off"
        });
        assert_eq!(expanded["en"]["leave"], hand_built);
    }

    #[test]
    fn test_namespaced_keys() {
        let raw = BTreeMap::from([(
            "ko".to_string(),
            BTreeMap::from([
                ("common:actions.save".to_string(), json!("저장")),
                ("title".to_string(), json!("휴가")),
            ]),
        )]);

        let expanded = expand_overrides("leave", &raw);
        assert_eq!(expanded["ko"]["common"], json!({ "actions": { "save": "저장" } }));
        assert_eq!(expanded["ko"]["leave"], json!({ "title": "휴가" }));
    }
}
