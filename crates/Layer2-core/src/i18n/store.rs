//! Translation Store - 프로세스 내 i18n 런타임
//!
//! `(locale, namespace)` 별 중첩 번들을 보관합니다. 키를 찾지 못하면
//! fallback locale 을 보고, 그래도 없으면 키 문자열 그대로 반환합니다.

use erp_foundation::util::{deep_merge_into, get_path, split_namespace};
use parking_lot::RwLock;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock};

fn placeholder() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{\s*([\w.-]+)\s*\}\}").expect("static regex"))
}

/// 번역 저장소 (복제 시 같은 저장소 공유)
#[derive(Clone)]
pub struct TranslationStore {
    bundles: Arc<RwLock<BTreeMap<(String, String), Value>>>,
    fallback_locale: String,
}

impl TranslationStore {
    pub fn new(fallback_locale: impl Into<String>) -> Self {
        Self {
            bundles: Arc::new(RwLock::new(BTreeMap::new())),
            fallback_locale: fallback_locale.into(),
        }
    }

    pub fn fallback_locale(&self) -> &str {
        &self.fallback_locale
    }

    /// 번들 추가 (기존 번들이 있으면 딥 머지, 새 값 우선)
    pub fn add_bundle(&self, locale: &str, namespace: &str, bundle: Value) {
        let mut bundles = self.bundles.write();
        let slot = bundles
            .entry((locale.to_string(), namespace.to_string()))
            .or_insert_with(|| Value::Object(Default::default()));
        deep_merge_into(slot, bundle);
    }

    /// 번들 교체
    pub fn set_bundle(&self, locale: &str, namespace: &str, bundle: Value) {
        self.bundles
            .write()
            .insert((locale.to_string(), namespace.to_string()), bundle);
    }

    pub fn bundle(&self, locale: &str, namespace: &str) -> Option<Value> {
        self.bundles
            .read()
            .get(&(locale.to_string(), namespace.to_string()))
            .cloned()
    }

    pub fn has_bundle(&self, locale: &str, namespace: &str) -> bool {
        self.bundles
            .read()
            .contains_key(&(locale.to_string(), namespace.to_string()))
    }

    pub fn remove_bundle(&self, locale: &str, namespace: &str) -> bool {
        self.bundles
            .write()
            .remove(&(locale.to_string(), namespace.to_string()))
            .is_some()
    }

    /// 모든 locale 에서 네임스페이스 제거
    pub fn remove_namespace(&self, namespace: &str) -> usize {
        let mut bundles = self.bundles.write();
        let before = bundles.len();
        bundles.retain(|(_, ns), _| ns != namespace);
        before - bundles.len()
    }

    pub fn locales(&self) -> BTreeSet<String> {
        self.bundles.read().keys().map(|(l, _)| l.clone()).collect()
    }

    pub fn namespaces(&self, locale: &str) -> Vec<String> {
        self.bundles
            .read()
            .keys()
            .filter(|(l, _)| l == locale)
            .map(|(_, ns)| ns.clone())
            .collect()
    }

    /// 번역 (`"ns:key"` 형태면 네임스페이스를 덮어씀)
    pub fn translate(&self, locale: &str, namespace: &str, key: &str) -> String {
        self.translate_with(locale, namespace, key, &Value::Null)
    }

    /// `{{var}}` 치환 포함 번역
    pub fn translate_with(&self, locale: &str, namespace: &str, key: &str, vars: &Value) -> String {
        let (ns, key) = match split_namespace(key) {
            (Some(ns), rest) => (ns, rest),
            (None, rest) => (namespace, rest),
        };

        let found = self
            .lookup(locale, ns, key)
            .or_else(|| {
                (locale != self.fallback_locale)
                    .then(|| self.lookup(&self.fallback_locale, ns, key))
                    .flatten()
            });

        match found {
            Some(text) => interpolate(&text, vars),
            None => key.to_string(),
        }
    }

    fn lookup(&self, locale: &str, namespace: &str, key: &str) -> Option<String> {
        let bundles = self.bundles.read();
        let bundle = bundles.get(&(locale.to_string(), namespace.to_string()))?;
        get_path(bundle, key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

fn interpolate(text: &str, vars: &Value) -> String {
    if !vars.is_object() {
        return text.to_string();
    }
    placeholder()
        .replace_all(text, |caps: &Captures| match get_path(vars, &caps[1]) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => caps[0].to_string(),
            Some(other) => other.to_string(),
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> TranslationStore {
        let store = TranslationStore::new("en");
        store.add_bundle("en", "leave", json!({ "title": "Leave", "greet": "Hi {{name}}, {{ days }} left" }));
        store.add_bundle("ko", "leave", json!({ "title": "휴가" }));
        store
    }

    #[test]
    fn test_translate_and_fallback() {
        let store = store();
        assert_eq!(store.translate("ko", "leave", "title"), "휴가");
        assert_eq!(store.translate("ko", "leave", "greet"), "Hi {{name}}, {{ days }} left");
        assert_eq!(store.translate("fr", "leave", "title"), "Leave");
    }

    #[test]
    fn test_missing_key_returns_key() {
        let store = store();
        assert_eq!(store.translate("en", "leave", "nope.deep"), "nope.deep");
        assert_eq!(store.translate("en", "ghost", "title"), "title");
    }

    #[test]
    fn test_interpolation() {
        let store = store();
        let text = store.translate_with("en", "leave", "greet", &json!({ "name": "Kim", "days": 3 }));
        assert_eq!(text, "Hi Kim, 3 left");
    }

    #[test]
    fn test_namespaced_key() {
        let store = store();
        store.add_bundle("en", "common", json!({ "ok": "OK" }));
        assert_eq!(store.translate("en", "leave", "common:ok"), "OK");
    }

    #[test]
    fn test_add_bundle_merges_and_remove_namespace() {
        let store = store();
        store.add_bundle("en", "leave", json!({ "title": "Time Off", "extra": "x" }));
        assert_eq!(store.translate("en", "leave", "title"), "Time Off");
        assert_eq!(store.translate("en", "leave", "greet"), "Hi {{name}}, {{ days }} left");

        store.set_bundle("en", "leave", json!({ "title": "Leave" }));
        assert_eq!(store.translate("en", "leave", "extra"), "extra");

        assert_eq!(store.remove_namespace("leave"), 2);
        assert!(store.locales().is_empty());
    }
}
