//! Localization Manager - 플러그인 번역 번들 로드 및 등록
//!
//! 번들 로드 실패나 시간 초과는 빈 번들로 대체하고 경고만 남깁니다.
//!
//! 여러 플러그인이 같은 `(locale, namespace)` 에 기여할 수 있으므로
//! 플러그인별 기여분을 따로 보관하고, 저장소의 번들은 남은 기여분을
//! 등록 순서대로 병합해 다시 만듭니다.

use super::store::TranslationStore;
use super::LocaleOverrides;
use crate::plugin::{ModuleResolver, PluginManifest};
use erp_foundation::util::deep_merge_into;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

type BundleKey = (String, String);

/// 번역 관리자
pub struct LocalizationManager {
    resolver: Arc<dyn ModuleResolver>,
    store: TranslationStore,
    timeout: Duration,
    /// (locale, namespace) → 기여한 플러그인과 그 번들 (등록 순)
    contributions: RwLock<BTreeMap<BundleKey, Vec<(String, Value)>>>,
}

impl LocalizationManager {
    pub fn new(resolver: Arc<dyn ModuleResolver>, store: TranslationStore) -> Self {
        Self {
            resolver,
            store,
            timeout: DEFAULT_TIMEOUT,
            contributions: RwLock::new(BTreeMap::new()),
        }
    }

    /// 번들 하나당 로드 제한 시간
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &TranslationStore {
        &self.store
    }

    /// 플러그인 번역 로드
    ///
    /// 반환값은 로드하지 못한 번들에 대한 경고 목록입니다.
    pub async fn load_plugin_translations(
        &self,
        manifest: &PluginManifest,
        overrides: &LocaleOverrides,
    ) -> Vec<String> {
        let plugin_id = manifest.id.as_str();
        let mut warnings = Vec::new();
        let mut bundles: Vec<(String, String, Value)> = Vec::new();

        for (locale, namespaces) in &manifest.translations {
            for (namespace, reference) in namespaces {
                let resolved =
                    tokio::time::timeout(self.timeout, self.resolver.resolve(plugin_id, reference)).await;

                let bundle = match resolved {
                    Ok(Ok(module)) => match module.into_data() {
                        Some(value) if value.is_object() => value,
                        _ => {
                            let message = format!(
                                "translation bundle {}/{} is not an object",
                                locale, namespace
                            );
                            warn!(plugin_id, locale = %locale, namespace = %namespace, "{}", message);
                            warnings.push(message);
                            empty()
                        }
                    },
                    Ok(Err(e)) => {
                        let message = format!(
                            "failed to load translations {}/{}: {}",
                            locale, namespace, e
                        );
                        warn!(plugin_id, locale = %locale, namespace = %namespace, error = %e, "Translation bundle failed to load");
                        warnings.push(message);
                        empty()
                    }
                    Err(_) => {
                        let message = format!(
                            "translations {}/{} timed out after {}ms",
                            locale,
                            namespace,
                            self.timeout.as_millis()
                        );
                        warn!(plugin_id, locale = %locale, namespace = %namespace, "Translation bundle timed out");
                        warnings.push(message);
                        empty()
                    }
                };
                bundles.push((locale.clone(), namespace.clone(), bundle));
            }
        }

        // 코어 오버라이드가 항상 우선
        for (locale, namespaces) in overrides {
            for (namespace, patch) in namespaces {
                match bundles
                    .iter_mut()
                    .find(|(l, ns, _)| l == locale && ns == namespace)
                {
                    Some((_, _, bundle)) => deep_merge_into(bundle, patch.clone()),
                    None => bundles.push((locale.clone(), namespace.clone(), patch.clone())),
                }
            }
        }

        let mut contributions = self.contributions.write();
        for (locale, namespace, bundle) in bundles {
            let key = (locale, namespace);
            let contributors = contributions.entry(key.clone()).or_default();
            match contributors.iter_mut().find(|(owner, _)| owner == plugin_id) {
                Some((_, existing)) => *existing = bundle,
                None => contributors.push((plugin_id.to_string(), bundle)),
            }
            self.store.set_bundle(&key.0, &key.1, merge_contributors(contributors));
            debug!(plugin_id, locale = %key.0, namespace = %key.1, "Registered translation bundle");
        }

        warnings
    }

    /// 플러그인 기여분 제거
    ///
    /// 다른 플러그인이 기여한 키는 남기고 번들을 다시 만듭니다. 반환값은
    /// 이 플러그인이 기여했던 번들 수입니다.
    pub fn unload_plugin(&self, plugin_id: &str) -> usize {
        let mut contributions = self.contributions.write();
        let mut touched = 0;

        contributions.retain(|(locale, namespace), contributors| {
            let before = contributors.len();
            contributors.retain(|(owner, _)| owner != plugin_id);
            if contributors.len() == before {
                return true;
            }

            touched += 1;
            if contributors.is_empty() {
                self.store.remove_bundle(locale, namespace);
                false
            } else {
                self.store.set_bundle(locale, namespace, merge_contributors(contributors));
                true
            }
        });

        debug!(plugin_id, bundles = touched, "Unloaded plugin translations");
        touched
    }

    pub fn translate(&self, locale: &str, namespace: &str, key: &str) -> String {
        self.store.translate(locale, namespace, key)
    }
}

fn empty() -> Value {
    Value::Object(Map::new())
}

fn merge_contributors(contributors: &[(String, Value)]) -> Value {
    let mut merged = empty();
    for (_, bundle) in contributors {
        deep_merge_into(&mut merged, bundle.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::expand_overrides;
    use crate::plugin::StaticModuleResolver;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn manager(resolver: StaticModuleResolver) -> LocalizationManager {
        LocalizationManager::new(Arc::new(resolver), TranslationStore::new("en"))
    }

    fn overrides(pairs: &[(&str, &str, &str)]) -> LocaleOverrides {
        let mut raw: BTreeMap<String, BTreeMap<String, Value>> = BTreeMap::new();
        for (locale, key, text) in pairs {
            raw.entry(locale.to_string())
                .or_default()
                .insert(key.to_string(), json!(text));
        }
        expand_overrides("leave", &raw)
    }

    #[tokio::test]
    async fn test_override_wins() {
        let resolver = StaticModuleResolver::new().with_data(
            "leave",
            "locales/en",
            json!({ "title": "Leave", "form": { "submit": "Submit", "cancel": "Cancel" } }),
        );
        let manager = manager(resolver);
        let manifest = PluginManifest::new("leave", "Leave", "1.0.0")
            .with_translation("en", "leave", "locales/en");

        let warnings = manager
            .load_plugin_translations(&manifest, &overrides(&[("en", "form.submit", "Send")]))
            .await;

        assert!(warnings.is_empty());
        assert_eq!(manager.translate("en", "leave", "form.submit"), "Send");
        assert_eq!(manager.translate("en", "leave", "form.cancel"), "Cancel");
        assert_eq!(manager.translate("en", "leave", "title"), "Leave");
    }

    #[tokio::test]
    async fn test_failed_bundle_falls_back_to_keys() {
        let resolver = StaticModuleResolver::new();
        resolver.insert_failure("leave", "locales/ko", "bad json");
        let manager = manager(resolver);
        let manifest = PluginManifest::new("leave", "Leave", "1.0.0")
            .with_translation("ko", "leave", "locales/ko");

        let warnings = manager
            .load_plugin_translations(&manifest, &LocaleOverrides::new())
            .await;

        assert_eq!(warnings.len(), 1);
        assert!(manager.store().has_bundle("ko", "leave"));
        assert_eq!(manager.translate("ko", "leave", "title"), "title");
    }

    #[tokio::test]
    async fn test_override_only_locale_and_unload() {
        let manager = manager(StaticModuleResolver::new());
        let manifest = PluginManifest::new("leave", "Leave", "1.0.0");

        manager
            .load_plugin_translations(
                &manifest,
                &overrides(&[("de", "title", "Urlaub"), ("de", "common:ok", "Gut")]),
            )
            .await;

        assert_eq!(manager.translate("de", "leave", "title"), "Urlaub");
        assert_eq!(manager.translate("de", "common", "ok"), "Gut");
        assert_eq!(manager.unload_plugin("leave"), 2);
        assert_eq!(manager.translate("de", "leave", "title"), "title");
    }

    #[tokio::test]
    async fn test_stalled_bundle_times_out() {
        let resolver = StaticModuleResolver::new();
        resolver.insert_stall("leave", "locales/en");
        let manager = manager(resolver).with_timeout(Duration::from_millis(20));
        let manifest = PluginManifest::new("leave", "Leave", "1.0.0")
            .with_translation("en", "leave", "locales/en");

        let warnings = manager
            .load_plugin_translations(&manifest, &overrides(&[("en", "title", "Leave")]))
            .await;

        assert_eq!(warnings, vec!["translations en/leave timed out after 20ms"]);
        assert_eq!(manager.translate("en", "leave", "title"), "Leave");
    }

    #[tokio::test]
    async fn test_unload_keeps_other_contributors() {
        let resolver = StaticModuleResolver::new()
            .with_data("a", "common/en", json!({ "save": "Save", "close": "Close" }))
            .with_data("b", "common/en", json!({ "print": "Print", "close": "Dismiss" }));
        let manager = manager(resolver);
        let a = PluginManifest::new("a", "A", "1.0.0").with_translation("en", "common", "common/en");
        let b = PluginManifest::new("b", "B", "1.0.0").with_translation("en", "common", "common/en");

        manager.load_plugin_translations(&a, &LocaleOverrides::new()).await;
        manager.load_plugin_translations(&b, &LocaleOverrides::new()).await;
        assert_eq!(manager.translate("en", "common", "close"), "Dismiss");

        assert_eq!(manager.unload_plugin("b"), 1);
        assert_eq!(manager.translate("en", "common", "save"), "Save");
        assert_eq!(manager.translate("en", "common", "print"), "print");
        assert_eq!(manager.translate("en", "common", "close"), "Close");

        assert_eq!(manager.unload_plugin("a"), 1);
        assert!(!manager.store().has_bundle("en", "common"));
    }

    #[tokio::test]
    async fn test_reload_replaces_own_contribution() {
        let manager = manager(StaticModuleResolver::new());
        let manifest = PluginManifest::new("leave", "Leave", "1.0.0");

        manager
            .load_plugin_translations(&manifest, &overrides(&[("en", "title", "Leave"), ("en", "old", "x")]))
            .await;
        manager
            .load_plugin_translations(&manifest, &overrides(&[("en", "title", "Time Off")]))
            .await;

        assert_eq!(manager.translate("en", "leave", "title"), "Time Off");
        assert_eq!(manager.translate("en", "leave", "old"), "old");
    }
}
