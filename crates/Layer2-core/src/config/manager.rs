//! Config Manager - 플러그인별 검증된 설정의 단일 소유자
//!
//! 모든 쓰기는 "병합 → 스키마 검증 → 커밋" 순서입니다. 검증에 실패한
//! 값은 절대 저장되지 않으며 이전 값이 유지됩니다.

use erp_foundation::schema::ConfigSchema;
use erp_foundation::util::{deep_merge, get_path};
use erp_foundation::{Error, Result};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

struct ConfigRecord {
    schema: ConfigSchema,
    /// 스키마 기본값 ← 매니페스트 기본값
    defaults: Value,
    current: Value,
}

impl ConfigRecord {
    fn check(&self, plugin_id: &str, candidate: &Value) -> Result<()> {
        let violations = self.schema.validate(candidate);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Error::config_validation(plugin_id, violations))
        }
    }
}

/// 설정 관리자
#[derive(Default)]
pub struct ConfigManager {
    records: RwLock<HashMap<String, ConfigRecord>>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 설정 초기화: defaults ← override 병합 후 검증
    ///
    /// 검증 실패 시 기본값만으로 된 설정을 저장하고 에러를 반환합니다.
    /// 기본값도 스키마를 만족하지 못하면 아무것도 저장하지 않습니다
    /// (`contains` 가 false).
    pub fn load_config(
        &self,
        plugin_id: &str,
        schema: &ConfigSchema,
        defaults: &Value,
        overlay: Option<&Value>,
    ) -> Result<Value> {
        let mut effective_defaults = deep_merge(&schema.defaults(), defaults);
        schema.apply_defaults(&mut effective_defaults);

        let merged = match overlay {
            Some(overlay) => deep_merge(&effective_defaults, overlay),
            None => effective_defaults.clone(),
        };

        let mut record = ConfigRecord {
            schema: schema.clone(),
            defaults: effective_defaults,
            current: Value::Null,
        };

        let result = match record.check(plugin_id, &merged) {
            Ok(()) => {
                record.current = merged.clone();
                Ok(merged)
            }
            Err(e) => {
                // 기본값조차 스키마를 만족하지 못하면 제공할 설정이 없음
                if let Err(defaults_err) = record.check(plugin_id, &record.defaults) {
                    warn!(plugin_id, error = %defaults_err, "Plugin defaults do not satisfy their own schema");
                    self.records.write().remove(plugin_id);
                    return Err(defaults_err);
                }
                warn!(plugin_id, error = %e, "Invalid plugin configuration, falling back to defaults");
                record.current = record.defaults.clone();
                Err(e)
            }
        };

        self.records.write().insert(plugin_id.to_string(), record);
        result
    }

    /// 부분 업데이트 (현재 값 위에 딥 머지)
    pub fn update_config(&self, plugin_id: &str, patch: &Value) -> Result<Value> {
        if !patch.is_object() {
            return Err(Error::InvalidInput("config update must be an object".into()));
        }
        self.commit(plugin_id, |record| deep_merge(&record.current, patch))
    }

    /// 전체 교체 (스키마 기본값은 채움)
    pub fn import_config(&self, plugin_id: &str, config: &Value) -> Result<Value> {
        self.commit(plugin_id, |record| {
            let mut candidate = config.clone();
            record.schema.apply_defaults(&mut candidate);
            candidate
        })
    }

    /// 기본값으로 되돌림
    pub fn reset_config(&self, plugin_id: &str) -> Result<Value> {
        self.commit(plugin_id, |record| record.defaults.clone())
    }

    fn commit<F>(&self, plugin_id: &str, build: F) -> Result<Value>
    where
        F: FnOnce(&ConfigRecord) -> Value,
    {
        let mut records = self.records.write();
        let record = records
            .get_mut(plugin_id)
            .ok_or_else(|| Error::NotFound(format!("no configuration for plugin '{}'", plugin_id)))?;

        let candidate = build(record);
        if let Err(e) = record.check(plugin_id, &candidate) {
            warn!(plugin_id, error = %e, "Rejected configuration change");
            return Err(e);
        }

        record.current = candidate.clone();
        debug!(plugin_id, "Configuration committed");
        Ok(candidate)
    }

    pub fn get_config(&self, plugin_id: &str) -> Option<Value> {
        self.records.read().get(plugin_id).map(|r| r.current.clone())
    }

    /// dotted path 로 값 조회
    pub fn get_value(&self, plugin_id: &str, path: &str) -> Option<Value> {
        let records = self.records.read();
        let current = &records.get(plugin_id)?.current;
        get_path(current, path).cloned()
    }

    pub fn get_all_configs(&self) -> BTreeMap<String, Value> {
        self.records
            .read()
            .iter()
            .map(|(id, r)| (id.clone(), r.current.clone()))
            .collect()
    }

    /// 현재 설정을 보기 좋은 JSON 으로
    pub fn export_config(&self, plugin_id: &str) -> Result<String> {
        let config = self
            .get_config(plugin_id)
            .ok_or_else(|| Error::NotFound(format!("no configuration for plugin '{}'", plugin_id)))?;
        Ok(serde_json::to_string_pretty(&config)?)
    }

    pub fn schema(&self, plugin_id: &str) -> Option<ConfigSchema> {
        self.records.read().get(plugin_id).map(|r| r.schema.clone())
    }

    pub fn contains(&self, plugin_id: &str) -> bool {
        self.records.read().contains_key(plugin_id)
    }

    pub fn remove(&self, plugin_id: &str) -> bool {
        self.records.write().remove(plugin_id).is_some()
    }

    pub fn clear(&self) {
        self.records.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use erp_foundation::schema::SchemaType;
    use serde_json::json;

    fn schema() -> ConfigSchema {
        ConfigSchema::object()
            .with_property("maxItems", ConfigSchema::integer_range(1, 1000))
            .with_property("mode", ConfigSchema::string_enum(["strict", "lenient"]).with_default(json!("strict")))
            .with_property(
                "notify",
                ConfigSchema::object().with_property(
                    "email",
                    ConfigSchema {
                        kind: SchemaType::Boolean,
                        ..Default::default()
                    },
                ),
            )
            .with_required("maxItems")
    }

    fn loaded() -> ConfigManager {
        let manager = ConfigManager::new();
        manager
            .load_config("leave", &schema(), &json!({ "maxItems": 10 }), Some(&json!({ "maxItems": 50 })))
            .unwrap();
        manager
    }

    #[test]
    fn test_load_applies_schema_defaults() {
        let manager = loaded();
        assert_eq!(
            manager.get_config("leave").unwrap(),
            json!({ "maxItems": 50, "mode": "strict", "notify": {} })
        );
    }

    #[test]
    fn test_invalid_load_falls_back_to_defaults() {
        let manager = ConfigManager::new();
        let err = manager
            .load_config("leave", &schema(), &json!({ "maxItems": 10 }), Some(&json!({ "maxItems": "lots" })))
            .unwrap_err();

        match err {
            Error::ConfigValidation { violations, .. } => assert_eq!(violations[0].path, "maxItems"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(manager.get_value("leave", "maxItems"), Some(json!(10)));
    }

    #[test]
    fn test_self_invalid_defaults_are_not_served() {
        let manager = ConfigManager::new();
        let strict = ConfigSchema::object()
            .with_property("maxItems", ConfigSchema::integer_range(1, 1000))
            .with_required("maxItems");

        // 기본값이 minimum 위반, override 없음
        let err = manager
            .load_config("leave", &strict, &json!({ "maxItems": 0 }), None)
            .unwrap_err();
        assert!(matches!(err, Error::ConfigValidation { .. }));
        assert!(!manager.contains("leave"));
        assert_eq!(manager.get_config("leave"), None);

        // 기본값이 required 위반, override 도 잘못됨
        let err = manager
            .load_config("leave", &strict, &json!({}), Some(&json!({ "maxItems": "lots" })))
            .unwrap_err();
        match err {
            Error::ConfigValidation { violations, .. } => assert_eq!(violations[0].path, "maxItems"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!manager.contains("leave"));
    }

    #[test]
    fn test_invalid_update_keeps_previous_value() {
        let manager = loaded();
        let before = manager.get_all_configs();

        let err = manager.update_config("leave", &json!({ "maxItems": -5 })).unwrap_err();
        assert!(matches!(err, Error::ConfigValidation { .. }));
        assert_eq!(manager.get_all_configs(), before);
        assert_eq!(manager.get_value("leave", "maxItems"), Some(json!(50)));
    }

    #[test]
    fn test_update_merges() {
        let manager = loaded();
        let updated = manager
            .update_config("leave", &json!({ "notify": { "email": true } }))
            .unwrap();
        assert_eq!(updated["maxItems"], json!(50));
        assert_eq!(manager.get_value("leave", "notify.email"), Some(json!(true)));
    }

    #[test]
    fn test_import_replaces_wholesale() {
        let manager = loaded();
        let imported = manager.import_config("leave", &json!({ "maxItems": 7 })).unwrap();
        assert_eq!(imported, json!({ "maxItems": 7, "mode": "strict", "notify": {} }));

        assert!(manager.import_config("leave", &json!({ "mode": "strict" })).is_err());
        assert_eq!(manager.get_value("leave", "maxItems"), Some(json!(7)));
    }

    #[test]
    fn test_reset_export_remove() {
        let manager = loaded();
        assert_eq!(manager.reset_config("leave").unwrap()["maxItems"], json!(10));
        assert!(manager.export_config("leave").unwrap().contains("\"maxItems\": 10"));
        assert!(manager.remove("leave"));
        assert!(matches!(manager.update_config("leave", &json!({})), Err(Error::NotFound(_))));
    }
}
