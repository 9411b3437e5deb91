//! Deployment configuration - 배포별 플러그인 목록과 오버라이드
//!
//! 운영자가 작성하는 정적 문서입니다. 문서 자체가 잘못되면 시작 시점에
//! `Error::Config` 로 즉시 실패합니다 (개별 플러그인 실패와 구분).

use erp_foundation::config::{parse_document, read_typed, DocumentFormat};
use erp_foundation::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// 지원하는 배포 설정 스키마 버전
pub const DEPLOYMENT_SCHEMA_VERSION: u32 = 1;

// ============================================================================
// PluginEntry
// ============================================================================

/// 사이드바 배치 힌트
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiPlacement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// 배포 설정의 플러그인 항목
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginEntry {
    /// 패키지 식별자 (카탈로그 키)
    pub package: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// 매니페스트 기본값 위에 딥 머지될 설정
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,

    /// locale → dotted key (`"ns:a.b"` 허용) → 번역 문자열
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub localization: BTreeMap<String, BTreeMap<String, Value>>,

    /// permission code → 추가 역할
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub permissions: BTreeMap<String, Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui: Option<UiPlacement>,
}

fn default_enabled() -> bool {
    true
}

impl PluginEntry {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            enabled: true,
            config: None,
            localization: BTreeMap::new(),
            permissions: BTreeMap::new(),
            ui: None,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_translation(
        mut self,
        locale: impl Into<String>,
        key: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        self.localization
            .entry(locale.into())
            .or_default()
            .insert(key.into(), Value::String(text.into()));
        self
    }

    pub fn with_roles<I, S>(mut self, code: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions
            .insert(code.into(), roles.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_ui(mut self, ui: UiPlacement) -> Self {
        self.ui = Some(ui);
        self
    }

    /// 항목 단위 검사
    pub fn validate(&self) -> Result<()> {
        if self.package.trim().is_empty() {
            return Err(Error::Config("plugin entry has an empty package".into()));
        }
        if let Some(config) = &self.config {
            if !config.is_object() {
                return Err(Error::Config(format!(
                    "config override for '{}' must be an object",
                    self.package
                )));
            }
        }
        for (locale, keys) in &self.localization {
            if let Some((key, _)) = keys.iter().find(|(_, v)| !v.is_string()) {
                return Err(Error::Config(format!(
                    "localization override '{}' ({}) for '{}' must be a string",
                    key, locale, self.package
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// DeploymentConfig
// ============================================================================

/// 배포 설정 문서
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    #[serde(default = "default_schema_version")]
    pub version: u32,

    #[serde(default)]
    pub plugins: Vec<PluginEntry>,
}

fn default_schema_version() -> u32 {
    DEPLOYMENT_SCHEMA_VERSION
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl DeploymentConfig {
    pub fn new(plugins: Vec<PluginEntry>) -> Self {
        Self {
            version: DEPLOYMENT_SCHEMA_VERSION,
            plugins,
        }
    }

    /// 파일에서 로드 (확장자로 JSON/TOML 판별) 후 검증
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = read_typed(path).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 문자열에서 파싱 후 검증
    pub fn parse(content: &str, format: DocumentFormat) -> Result<Self> {
        let value = parse_document(content, format).map_err(|e| Error::Config(e.to_string()))?;
        let config: Self = serde_json::from_value(value)
            .map_err(|e| Error::Config(format!("invalid deployment configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// 문서 전체 검사
    pub fn validate(&self) -> Result<()> {
        if self.version != DEPLOYMENT_SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "unsupported deployment schema version {} (expected {})",
                self.version, DEPLOYMENT_SCHEMA_VERSION
            )));
        }

        let mut seen = HashSet::new();
        for entry in &self.plugins {
            entry.validate()?;
            if !seen.insert(entry.package.as_str()) {
                return Err(Error::Config(format!(
                    "package '{}' is listed more than once",
                    entry.package
                )));
            }
        }
        Ok(())
    }

    pub fn entry(&self, package: &str) -> Option<&PluginEntry> {
        self.plugins.iter().find(|e| e.package == package)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_json_with_comments() {
        let config = DeploymentConfig::parse(
            r#"{
                // 기본 배포
                "plugins": [
                    { "package": "@erp-plugins/leave", "config": { "maxDays": 30 } },
                    { "package": "reports", "enabled": false }
                ]
            }"#,
            DocumentFormat::Json,
        )
        .unwrap();

        assert_eq!(config.plugins.len(), 2);
        assert!(config.plugins[0].enabled);
        assert!(!config.plugins[1].enabled);
        assert_eq!(config.plugins[0].config, Some(json!({ "maxDays": 30 })));
    }

    #[test]
    fn test_parse_toml() {
        let config = DeploymentConfig::parse(
            r#"
            version = 1

            [[plugins]]
            package = "leave"

            [plugins.localization.en]
            "leave:title" = "Time Off"

            [plugins.ui]
            position = 3
            "#,
            DocumentFormat::Toml,
        )
        .unwrap();

        let entry = config.entry("leave").unwrap();
        assert_eq!(entry.localization["en"]["leave:title"], json!("Time Off"));
        assert_eq!(entry.ui.as_ref().unwrap().position, Some(3));
    }

    #[test]
    fn test_malformed_documents_fail_fast() {
        let cases = [
            r#"{ "plugins": [{ "package": "" }] }"#,
            r#"{ "plugins": [{ "package": "a", "config": [1, 2] }] }"#,
            r#"{ "plugins": [{ "package": "a", "localization": { "en": { "k": 5 } } }] }"#,
            r#"{ "version": 9, "plugins": [] }"#,
            r#"{ "plugins": [{ "package": "a" }, { "package": "a" }] }"#,
            r#"{ "plugins": "nope" }"#,
        ];

        for case in cases {
            let err = DeploymentConfig::parse(case, DocumentFormat::Json).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{case}: {err}");
        }
    }
}
