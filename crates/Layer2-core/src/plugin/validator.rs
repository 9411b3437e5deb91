//! Plugin Validator - 매니페스트 구조 및 코어 버전 호환성 검사
//!
//! 검증은 매니페스트만 들여다봅니다. 모듈 참조는 비어 있는지만 확인하고
//! 절대 해석하지 않습니다.

use super::manifest::PluginManifest;
use erp_foundation::util::is_valid_plugin_id;
use erp_foundation::{Error, Result};
use regex::Regex;
use semver::{Version, VersionReq};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

// ============================================================================
// VersionRange - npm 스타일 범위
// ============================================================================

/// npm 스타일 버전 범위 (`||` 합집합 지원)
///
/// - `">=1.0.0 <2.0.0"` → 쉼표 구분 comparator 로 정규화
/// - `"1.x"`, `"1.2.X"` → 와일드카드
/// - `"1.2.3"` 처럼 연산자 없는 완전한 버전은 정확히 일치 (`=1.2.3`)
/// - `"1.0.0 - 2.0.0"` → `>=1.0.0, <=2.0.0`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    raw: String,
    alternatives: Vec<VersionReq>,
}

impl VersionRange {
    pub fn parse(range: &str) -> Result<Self> {
        let alternatives = range
            .split("||")
            .map(|alt| {
                let normalized = normalize_range(alt);
                VersionReq::parse(&normalized).map_err(|e| {
                    Error::InvalidInput(format!("invalid version range '{}': {}", range.trim(), e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            raw: range.trim().to_string(),
            alternatives,
        })
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn hyphen_range() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*(\S+)\s+-\s+(\S+)\s*$").expect("static regex")
    })
}

fn operator_prefix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(>=|<=|>|<|=|\^|~)?v?(.*)$").expect("static regex"))
}

/// npm 범위 한 개를 semver crate 문법으로 정규화
fn normalize_range(range: &str) -> String {
    let range = range.trim();
    if range.is_empty() || range == "*" || range.eq_ignore_ascii_case("x") || range == "latest" {
        return "*".to_string();
    }

    if let Some(caps) = hyphen_range().captures(range) {
        return format!(">={}, <={}", wildcard(&caps[1]), wildcard(&caps[2]));
    }

    // 연산자와 버전 사이 공백 붙이기 (">= 1.0.0" → ">=1.0.0")
    let mut tokens: Vec<String> = Vec::new();
    let mut pending_op: Option<&str> = None;
    for token in range.split(|c: char| c.is_whitespace() || c == ',').filter(|t| !t.is_empty()) {
        if matches!(token, ">=" | "<=" | ">" | "<" | "=" | "^" | "~") {
            pending_op = Some(token);
            continue;
        }
        match pending_op.take() {
            Some(op) => tokens.push(format!("{}{}", op, token)),
            None => tokens.push(token.to_string()),
        }
    }

    tokens
        .iter()
        .map(|t| normalize_comparator(t))
        .collect::<Vec<_>>()
        .join(", ")
}

fn normalize_comparator(token: &str) -> String {
    let Some(caps) = operator_prefix().captures(token) else {
        return token.to_string();
    };
    let op = caps.get(1).map(|m| m.as_str()).unwrap_or("");
    let version = wildcard(&caps[2]);

    if !op.is_empty() {
        return format!("{}{}", op, version);
    }

    // 연산자 없음: 완전한 버전은 정확 일치, 부분 버전은 와일드카드
    let parts = version.split('.').count();
    if version.contains('*') {
        version
    } else if parts >= 3 {
        format!("={}", version)
    } else {
        format!("{}.*", version)
    }
}

fn wildcard(version: &str) -> String {
    version
        .split('.')
        .map(|part| if part.eq_ignore_ascii_case("x") { "*" } else { part })
        .collect::<Vec<_>>()
        .join(".")
}

/// 범위 만족 여부
pub fn satisfies(range: &str, version: &str) -> Result<bool> {
    let version = Version::parse(version.trim())
        .map_err(|e| Error::InvalidInput(format!("invalid version '{}': {}", version, e)))?;
    Ok(VersionRange::parse(range)?.matches(&version))
}

// ============================================================================
// ValidationReport
// ============================================================================

/// 검증 결과
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// 에러 메시지를 한 줄로
    pub fn message(&self) -> String {
        self.errors.join("; ")
    }
}

// ============================================================================
// PluginValidator
// ============================================================================

/// 실행 중인 코어 버전에 묶인 검증기
#[derive(Debug, Clone)]
pub struct PluginValidator {
    core_version: Version,
}

impl PluginValidator {
    /// 코어 버전이 semver 가 아니면 호스트 설정 오류
    pub fn new(core_version: &str) -> Result<Self> {
        let core_version = Version::parse(core_version.trim()).map_err(|e| {
            Error::Config(format!("core version '{}' is not valid semver: {}", core_version, e))
        })?;
        Ok(Self { core_version })
    }

    pub fn core_version(&self) -> &Version {
        &self.core_version
    }

    /// 매니페스트 검증 (부수 효과 없음)
    pub fn validate(&self, manifest: &PluginManifest) -> ValidationReport {
        let mut errors = Vec::new();

        // 식별 정보
        if manifest.id.trim().is_empty() {
            errors.push("id is required".to_string());
        } else if !is_valid_plugin_id(&manifest.id) {
            errors.push(format!(
                "id '{}' must be lowercase letters, digits, '.', '_' or '-'",
                manifest.id
            ));
        }
        if manifest.name.trim().is_empty() {
            errors.push("name is required".to_string());
        }
        if manifest.version.trim().is_empty() {
            errors.push("version is required".to_string());
        } else if let Err(e) = Version::parse(manifest.version.trim()) {
            errors.push(format!("version '{}' is not valid semver: {}", manifest.version, e));
        }

        // 코어 버전 호환성
        match VersionRange::parse(&manifest.core_version) {
            Ok(range) if !range.matches(&self.core_version) => errors.push(format!(
                "core version {} does not satisfy {}",
                self.core_version, range
            )),
            Ok(_) => {}
            Err(e) => errors.push(format!("coreVersion: {}", e)),
        }

        self.check_dependencies(manifest, &mut errors);

        if !manifest.config.defaults.is_object() {
            errors.push("config.defaults must be an object".to_string());
        }

        for (field, reference) in manifest.module_refs() {
            if reference.is_empty() {
                errors.push(format!("{} has an empty module reference", field));
            }
        }

        if manifest.events.emits.iter().any(|e| e.trim().is_empty()) {
            errors.push("events.emits contains an empty event name".to_string());
        }
        if manifest.events.listens.iter().any(|l| l.event.trim().is_empty()) {
            errors.push("events.listens contains an empty event name".to_string());
        }

        let mut codes = HashSet::new();
        for permission in &manifest.permissions {
            if permission.code.trim().is_empty() {
                errors.push("permission code is required".to_string());
            } else if !codes.insert(permission.code.as_str()) {
                errors.push(format!("permission '{}' is declared twice", permission.code));
            }
        }

        ValidationReport::from_errors(errors)
    }

    fn check_dependencies(&self, manifest: &PluginManifest, errors: &mut Vec<String>) {
        let mut seen = HashSet::new();
        for dep in &manifest.dependencies {
            if dep.id.trim().is_empty() {
                errors.push("dependency id is required".to_string());
                continue;
            }
            if dep.id == manifest.id {
                errors.push(format!("plugin '{}' cannot depend on itself", manifest.id));
            }
            if !seen.insert(dep.id.as_str()) {
                errors.push(format!("dependency '{}' is declared twice", dep.id));
            }
            if let Some(range) = &dep.version {
                if let Err(e) = VersionRange::parse(range) {
                    errors.push(format!("dependency '{}': {}", dep.id, e));
                }
            }
        }
    }
}

/// 단발성 검증 (`PluginValidator::new` + `validate`)
pub fn validate(manifest: &PluginManifest, core_version: &str) -> Result<ValidationReport> {
    Ok(PluginValidator::new(core_version)?.validate(manifest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::manifest::{PermissionDef, PluginDependency};

    fn manifest() -> PluginManifest {
        PluginManifest::new("leave", "Leave", "1.0.0").with_core_version(">=1.0.0")
    }

    #[test]
    fn test_npm_ranges() {
        let cases = [
            (">=1.0.0", "1.2.0", true),
            (">=1.0.0 <2.0.0", "1.9.9", true),
            (">=1.0.0 <2.0.0", "2.0.0", false),
            (">= 1.0.0", "1.0.0", true),
            ("^1.2.0", "1.5.0", true),
            ("^1.2.0", "2.0.0", false),
            ("~1.2.0", "1.2.9", true),
            ("~1.2.0", "1.3.0", false),
            ("1.x", "1.7.3", true),
            ("1.2.X", "1.3.0", false),
            ("1.2", "1.2.7", true),
            ("1.2", "1.3.0", false),
            ("1.2.0", "1.2.0", true),
            ("1.2.0", "1.3.0", false),
            ("1.0.0 - 1.5.0", "1.5.0", true),
            ("1.0.0 - 1.5.0", "1.6.0", false),
            ("^1.0.0 || ^3.0.0", "3.1.0", true),
            ("^1.0.0 || ^3.0.0", "2.1.0", false),
            ("*", "9.9.9", true),
            ("", "0.1.0", true),
        ];

        for (range, version, expected) in cases {
            assert_eq!(satisfies(range, version).unwrap(), expected, "{range} vs {version}");
        }
    }

    #[test]
    fn test_invalid_range() {
        assert!(VersionRange::parse(">=abc").is_err());
    }

    #[test]
    fn test_valid_manifest() {
        let report = validate(&manifest(), "1.2.0").unwrap();
        assert!(report.valid, "{:?}", report.errors);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_incompatible_core_version() {
        let report = validate(&manifest().with_core_version("^2.0.0"), "1.2.0").unwrap();
        assert!(!report.valid);
        assert_eq!(report.errors, vec!["core version 1.2.0 does not satisfy ^2.0.0"]);
    }

    #[test]
    fn test_structural_errors_are_collected() {
        let mut bad = PluginManifest::new("Leave Mgmt", "", "one")
            .with_dependency(PluginDependency::new("Leave Mgmt"))
            .with_dependency(PluginDependency::new("x").with_version("not a range"))
            .with_routes("")
            .with_permission(PermissionDef::new("a", "A"))
            .with_permission(PermissionDef::new("a", "A again"));
        bad.config.defaults = serde_json::json!([1]);

        let report = validate(&bad, "1.0.0").unwrap();
        assert!(!report.valid);
        let all = report.message();
        assert!(all.contains("must be lowercase"));
        assert!(all.contains("name is required"));
        assert!(all.contains("not valid semver"));
        assert!(all.contains("cannot depend on itself"));
        assert!(all.contains("dependency 'x'"));
        assert!(all.contains("frontend.routes has an empty module reference"));
        assert!(all.contains("config.defaults must be an object"));
        assert!(all.contains("permission 'a' is declared twice"));
    }

    #[test]
    fn test_bad_core_version_is_host_error() {
        let err = PluginValidator::new("latest").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
