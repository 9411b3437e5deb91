//! Error types for the ERP plugin system
//!
//! 모든 에러를 중앙에서 관리

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// 플러그인 시스템 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 설정 관련
    // ========================================================================
    /// 배포 설정/코어 설정 자체가 잘못됨 (운영자 실수, fail-fast)
    #[error("Configuration error: {0}")]
    Config(String),

    /// 플러그인 설정 값이 스키마를 통과하지 못함
    #[error("Config validation failed for {plugin_id}: {}", format_violations(.violations))]
    ConfigValidation {
        plugin_id: String,
        violations: Vec<SchemaViolation>,
    },

    // ========================================================================
    // 플러그인 파이프라인 관련
    // ========================================================================
    /// 매니페스트 검증 실패
    #[error("Validation error: {0}")]
    Validation(String),

    /// 의존성 해석 실패
    #[error("Dependency error: {0}")]
    Dependency(#[from] DependencyError),

    /// 모듈 로드 실패
    #[error("Load error: {plugin_id} - {message}")]
    Load { plugin_id: String, message: String },

    /// 번역 번들 로드 실패
    #[error("Localization error: {0}")]
    Localization(String),

    // ========================================================================
    // 실행 관련
    // ========================================================================
    #[error("Timeout: {0}")]
    Timeout(String),

    // ========================================================================
    // 일반
    // ========================================================================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 플러그인 하나에 국한되는 에러인지 (Manager가 삼키고 계속 진행)
    pub fn is_plugin_local(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::Dependency(_)
                | Error::Load { .. }
                | Error::Localization(_)
                | Error::ConfigValidation { .. }
                | Error::Timeout(_)
        )
    }

    /// 로드 에러 생성 헬퍼
    pub fn load(plugin_id: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Load {
            plugin_id: plugin_id.into(),
            message: message.into(),
        }
    }

    /// 설정 검증 에러 생성 헬퍼
    pub fn config_validation(plugin_id: impl Into<String>, violations: Vec<SchemaViolation>) -> Self {
        Error::ConfigValidation {
            plugin_id: plugin_id.into(),
            violations,
        }
    }
}

// ============================================================================
// DependencyError
// ============================================================================

/// 의존성 해석 에러
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DependencyError {
    /// 참조한 플러그인이 후보 집합에 없음
    #[error("plugin '{plugin}' depends on missing plugin '{missing}'")]
    Missing { plugin: String, missing: String },

    /// 순환 의존성 (발견 순서대로)
    #[error("dependency cycle detected: {}", .members.join(" -> "))]
    Cycle { members: Vec<String> },

    /// 의존 플러그인의 버전이 요구 범위를 만족하지 않음
    #[error("plugin '{plugin}' requires '{dependency}' {required}, found {found}")]
    VersionMismatch {
        plugin: String,
        dependency: String,
        required: String,
        found: String,
    },

    /// 의존 플러그인이 다른 이유로 제외됨
    #[error("plugin '{plugin}' depends on unavailable plugin '{dependency}'")]
    Unavailable { plugin: String, dependency: String },
}

impl DependencyError {
    /// 이 에러로 제외되는 플러그인 ID 목록
    pub fn implicated(&self) -> Vec<String> {
        match self {
            DependencyError::Missing { plugin, .. }
            | DependencyError::VersionMismatch { plugin, .. }
            | DependencyError::Unavailable { plugin, .. } => vec![plugin.clone()],
            DependencyError::Cycle { members } => members.clone(),
        }
    }
}

// ============================================================================
// SchemaViolation
// ============================================================================

/// 스키마 위반 항목 (필드 경로 + 메시지)
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SchemaViolation {
    /// 점 표기 경로 (루트는 빈 문자열)
    pub path: String,
    pub message: String,
}

impl SchemaViolation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

fn format_violations(violations: &[SchemaViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// From 구현 (추가 변환)
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_display() {
        let err = DependencyError::Cycle {
            members: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "dependency cycle detected: a -> b -> a");
    }

    #[test]
    fn test_config_validation_display() {
        let err = Error::config_validation(
            "leave",
            vec![
                SchemaViolation::new("maxItems", "must be >= 1"),
                SchemaViolation::new("", "expected object"),
            ],
        );
        let text = err.to_string();
        assert!(text.contains("leave"));
        assert!(text.contains("maxItems: must be >= 1"));
        assert!(err.is_plugin_local());
    }

    #[test]
    fn test_config_error_is_not_plugin_local() {
        assert!(!Error::Config("bad".into()).is_plugin_local());
    }
}
