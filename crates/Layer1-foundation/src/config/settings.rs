//! Core Settings - 플러그인 시스템 실행 설정
//!
//! ## 검색 우선순위 (낮은 → 높은)
//!
//! 1. User-level: `~/.erp/settings.toml`
//! 2. Project-level: `.erp/settings.toml`
//! 3. Local (gitignored): `.erp/settings.local.toml`
//! 4. 환경 변수 (`ERP_CORE_VERSION`, `ERP_LOAD_TIMEOUT_MS`, `ERP_PARALLEL_LOAD`)
//!
//! 각 레벨은 이전 레벨 위에 딥 머지됩니다.

use super::document::read_document;
use crate::util::deep_merge_into;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// 설정 폴더 이름
pub const SETTINGS_DIR_NAME: &str = ".erp";

/// 코어 버전 기본값
pub const DEFAULT_CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// CoreSettings
// ============================================================================

/// 플러그인 시스템 실행 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoreSettings {
    /// 실행 중인 코어 버전 (플러그인 `coreVersion` 범위 검사 대상)
    pub core_version: String,

    /// 기본 로케일
    pub default_locale: String,

    /// 번역이 없을 때 찾아볼 로케일
    pub fallback_locale: String,

    /// 플러그인 하나를 로드하는 데 허용되는 시간 (ms)
    pub load_timeout_ms: u64,

    /// 의존성이 없는 플러그인을 동시에 로드
    pub parallel_load: bool,

    /// 이벤트 핸들러 안에서 중첩 emit 가능한 깊이
    pub max_event_depth: usize,

    /// 이벤트 히스토리 보관 개수
    pub event_history: usize,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            core_version: DEFAULT_CORE_VERSION.to_string(),
            default_locale: "en".to_string(),
            fallback_locale: "en".to_string(),
            load_timeout_ms: 10_000,
            parallel_load: true,
            max_event_depth: 8,
            event_history: 100,
        }
    }
}

impl CoreSettings {
    /// 기본 설정에 코어 버전만 지정
    pub fn with_core_version(version: impl Into<String>) -> Self {
        Self {
            core_version: version.into(),
            ..Default::default()
        }
    }

    /// 로드 타임아웃
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    /// 값 범위 검사
    pub fn validate(&self) -> Result<()> {
        if self.core_version.trim().is_empty() {
            return Err(Error::Config("coreVersion must not be empty".into()));
        }
        if self.load_timeout_ms == 0 {
            return Err(Error::Config("loadTimeoutMs must be greater than 0".into()));
        }
        if self.max_event_depth == 0 {
            return Err(Error::Config("maxEventDepth must be greater than 0".into()));
        }
        Ok(())
    }
}

// ============================================================================
// SettingsLoader
// ============================================================================

/// 설정 파일 경로 정보
#[derive(Debug, Clone)]
struct SettingsPath {
    path: PathBuf,
    /// 우선순위 (높을수록 우선)
    priority: u8,
    description: &'static str,
}

/// 레이어드 설정 로더
pub struct SettingsLoader {
    search_paths: Vec<SettingsPath>,
    use_env: bool,
}

impl SettingsLoader {
    /// 새 로더 생성 (기본 검색 경로)
    pub fn new(working_dir: &Path) -> Self {
        let mut paths = Vec::new();

        if let Some(home) = dirs::home_dir() {
            paths.push(SettingsPath {
                path: home.join(SETTINGS_DIR_NAME).join("settings.toml"),
                priority: 10,
                description: "User settings",
            });
        }

        paths.push(SettingsPath {
            path: working_dir.join(SETTINGS_DIR_NAME).join("settings.toml"),
            priority: 20,
            description: "Project settings",
        });

        paths.push(SettingsPath {
            path: working_dir.join(SETTINGS_DIR_NAME).join("settings.local.toml"),
            priority: 30,
            description: "Local settings",
        });

        paths.sort_by_key(|p| p.priority);

        Self {
            search_paths: paths,
            use_env: true,
        }
    }

    /// 커스텀 검색 경로로 생성 (환경 변수 미사용)
    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        let search_paths = paths
            .into_iter()
            .enumerate()
            .map(|(i, path)| SettingsPath {
                path,
                priority: i as u8,
                description: "Custom",
            })
            .collect();

        Self {
            search_paths,
            use_env: false,
        }
    }

    /// 검색 경로 추가
    pub fn add_path(&mut self, path: PathBuf, priority: u8) {
        self.search_paths.push(SettingsPath {
            path,
            priority,
            description: "Added",
        });
        self.search_paths.sort_by_key(|p| p.priority);
    }

    /// 모든 경로에서 로드하여 병합
    ///
    /// 읽을 수 없는 파일은 경고 후 건너뛰고, 병합 결과가 잘못되면 에러.
    pub fn load_all(&self) -> Result<CoreSettings> {
        let mut merged = serde_json::to_value(CoreSettings::default())?;

        for settings_path in &self.search_paths {
            if !settings_path.path.exists() {
                continue;
            }
            match read_document(&settings_path.path) {
                Ok(layer) => {
                    info!(
                        "Loaded {} from: {}",
                        settings_path.description,
                        settings_path.path.display()
                    );
                    deep_merge_into(&mut merged, layer);
                }
                Err(e) => {
                    warn!(
                        "Failed to load settings from {}: {}",
                        settings_path.path.display(),
                        e
                    );
                }
            }
        }

        if self.use_env {
            deep_merge_into(&mut merged, env_overrides());
        }

        let settings: CoreSettings = serde_json::from_value(merged)
            .map_err(|e| Error::Config(format!("Invalid settings: {}", e)))?;
        settings.validate()?;

        debug!(core_version = %settings.core_version, "Core settings resolved");
        Ok(settings)
    }

    /// 존재하는 설정 파일 목록
    pub fn existing_files(&self) -> Vec<PathBuf> {
        self.search_paths
            .iter()
            .filter(|p| p.path.exists())
            .map(|p| p.path.clone())
            .collect()
    }
}

/// 환경 변수 오버라이드
fn env_overrides() -> Value {
    let mut map = serde_json::Map::new();

    if let Ok(version) = std::env::var("ERP_CORE_VERSION") {
        map.insert("coreVersion".into(), Value::String(version));
    }
    if let Some(timeout) = std::env::var("ERP_LOAD_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
    {
        map.insert("loadTimeoutMs".into(), Value::from(timeout));
    }
    if let Some(parallel) = std::env::var("ERP_PARALLEL_LOAD")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
    {
        map.insert("parallelLoad".into(), Value::Bool(parallel));
    }

    Value::Object(map)
}

// ============================================================================
// 테스트
// ============================================================================
