//! Plugin runtime types - 상태, 실패 기록, 집계 항목, LoadedPlugin

use super::manifest::PluginManifest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// ============================================================================
// PluginStatus
// ============================================================================

/// 플러그인 상태
///
/// `pending → validating → (rejected | resolving) → (error | loading)
///  → (error | loaded) → (enabled ↔ disabled)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginStatus {
    Pending,
    Validating,
    Rejected,
    Resolving,
    Loading,
    Loaded,
    Enabled,
    Disabled,
    Error,
}

impl PluginStatus {
    /// 로드가 끝나 활성/비활성 전환이 가능한 상태
    pub fn is_operational(&self) -> bool {
        matches!(self, Self::Loaded | Self::Enabled | Self::Disabled)
    }

    /// 실패로 끝난 상태
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Rejected | Self::Error)
    }
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Validating => "validating",
            Self::Rejected => "rejected",
            Self::Resolving => "resolving",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// 실패가 발생한 파이프라인 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStage {
    Catalog,
    Validate,
    Resolve,
    Load,
    Localize,
    Configure,
    Lifecycle,
}

impl fmt::Display for LoadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Catalog => "catalog",
            Self::Validate => "validate",
            Self::Resolve => "resolve",
            Self::Load => "load",
            Self::Localize => "localize",
            Self::Configure => "configure",
            Self::Lifecycle => "lifecycle",
        };
        f.write_str(s)
    }
}

/// 관리 화면에 노출되는 실패 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginFailure {
    pub stage: LoadStage,
    pub message: String,
}

impl PluginFailure {
    pub fn new(stage: LoadStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

impl fmt::Display for PluginFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stage, self.message)
    }
}

// ============================================================================
// 집계 항목
// ============================================================================

/// 라우트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub path: String,

    pub component: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, alias = "permission", skip_serializing_if = "Option::is_none")]
    pub required_permission: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,

    /// 소유 플러그인 (로더가 채움)
    #[serde(default)]
    pub plugin_id: String,
}

/// 사이드바 메뉴 항목
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: String,

    pub label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default)]
    pub order: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    #[serde(default, alias = "permission", skip_serializing_if = "Option::is_none")]
    pub required_permission: Option<String>,

    #[serde(default)]
    pub plugin_id: String,
}

/// 대시보드 위젯
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Widget {
    pub id: String,

    pub component: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    #[serde(default)]
    pub order: i64,

    #[serde(default)]
    pub plugin_id: String,
}

/// 권한 (역할 매핑 병합 후)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub code: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub roles: Vec<String>,

    #[serde(default)]
    pub plugin_id: String,
}

impl Permission {
    /// 역할 추가 (중복 제외, 순서 유지)
    pub fn merge_roles<'a>(&mut self, roles: impl IntoIterator<Item = &'a String>) {
        for role in roles {
            if !self.roles.contains(role) {
                self.roles.push(role.clone());
            }
        }
    }
}

// ============================================================================
// LoadedPlugin
// ============================================================================

/// 런타임 플러그인 레코드
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedPlugin {
    pub id: String,

    /// 배포 설정의 패키지 식별자
    pub package: String,

    pub manifest: PluginManifest,

    /// 배포 설정상 활성화 요청 여부
    pub enabled: bool,

    pub status: PluginStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<PluginFailure>,

    /// 치명적이지 않은 경고 (번역 누락, 설정 폴백 등)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    /// 현재 설정
    pub config: Value,

    pub routes: Vec<Route>,
    pub menu_items: Vec<MenuItem>,
    pub widgets: Vec<Widget>,
    pub permissions: Vec<Permission>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded_at: Option<DateTime<Utc>>,
}

impl LoadedPlugin {
    /// 대기 상태 레코드 생성
    pub fn new(manifest: PluginManifest, package: impl Into<String>) -> Self {
        Self {
            id: manifest.id.clone(),
            package: package.into(),
            config: manifest.config.defaults.clone(),
            manifest,
            enabled: true,
            status: PluginStatus::Pending,
            error: None,
            warnings: Vec::new(),
            routes: Vec::new(),
            menu_items: Vec::new(),
            widgets: Vec::new(),
            permissions: Vec::new(),
            loaded_at: None,
        }
    }

    /// 실패 처리 (기여 항목 비움)
    pub fn fail(&mut self, status: PluginStatus, failure: PluginFailure) {
        self.status = status;
        self.error = Some(failure);
        self.clear_capabilities();
    }

    /// 로더 결과 반영
    pub fn apply_load(&mut self, loaded: LoadedPlugin) {
        self.status = loaded.status;
        self.error = loaded.error;
        self.config = loaded.config;
        self.routes = loaded.routes;
        self.menu_items = loaded.menu_items;
        self.widgets = loaded.widgets;
        self.permissions = loaded.permissions;
        self.loaded_at = loaded.loaded_at;
        self.warnings.extend(loaded.warnings);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn is_enabled(&self) -> bool {
        self.status == PluginStatus::Enabled
    }

    fn clear_capabilities(&mut self) {
        self.routes.clear();
        self.menu_items.clear();
        self.widgets.clear();
        self.permissions.clear();
    }
}

// ============================================================================
// PluginSummary
// ============================================================================

/// 상태별 플러그인 수
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PluginSummary {
    pub total: usize,
    pub enabled: usize,
    pub disabled: usize,
    pub loaded: usize,
    pub rejected: usize,
    pub error: usize,
    pub pending: usize,
}

impl PluginSummary {
    pub fn from_plugins<'a>(plugins: impl IntoIterator<Item = &'a LoadedPlugin>) -> Self {
        let mut summary = Self::default();
        for plugin in plugins {
            summary.total += 1;
            match plugin.status {
                PluginStatus::Enabled => summary.enabled += 1,
                PluginStatus::Disabled => summary.disabled += 1,
                PluginStatus::Loaded => summary.loaded += 1,
                PluginStatus::Rejected => summary.rejected += 1,
                PluginStatus::Error => summary.error += 1,
                PluginStatus::Pending
                | PluginStatus::Validating
                | PluginStatus::Resolving
                | PluginStatus::Loading => summary.pending += 1,
            }
        }
        summary
    }
}
