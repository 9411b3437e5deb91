//! Plugin Manifest - 플러그인 메타데이터 정의
//!
//! 매니페스트는 순수 데이터입니다. 실제 모듈(routes, 번역, 이벤트 핸들러)은
//! `ModuleRef` 로만 참조되며 `ModuleResolver` 가 로드 시점에 해석합니다.

use erp_foundation::schema::ConfigSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// ModuleRef
// ============================================================================

/// 지연 로드되는 모듈 참조 (예: `"frontend/routes.json"`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleRef(String);

impl ModuleRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleRef {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// ============================================================================
// 분류 / 의존성
// ============================================================================

/// 플러그인 카테고리
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginCategory {
    Hr,
    Finance,
    Inventory,
    Sales,
    Operations,
    Reporting,
    Integration,
    Utility,
    #[default]
    Other,
}

/// 플러그인 의존성
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDependency {
    /// 의존하는 플러그인 ID
    pub id: String,

    /// 요구 버전 범위 (npm 스타일, 예: "^1.2.0")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// 선택적 의존성 여부 (있을 때만 순서 제약)
    #[serde(default)]
    pub optional: bool,
}

impl PluginDependency {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: None,
            optional: false,
        }
    }

    pub fn with_version(mut self, range: impl Into<String>) -> Self {
        self.version = Some(range.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

// ============================================================================
// 기능 선언
// ============================================================================

/// 설정 선언 (스키마 + 기본값)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigDescriptor {
    #[serde(default)]
    pub schema: ConfigSchema,

    #[serde(default = "empty_object")]
    pub defaults: Value,
}

impl Default for ConfigDescriptor {
    fn default() -> Self {
        Self {
            schema: ConfigSchema::any(),
            defaults: empty_object(),
        }
    }
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// 프론트엔드 기능 (지연 로드)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontendDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routes: Option<ModuleRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu: Option<ModuleRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widgets: Option<ModuleRef>,
}

/// 백엔드 함수 설명
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendFunction {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default = "default_method")]
    pub method: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
}

fn default_method() -> String {
    "POST".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendDescriptor {
    #[serde(default)]
    pub functions: Vec<BackendFunction>,
}

/// 마이그레이션 / 시드 참조
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseDescriptor {
    #[serde(default)]
    pub migrations: Vec<ModuleRef>,

    #[serde(default)]
    pub seeds: Vec<ModuleRef>,
}

/// 권한 선언
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionDef {
    pub code: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub default_roles: Vec<String>,
}

impl PermissionDef {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            description: None,
            default_roles: Vec::new(),
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_roles = roles.into_iter().map(Into::into).collect();
        self
    }
}

/// 이벤트 구독 선언
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventListenerDecl {
    pub event: String,
    pub handler: ModuleRef,
}

/// 이벤트 선언 (발행 / 구독)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventsDescriptor {
    #[serde(default)]
    pub emits: Vec<String>,

    #[serde(default)]
    pub listens: Vec<EventListenerDecl>,
}

/// 패키지가 구현하는 라이프사이클 훅
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleHook {
    OnInstall,
    OnEnable,
    OnDisable,
    OnUninstall,
    OnConfigChange,
    BeforeStart,
    AfterStart,
    HealthCheck,
}

// ============================================================================
// PluginManifest
// ============================================================================

/// 플러그인 매니페스트 - 플러그인의 모든 메타데이터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    /// 고유 플러그인 ID (예: "leave-management")
    pub id: String,

    /// 표시 이름
    pub name: String,

    /// 버전 (semver)
    pub version: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default)]
    pub category: PluginCategory,

    #[serde(default)]
    pub tags: Vec<String>,

    /// 호환되는 코어 버전 범위
    #[serde(default = "any_version")]
    pub core_version: String,

    #[serde(default)]
    pub dependencies: Vec<PluginDependency>,

    #[serde(default)]
    pub config: ConfigDescriptor,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontend: Option<FrontendDescriptor>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendDescriptor>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseDescriptor>,

    #[serde(default)]
    pub permissions: Vec<PermissionDef>,

    /// locale → namespace → 번역 모듈
    #[serde(default)]
    pub translations: BTreeMap<String, BTreeMap<String, ModuleRef>>,

    #[serde(default)]
    pub events: EventsDescriptor,

    #[serde(default)]
    pub lifecycle: Vec<LifecycleHook>,
}

fn any_version() -> String {
    "*".to_string()
}

impl PluginManifest {
    /// 새 매니페스트 생성
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            description: String::new(),
            author: None,
            category: PluginCategory::default(),
            tags: Vec::new(),
            core_version: any_version(),
            dependencies: Vec::new(),
            config: ConfigDescriptor::default(),
            frontend: None,
            backend: None,
            database: None,
            permissions: Vec::new(),
            translations: BTreeMap::new(),
            events: EventsDescriptor::default(),
            lifecycle: Vec::new(),
        }
    }

    /// 카탈로그에서 찾지 못한 패키지의 자리표시 매니페스트
    pub fn unresolved(id: impl Into<String>, package: impl Into<String>) -> Self {
        Self::new(id, package, "0.0.0")
    }

    /// 빌더 패턴: 코어 버전 범위
    pub fn with_core_version(mut self, range: impl Into<String>) -> Self {
        self.core_version = range.into();
        self
    }

    /// 빌더 패턴: 의존성 추가
    pub fn with_dependency(mut self, dep: PluginDependency) -> Self {
        self.dependencies.push(dep);
        self
    }

    /// 빌더 패턴: 설정 스키마 + 기본값
    pub fn with_config(mut self, schema: ConfigSchema, defaults: Value) -> Self {
        self.config = ConfigDescriptor { schema, defaults };
        self
    }

    /// 빌더 패턴: 라우트 모듈
    pub fn with_routes(mut self, reference: impl Into<ModuleRef>) -> Self {
        self.frontend.get_or_insert_with(Default::default).routes = Some(reference.into());
        self
    }

    /// 빌더 패턴: 메뉴 모듈
    pub fn with_menu(mut self, reference: impl Into<ModuleRef>) -> Self {
        self.frontend.get_or_insert_with(Default::default).menu = Some(reference.into());
        self
    }

    /// 빌더 패턴: 위젯 모듈
    pub fn with_widgets(mut self, reference: impl Into<ModuleRef>) -> Self {
        self.frontend.get_or_insert_with(Default::default).widgets = Some(reference.into());
        self
    }

    /// 빌더 패턴: 권한 추가
    pub fn with_permission(mut self, permission: PermissionDef) -> Self {
        self.permissions.push(permission);
        self
    }

    /// 빌더 패턴: 번역 모듈 추가
    pub fn with_translation(
        mut self,
        locale: impl Into<String>,
        namespace: impl Into<String>,
        reference: impl Into<ModuleRef>,
    ) -> Self {
        self.translations
            .entry(locale.into())
            .or_default()
            .insert(namespace.into(), reference.into());
        self
    }

    /// 빌더 패턴: 이벤트 구독 추가
    pub fn with_listener(mut self, event: impl Into<String>, handler: impl Into<ModuleRef>) -> Self {
        self.events.listens.push(EventListenerDecl {
            event: event.into(),
            handler: handler.into(),
        });
        self
    }

    /// 반드시 필요한 의존성 ID 목록
    pub fn required_dependencies(&self) -> impl Iterator<Item = &str> {
        self.dependencies
            .iter()
            .filter(|d| !d.optional)
            .map(|d| d.id.as_str())
    }

    /// 해당 라이프사이클 훅을 선언했는지
    pub fn declares(&self, hook: LifecycleHook) -> bool {
        self.lifecycle.contains(&hook)
    }

    /// 선언된 모든 모듈 참조 (검증용)
    pub fn module_refs(&self) -> Vec<(&'static str, &ModuleRef)> {
        let mut refs = Vec::new();

        if let Some(frontend) = &self.frontend {
            if let Some(r) = &frontend.routes {
                refs.push(("frontend.routes", r));
            }
            if let Some(r) = &frontend.menu {
                refs.push(("frontend.menu", r));
            }
            if let Some(r) = &frontend.widgets {
                refs.push(("frontend.widgets", r));
            }
        }
        for namespaces in self.translations.values() {
            for r in namespaces.values() {
                refs.push(("translations", r));
            }
        }
        for listener in &self.events.listens {
            refs.push(("events.listens", &listener.handler));
        }
        if let Some(db) = &self.database {
            refs.extend(db.migrations.iter().map(|r| ("database.migrations", r)));
            refs.extend(db.seeds.iter().map(|r| ("database.seeds", r)));
        }

        refs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_minimal_manifest() {
        let manifest: PluginManifest = serde_json::from_value(json!({
            "id": "leave",
            "name": "Leave Management",
            "version": "1.0.0"
        }))
        .unwrap();

        assert_eq!(manifest.core_version, "*");
        assert_eq!(manifest.category, PluginCategory::Other);
        assert!(manifest.config.defaults.is_object());
        assert!(manifest.frontend.is_none());
    }

    #[test]
    fn test_parse_full_manifest() {
        let manifest: PluginManifest = serde_json::from_value(json!({
            "id": "leave",
            "name": "Leave Management",
            "version": "1.2.0",
            "category": "hr",
            "coreVersion": ">=1.0.0",
            "dependencies": [{ "id": "employees", "version": "^1.0.0" }],
            "config": {
                "schema": { "type": "object", "properties": { "maxDays": { "type": "integer" } } },
                "defaults": { "maxDays": 20 }
            },
            "frontend": { "routes": "frontend/routes.json" },
            "permissions": [{ "code": "leave.approve", "name": "Approve", "defaultRoles": ["manager"] }],
            "translations": { "en": { "leave": "locales/en.json" } },
            "events": { "emits": ["leave:approved"], "listens": [{ "event": "employee:created", "handler": "handlers/created" }] },
            "lifecycle": ["onEnable", "healthCheck"]
        }))
        .unwrap();

        assert_eq!(manifest.category, PluginCategory::Hr);
        assert_eq!(manifest.required_dependencies().collect::<Vec<_>>(), vec!["employees"]);
        assert_eq!(manifest.permissions[0].default_roles, vec!["manager"]);
        assert!(manifest.declares(LifecycleHook::HealthCheck));
        assert_eq!(manifest.module_refs().len(), 3);
    }

    #[test]
    fn test_builder() {
        let manifest = PluginManifest::new("hr", "HR", "1.0.0")
            .with_core_version("^1.0.0")
            .with_dependency(PluginDependency::new("core-data").optional())
            .with_routes("routes")
            .with_menu("menu");

        let frontend = manifest.frontend.as_ref().unwrap();
        assert_eq!(frontend.routes.as_ref().unwrap().as_str(), "routes");
        assert_eq!(frontend.menu.as_ref().unwrap().as_str(), "menu");
        assert_eq!(manifest.required_dependencies().count(), 0);
    }
}
