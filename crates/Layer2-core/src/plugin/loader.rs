//! Plugin Loader - 선언된 기능 모듈을 해석해 LoadedPlugin 으로 정규화
//!
//! 로더는 절대 에러를 전파하지 않습니다. 모듈 하나라도 실패하면
//! `status = error` 와 빈 기능 목록을 가진 레코드를 돌려줍니다.

use super::manifest::{ModuleRef, PluginManifest};
use super::module::ModuleResolver;
use super::types::{
    LoadStage, LoadedPlugin, MenuItem, Permission, PluginFailure, PluginStatus, Route, Widget,
};
use chrono::Utc;
use erp_foundation::event::EventHandler;
use erp_foundation::{Error, Result};
use futures::future::{try_join4, try_join_all};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

// ============================================================================
// LoadOutcome
// ============================================================================

/// 매니페스트 `events.listens` 에서 해석된 핸들러
#[derive(Clone)]
pub struct ListenerBinding {
    pub event: String,
    pub handler: EventHandler,
}

impl fmt::Debug for ListenerBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerBinding")
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

/// 로드 결과
#[derive(Debug)]
pub struct LoadOutcome {
    pub plugin: LoadedPlugin,

    /// 구독은 매니저가 담당 (로드 실패 시 비어 있음)
    pub listeners: Vec<ListenerBinding>,
}

impl LoadOutcome {
    pub fn is_loaded(&self) -> bool {
        self.plugin.status == PluginStatus::Loaded
    }
}

struct Capabilities {
    routes: Vec<Route>,
    menu_items: Vec<MenuItem>,
    widgets: Vec<Widget>,
    listeners: Vec<ListenerBinding>,
}

// ============================================================================
// PluginLoader
// ============================================================================

/// 플러그인 로더
pub struct PluginLoader {
    resolver: Arc<dyn ModuleResolver>,
    timeout: Duration,
}

impl PluginLoader {
    pub fn new(resolver: Arc<dyn ModuleResolver>, timeout: Duration) -> Self {
        Self { resolver, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 플러그인 기능 로드
    ///
    /// 기능 모듈은 동시에 해석하며 전체가 `timeout` 안에 끝나야 합니다.
    pub async fn load(&self, manifest: &PluginManifest, merged_config: &Value) -> LoadOutcome {
        let plugin_id = manifest.id.as_str();
        let mut plugin = LoadedPlugin::new(manifest.clone(), plugin_id);
        plugin.config = merged_config.clone();
        plugin.status = PluginStatus::Loading;

        debug!(plugin_id, "Loading plugin capabilities");

        let result = tokio::time::timeout(self.timeout, self.load_capabilities(manifest)).await;

        let capabilities = match result {
            Ok(Ok(capabilities)) => capabilities,
            Ok(Err(e)) => {
                warn!(plugin_id, error = %e, "Plugin failed to load");
                plugin.fail(PluginStatus::Error, PluginFailure::new(LoadStage::Load, e.to_string()));
                return LoadOutcome {
                    plugin,
                    listeners: Vec::new(),
                };
            }
            Err(_) => {
                let message = format!("timed out after {}ms", self.timeout.as_millis());
                warn!(plugin_id, "Plugin load {}", message);
                plugin.fail(PluginStatus::Error, PluginFailure::new(LoadStage::Load, message));
                return LoadOutcome {
                    plugin,
                    listeners: Vec::new(),
                };
            }
        };

        plugin.routes = capabilities.routes;
        plugin.menu_items = capabilities.menu_items;
        plugin.widgets = capabilities.widgets;
        plugin.permissions = permissions(manifest);
        plugin.status = PluginStatus::Loaded;
        plugin.loaded_at = Some(Utc::now());

        info!(
            plugin_id,
            routes = plugin.routes.len(),
            menu_items = plugin.menu_items.len(),
            widgets = plugin.widgets.len(),
            permissions = plugin.permissions.len(),
            "Plugin loaded"
        );

        LoadOutcome {
            plugin,
            listeners: capabilities.listeners,
        }
    }

    async fn load_capabilities(&self, manifest: &PluginManifest) -> Result<Capabilities> {
        let plugin_id = manifest.id.as_str();
        let frontend = manifest.frontend.clone().unwrap_or_default();

        let (mut routes, mut menu_items, mut widgets, listeners) = try_join4(
            self.load_items::<Route>(plugin_id, frontend.routes.as_ref(), "routes"),
            self.load_items::<MenuItem>(plugin_id, frontend.menu.as_ref(), "menu"),
            self.load_items::<Widget>(plugin_id, frontend.widgets.as_ref(), "widgets"),
            self.load_listeners(manifest),
        )
        .await?;

        for route in &mut routes {
            route.plugin_id = plugin_id.to_string();
            if !route.path.starts_with('/') {
                route.path.insert(0, '/');
            }
        }
        for item in &mut menu_items {
            item.plugin_id = plugin_id.to_string();
        }
        for widget in &mut widgets {
            widget.plugin_id = plugin_id.to_string();
        }

        Ok(Capabilities {
            routes,
            menu_items,
            widgets,
            listeners,
        })
    }

    /// 데이터 모듈 하나를 배열로 읽음 (선언이 없으면 빈 목록)
    async fn load_items<T: DeserializeOwned>(
        &self,
        plugin_id: &str,
        reference: Option<&ModuleRef>,
        kind: &str,
    ) -> Result<Vec<T>> {
        let Some(reference) = reference else {
            return Ok(Vec::new());
        };

        let data = self
            .resolver
            .resolve(plugin_id, reference)
            .await?
            .into_data()
            .ok_or_else(|| Error::load(plugin_id, format!("{} module '{}' is not data", kind, reference)))?;

        if !data.is_array() {
            return Err(Error::load(
                plugin_id,
                format!("{} module '{}' must be an array", kind, reference),
            ));
        }

        serde_json::from_value(data)
            .map_err(|e| Error::load(plugin_id, format!("invalid {} module '{}': {}", kind, reference, e)))
    }

    async fn load_listeners(&self, manifest: &PluginManifest) -> Result<Vec<ListenerBinding>> {
        let plugin_id = manifest.id.as_str();

        try_join_all(manifest.events.listens.iter().map(|decl| async move {
            let handler = self
                .resolver
                .resolve(plugin_id, &decl.handler)
                .await?
                .into_handler()
                .ok_or_else(|| {
                    Error::load(
                        plugin_id,
                        format!("listener module '{}' is not an event handler", decl.handler),
                    )
                })?;
            Ok::<_, Error>(ListenerBinding {
                event: decl.event.clone(),
                handler,
            })
        }))
        .await
    }
}

/// 매니페스트 권한 선언 → 권한 (기본 역할 포함)
fn permissions(manifest: &PluginManifest) -> Vec<Permission> {
    manifest
        .permissions
        .iter()
        .map(|def| Permission {
            code: def.code.clone(),
            name: def.name.clone(),
            description: def.description.clone(),
            roles: def.default_roles.clone(),
            plugin_id: manifest.id.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::manifest::PermissionDef;
    use crate::plugin::module::StaticModuleResolver;
    use serde_json::json;

    fn loader(resolver: StaticModuleResolver) -> PluginLoader {
        PluginLoader::new(Arc::new(resolver), Duration::from_millis(200))
    }

    fn manifest() -> PluginManifest {
        PluginManifest::new("leave", "Leave", "1.0.0")
            .with_routes("routes")
            .with_menu("menu")
            .with_permission(PermissionDef::new("leave.approve", "Approve leave").with_roles(["manager"]))
    }

    #[tokio::test]
    async fn test_load_normalizes_capabilities() {
        let resolver = StaticModuleResolver::new()
            .with_data(
                "leave",
                "routes",
                json!([
                    { "path": "leave", "component": "LeaveList", "permission": "leave.view" },
                    { "path": "/leave/:id", "component": "LeaveDetail" }
                ]),
            )
            .with_data("leave", "menu", json!([{ "id": "leave", "label": "Leave", "order": 30 }]));

        let outcome = loader(resolver).load(&manifest(), &json!({ "maxDays": 20 })).await;
        let plugin = outcome.plugin;

        assert_eq!(plugin.status, PluginStatus::Loaded);
        assert!(plugin.loaded_at.is_some());
        assert_eq!(plugin.config, json!({ "maxDays": 20 }));
        assert_eq!(plugin.routes[0].path, "/leave");
        assert_eq!(plugin.routes[0].required_permission.as_deref(), Some("leave.view"));
        assert!(plugin.routes.iter().all(|r| r.plugin_id == "leave"));
        assert_eq!(plugin.menu_items[0].plugin_id, "leave");
        assert!(plugin.widgets.is_empty());
        assert_eq!(plugin.permissions[0].roles, vec!["manager"]);
    }

    #[tokio::test]
    async fn test_failing_module_marks_error() {
        let resolver = StaticModuleResolver::new()
            .with_data("leave", "menu", json!([{ "id": "leave", "label": "Leave" }]));
        resolver.insert_failure("leave", "routes", "import exploded");

        let outcome = loader(resolver).load(&manifest(), &json!({})).await;
        let plugin = outcome.plugin;

        assert_eq!(plugin.status, PluginStatus::Error);
        let failure = plugin.error.unwrap();
        assert_eq!(failure.stage, LoadStage::Load);
        assert!(failure.message.contains("import exploded"));
        assert!(plugin.routes.is_empty());
        assert!(plugin.menu_items.is_empty());
        assert!(plugin.permissions.is_empty());
    }

    #[tokio::test]
    async fn test_non_array_module_is_error() {
        let resolver = StaticModuleResolver::new()
            .with_data("leave", "routes", json!({ "path": "/leave" }))
            .with_data("leave", "menu", json!([]));

        let outcome = loader(resolver).load(&manifest(), &json!({})).await;
        assert!(outcome.plugin.error.unwrap().message.contains("must be an array"));
    }

    #[tokio::test]
    async fn test_stalled_module_times_out() {
        let resolver = StaticModuleResolver::new().with_data("leave", "menu", json!([]));
        resolver.insert_stall("leave", "routes");

        let outcome = loader(resolver).load(&manifest(), &json!({})).await;
        assert_eq!(outcome.plugin.status, PluginStatus::Error);
        assert_eq!(outcome.plugin.error.unwrap().message, "timed out after 200ms");
    }

    #[tokio::test]
    async fn test_listener_must_be_handler() {
        let manifest = PluginManifest::new("leave", "Leave", "1.0.0")
            .with_listener("employee:created", "on-employee")
            .with_listener("employee:removed", "not-a-handler");

        let resolver = StaticModuleResolver::new()
            .with_data("leave", "not-a-handler", json!({}));
        resolver.insert_handler("leave", "on-employee", |_| Ok(()));

        let outcome = loader(resolver).load(&manifest, &json!({})).await;
        assert_eq!(outcome.plugin.status, PluginStatus::Error);
        assert!(outcome.listeners.is_empty());
    }

    #[tokio::test]
    async fn test_listeners_resolved() {
        let manifest =
            PluginManifest::new("leave", "Leave", "1.0.0").with_listener("employee:created", "on-employee");

        let resolver = StaticModuleResolver::new();
        resolver.insert_handler("leave", "on-employee", |_| Ok(()));

        let outcome = loader(resolver).load(&manifest, &json!({})).await;
        assert!(outcome.is_loaded());
        assert_eq!(outcome.listeners.len(), 1);
        assert_eq!(outcome.listeners[0].event, "employee:created");
    }
}
