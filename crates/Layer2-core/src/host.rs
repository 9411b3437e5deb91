//! Plugin Host - UI 계층이 소비하는 읽기 전용 어댑터
//!
//! 호스트는 매니저 하나를 소유하고, 라우터/사이드바/권한 시스템이 쓰는
//! 스냅샷과 플러그인 설정 조회를 제공합니다.

use crate::plugin::{DeploymentConfig, LoadedPlugin, MenuItem, Permission, PluginManager, Route, Widget};
use erp_foundation::event::names;
use erp_foundation::hook::names as hook_names;
use erp_foundation::{Event, Result, Subscription};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// 호스트가 한 번에 읽는 상태
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostSnapshot {
    pub initialized: bool,
    pub loading: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub routes: Vec<Route>,
    pub menu_items: Vec<MenuItem>,
    pub widgets: Vec<Widget>,
    pub permissions: Vec<Permission>,
}

/// 플러그인 호스트
#[derive(Clone)]
pub struct PluginHost {
    manager: Arc<PluginManager>,
}

impl PluginHost {
    pub fn new(manager: Arc<PluginManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<PluginManager> {
        &self.manager
    }

    /// 초기화 후 스냅샷
    pub async fn start(&self, deployment: DeploymentConfig) -> Result<HostSnapshot> {
        self.manager.initialize(deployment).await?;
        Ok(self.snapshot())
    }

    pub async fn reload(&self) -> Result<HostSnapshot> {
        self.manager.reload().await?;
        Ok(self.snapshot())
    }

    /// 현재 상태
    ///
    /// 라우트와 메뉴에는 `plugin:routes`, `plugin:menu-items` 필터가 적용됩니다.
    pub fn snapshot(&self) -> HostSnapshot {
        let capabilities = self.manager.capabilities();

        HostSnapshot {
            initialized: self.manager.is_initialized(),
            loading: self.manager.is_loading(),
            error: self.manager.last_error(),
            routes: self.filtered(hook_names::PLUGIN_ROUTES, capabilities.routes),
            menu_items: self.filtered(hook_names::PLUGIN_MENU_ITEMS, capabilities.menu_items),
            widgets: capabilities.widgets,
            permissions: capabilities.permissions,
        }
    }

    fn filtered<T>(&self, hook: &str, items: Vec<T>) -> Vec<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let hooks = self.manager.hooks();
        if !hooks.has(hook) {
            return items;
        }

        let value = match serde_json::to_value(&items) {
            Ok(value) => value,
            Err(e) => {
                warn!(hook, error = %e, "Failed to serialize items for filter");
                return items;
            }
        };

        match serde_json::from_value(hooks.apply_filter(hook, value, &[])) {
            Ok(filtered) => filtered,
            Err(e) => {
                warn!(hook, error = %e, "Filter produced an invalid list, using unfiltered items");
                items
            }
        }
    }

    /// 플러그인의 현재 설정
    pub fn plugin_config(&self, id: &str) -> Option<Value> {
        self.manager.get_config(id)
    }

    /// dotted path 로 설정 값 조회
    pub fn plugin_config_value(&self, id: &str, path: &str) -> Option<Value> {
        self.manager.configs().get_value(id, path)
    }

    pub fn plugin(&self, id: &str) -> Option<LoadedPlugin> {
        self.manager.get_plugin(id)
    }

    /// 활성화/비활성화/설정 변경 알림
    ///
    /// 반환된 구독은 호스트가 내려갈 때 해제해야 합니다.
    pub fn on_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.manager.bus().on(names::WILDCARD, move |event: &Event| {
            if matches!(
                event.name.as_str(),
                names::PLUGIN_ENABLED | names::PLUGIN_DISABLED | names::PLUGIN_CONFIG_CHANGED
            ) {
                callback(event);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{PluginEntry, PluginManifest, StaticCatalog, StaticModuleResolver};
    use erp_foundation::{ConfigSchema, CoreSettings};
    use parking_lot::Mutex;
    use serde_json::json;

    fn host() -> PluginHost {
        let catalog = StaticCatalog::new().with_manifest(
            "@erp/leave",
            PluginManifest::new("leave", "Leave", "1.0.0")
                .with_routes("routes")
                .with_config(
                    ConfigSchema::object().with_property("maxItems", ConfigSchema::integer_range(1, 1000)),
                    json!({ "maxItems": 10, "approval": { "levels": 2 } }),
                ),
        );
        let resolver = StaticModuleResolver::new().with_data(
            "leave",
            "routes",
            json!([
                { "path": "/leave", "component": "LeaveList" },
                { "path": "/leave/admin", "component": "LeaveAdmin" }
            ]),
        );

        let manager = PluginManager::new(
            CoreSettings::with_core_version("1.2.0"),
            Arc::new(catalog),
            Arc::new(resolver),
        )
        .unwrap();
        PluginHost::new(Arc::new(manager))
    }

    #[tokio::test]
    async fn test_snapshot_and_config_lookup() {
        let host = host();
        let snapshot = host
            .start(DeploymentConfig::new(vec![PluginEntry::new("@erp/leave")]))
            .await
            .unwrap();

        assert!(snapshot.initialized);
        assert!(!snapshot.loading);
        assert_eq!(snapshot.routes.len(), 2);
        assert_eq!(host.plugin_config_value("leave", "approval.levels"), Some(json!(2)));
        assert_eq!(host.plugin("leave").unwrap().id, "leave");
    }

    #[tokio::test]
    async fn test_route_filter_applies() {
        let host = host();
        host.start(DeploymentConfig::new(vec![PluginEntry::new("@erp/leave")]))
            .await
            .unwrap();

        let _filter = host.manager().hooks().register(hook_names::PLUGIN_ROUTES, 0, |value, _| {
            let routes = value
                .as_array()
                .map(|routes| {
                    routes
                        .iter()
                        .filter(|r| !r["path"].as_str().unwrap_or("").ends_with("/admin"))
                        .cloned()
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            Ok(Value::Array(routes))
        });

        let snapshot = host.snapshot();
        assert_eq!(snapshot.routes.len(), 1);
        assert_eq!(snapshot.routes[0].path, "/leave");
        assert_eq!(host.manager().get_routes().len(), 2);
    }

    #[tokio::test]
    async fn test_broken_filter_falls_back() {
        let host = host();
        host.start(DeploymentConfig::new(vec![PluginEntry::new("@erp/leave")]))
            .await
            .unwrap();

        let _filter = host
            .manager()
            .hooks()
            .register(hook_names::PLUGIN_ROUTES, 0, |_, _| Ok(json!("not a list")));

        assert_eq!(host.snapshot().routes.len(), 2);
    }

    #[tokio::test]
    async fn test_on_change_sees_toggle_and_config() {
        let host = host();
        host.start(DeploymentConfig::new(vec![PluginEntry::new("@erp/leave")]))
            .await
            .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let subscription = host.on_change(move |event| sink.lock().push(event.name.clone()));

        host.manager().disable("leave").await.unwrap();
        host.manager().enable("leave").await.unwrap();
        host.manager()
            .update_config("leave", &json!({ "maxItems": 20 }))
            .await
            .unwrap();

        assert_eq!(
            *seen.lock(),
            vec![names::PLUGIN_DISABLED, names::PLUGIN_ENABLED, names::PLUGIN_CONFIG_CHANGED]
        );
        assert!(subscription.unsubscribe());
    }
}
