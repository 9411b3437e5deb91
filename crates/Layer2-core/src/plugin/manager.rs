//! Plugin Manager - 플러그인 파이프라인 오케스트레이션
//!
//! ## 초기화 순서
//!
//! 1. 카탈로그에서 패키지 조회 후 레지스트리 등록
//! 2. 매니페스트 검증 (실패 시 `rejected`)
//! 3. 의존성 해석 (실패한 플러그인만 `error`)
//! 4. 의존성 단계별 로드 → 번역 → 설정
//! 5. 활성화 (`on_enable`), `after_start`
//! 6. 기여 항목 집계, `plugins:initialized` 훅/이벤트
//!
//! 플러그인 하나의 실패는 그 플러그인의 상태로만 남습니다. `initialize`
//! 가 에러를 반환하는 경우는 배포 설정 자체가 잘못됐을 때뿐입니다.

use super::deployment::{DeploymentConfig, PluginEntry, UiPlacement};
use super::discovery::PluginCatalog;
use super::loader::{ListenerBinding, PluginLoader};
use super::manifest::PluginManifest;
use super::module::ModuleResolver;
use super::registry::PluginRegistry;
use super::resolver::{levels, resolve_partial};
use super::traits::{HealthStatus, PluginContext, PluginLifecycle};
use super::types::{
    LoadStage, LoadedPlugin, MenuItem, Permission, PluginFailure, PluginStatus, PluginSummary,
    Route, Widget,
};
use super::validator::PluginValidator;
use crate::config::ConfigManager;
use crate::i18n::{LocalizationManager, TranslationStore};
use erp_foundation::event::names;
use erp_foundation::hook::names as hook_names;
use erp_foundation::{
    CoreSettings, DependencyError, Error, EventBus, EventBusConfig, HookRegistry, Result,
    Subscription,
};
use futures::future::join_all;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

// ============================================================================
// AggregatedCapabilities
// ============================================================================

/// 활성 플러그인의 기여 항목 (로드 순서, 충돌 시 먼저 온 쪽 우선)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedCapabilities {
    pub routes: Vec<Route>,
    pub menu_items: Vec<MenuItem>,
    pub widgets: Vec<Widget>,
    pub permissions: Vec<Permission>,
}

#[derive(Default)]
struct ManagerState {
    deployment: Option<DeploymentConfig>,
    initialized: bool,
    loading: bool,
    error: Option<String>,
    /// 해석된 순서 (집계 기준)
    order: Vec<String>,
    /// 실제 로드가 시작된 순서
    load_sequence: Vec<String>,
    bindings: HashMap<String, Vec<ListenerBinding>>,
    subscriptions: HashMap<String, Vec<Subscription>>,
    lifecycles: HashMap<String, Arc<dyn PluginLifecycle>>,
    aggregate: AggregatedCapabilities,
}

// ============================================================================
// PluginManager
// ============================================================================

/// 플러그인 매니저 - 전체 플러그인 시스템 관리
///
/// 호스트가 하나를 만들어 소유합니다. 상태 변경 연산은 `ops` 로 직렬화되며
/// 사용자 콜백이나 `.await` 동안 내부 락을 잡지 않습니다.
pub struct PluginManager {
    settings: CoreSettings,
    catalog: Arc<dyn PluginCatalog>,
    validator: PluginValidator,
    registry: PluginRegistry,
    loader: PluginLoader,
    localization: LocalizationManager,
    configs: ConfigManager,
    bus: EventBus,
    hooks: HookRegistry,
    state: RwLock<ManagerState>,
    ops: tokio::sync::Mutex<()>,
}

impl PluginManager {
    /// 새 매니저 생성 (코어 설정이 잘못되면 에러)
    pub fn new(
        settings: CoreSettings,
        catalog: Arc<dyn PluginCatalog>,
        resolver: Arc<dyn ModuleResolver>,
    ) -> Result<Self> {
        settings.validate()?;
        let validator = PluginValidator::new(&settings.core_version)?;

        let bus = EventBus::with_config(EventBusConfig {
            history_size: settings.event_history,
            max_depth: settings.max_event_depth,
            debug_mode: false,
        });
        let translations = TranslationStore::new(settings.fallback_locale.clone());

        Ok(Self {
            loader: PluginLoader::new(resolver.clone(), settings.load_timeout()),
            localization: LocalizationManager::new(resolver, translations)
                .with_timeout(settings.load_timeout()),
            validator,
            registry: PluginRegistry::new(),
            configs: ConfigManager::new(),
            bus,
            hooks: HookRegistry::new(),
            catalog,
            settings,
            state: RwLock::new(ManagerState::default()),
            ops: tokio::sync::Mutex::new(()),
        })
    }

    // ========================================================================
    // 초기화 / 리로드
    // ========================================================================

    /// 배포 설정으로 전체 초기화
    ///
    /// 이미 초기화된 상태면 먼저 모두 정리합니다.
    pub async fn initialize(&self, deployment: DeploymentConfig) -> Result<()> {
        let _ops = self.ops.lock().await;

        if let Err(e) = deployment.validate() {
            self.state.write().error = Some(e.to_string());
            return Err(e);
        }

        if self.is_initialized() || !self.registry.is_empty() {
            self.teardown().await;
        }
        self.bootstrap(deployment).await;
        Ok(())
    }

    /// 저장된 배포 설정으로 다시 초기화
    pub async fn reload(&self) -> Result<()> {
        let _ops = self.ops.lock().await;

        let deployment = self
            .state
            .read()
            .deployment
            .clone()
            .ok_or_else(|| Error::InvalidInput("plugin manager has not been initialized".into()))?;

        info!("Reloading plugins");
        self.teardown().await;
        self.bootstrap(deployment).await;
        Ok(())
    }

    async fn bootstrap(&self, deployment: DeploymentConfig) {
        {
            let mut state = self.state.write();
            state.loading = true;
            state.error = None;
            state.deployment = Some(deployment.clone());
        }

        info!(
            plugins = deployment.plugins.len(),
            core_version = %self.settings.core_version,
            "Initializing plugins"
        );

        let ids: Vec<String> = deployment
            .plugins
            .iter()
            .filter_map(|entry| self.admit(entry))
            .collect();

        self.validate_all(&ids);
        let waves = self.resolve_all(&ids);
        self.load_waves(&waves).await;

        let order: Vec<String> = waves.into_iter().flatten().collect();
        for id in &order {
            self.settle(id).await;
        }
        for id in &order {
            self.after_start(id).await;
        }
        self.recompute();

        {
            let mut state = self.state.write();
            state.loading = false;
            state.initialized = true;
        }

        let summary = self.summary();
        info!(
            total = summary.total,
            enabled = summary.enabled,
            disabled = summary.disabled,
            rejected = summary.rejected,
            error = summary.error,
            "Plugin initialization finished"
        );

        let payload = json!({ "summary": summary, "enabled": self.enabled_ids() });
        self.hooks
            .invoke(hook_names::PLUGINS_INITIALIZED, std::slice::from_ref(&payload));
        self.bus.emit(names::PLUGINS_INITIALIZED, payload);
    }

    /// 모든 플러그인 정리 (호스트 리스너는 유지)
    async fn teardown(&self) {
        let order = self.state.read().order.clone();
        for id in order.iter().rev() {
            if self.registry.status(id) == Some(PluginStatus::Enabled) {
                self.deactivate(id).await;
            }
        }

        for id in self.registry.ids() {
            self.release(&id);
        }
        self.registry.clear();
        self.configs.clear();

        let mut state = self.state.write();
        let deployment = state.deployment.take();
        *state = ManagerState {
            deployment,
            ..ManagerState::default()
        };
        debug!("Plugin manager state cleared");
    }

    // ========================================================================
    // 파이프라인 단계
    // ========================================================================

    /// 카탈로그 조회 + 등록. 로드 대상이면 ID 반환
    fn admit(&self, entry: &PluginEntry) -> Option<String> {
        let Some(package) = self.catalog.package(&entry.package) else {
            let manifest = PluginManifest::unresolved(missing_id(&entry.package), entry.package.clone());
            let id = manifest.id.clone();
            self.registry.register(entry.clone(), manifest).ok()?;
            self.fail(
                &id,
                PluginStatus::Error,
                PluginFailure::new(
                    LoadStage::Catalog,
                    format!("package '{}' not found", entry.package),
                ),
            );
            return None;
        };

        let id = package.manifest.id.clone();
        self.registry.register(entry.clone(), package.manifest).ok()?;
        if let Some(lifecycle) = package.lifecycle {
            self.state.write().lifecycles.insert(id.clone(), lifecycle);
        }
        Some(id)
    }

    fn validate_all(&self, ids: &[String]) {
        for id in ids {
            let Some(manifest) = self.registry.manifest(id) else {
                continue;
            };

            self.registry.set_status(id, PluginStatus::Validating);
            let report = self.validator.validate(&manifest);
            if report.valid {
                self.registry.set_status(id, PluginStatus::Resolving);
            } else {
                self.fail(
                    id,
                    PluginStatus::Rejected,
                    PluginFailure::new(LoadStage::Validate, report.message()),
                );
            }
        }
    }

    /// 대상 플러그인을 의존성 단계로 묶음. 해석 실패는 해당 플러그인만 제외
    fn resolve_all(&self, ids: &[String]) -> Vec<Vec<String>> {
        let pending: HashSet<&str> = ids
            .iter()
            .filter(|id| self.registry.status(id) == Some(PluginStatus::Resolving))
            .map(String::as_str)
            .collect();

        // 이미 로드된 플러그인도 의존 대상이 될 수 있음 (런타임 설치)
        let manifests: Vec<PluginManifest> = self
            .registry
            .get_all()
            .into_iter()
            .filter(|p| pending.contains(p.id.as_str()) || p.status.is_operational())
            .map(|p| p.manifest)
            .collect();

        let resolution = resolve_partial(&manifests);
        for failure in resolution.failures {
            let failure = self.explain(failure);
            for id in failure.implicated() {
                if pending.contains(id.as_str()) {
                    self.fail(
                        &id,
                        PluginStatus::Error,
                        PluginFailure::new(LoadStage::Resolve, failure.to_string()),
                    );
                }
            }
        }

        let order: Vec<String> = resolution
            .order
            .into_iter()
            .filter(|id| pending.contains(id.as_str()))
            .collect();
        levels(&order, &manifests)
    }

    /// 등록은 됐지만 탈락한 의존 대상은 "없음"이 아니라 "사용 불가"
    fn explain(&self, failure: DependencyError) -> DependencyError {
        match failure {
            DependencyError::Missing { plugin, missing } if self.registry.contains(&missing) => {
                DependencyError::Unavailable {
                    plugin,
                    dependency: missing,
                }
            }
            other => other,
        }
    }

    async fn load_waves(&self, waves: &[Vec<String>]) {
        for wave in waves {
            self.state.write().order.extend(wave.iter().cloned());

            if self.settings.parallel_load {
                join_all(wave.iter().map(|id| self.load_one(id))).await;
            } else {
                for id in wave {
                    self.load_one(id).await;
                }
            }
        }
    }

    /// before_start → 로드 → 번역 → 설정
    async fn load_one(&self, id: &str) {
        let (Some(manifest), Some(entry)) = (self.registry.manifest(id), self.registry.entry(id))
        else {
            return;
        };

        if let Some(dep) = manifest
            .required_dependencies()
            .find(|dep| !self.registry.status(dep).is_some_and(|s| s.is_operational()))
        {
            let message = format!("dependency '{}' failed to load", dep);
            self.fail(id, PluginStatus::Error, PluginFailure::new(LoadStage::Resolve, message));
            return;
        }

        if let Some(lifecycle) = self.lifecycle(id) {
            let ctx = self.context(id);
            if let Err(e) = lifecycle.before_start(&ctx).await {
                self.fail(
                    id,
                    PluginStatus::Error,
                    PluginFailure::new(LoadStage::Lifecycle, format!("before_start failed: {}", e)),
                );
                return;
            }
        }

        self.registry.set_status(id, PluginStatus::Loading);
        self.state.write().load_sequence.push(id.to_string());

        let merged = self
            .registry
            .merged_config(id)
            .unwrap_or_else(|| manifest.config.defaults.clone());

        let outcome = self.loader.load(&manifest, &merged).await;
        if !outcome.is_loaded() {
            let failure = outcome
                .plugin
                .error
                .unwrap_or_else(|| PluginFailure::new(LoadStage::Load, "plugin did not load"));
            self.fail(id, PluginStatus::Error, failure);
            return;
        }
        let mut loaded = outcome.plugin;

        let overrides = self.registry.localization_overrides(id).unwrap_or_default();
        for warning in self
            .localization
            .load_plugin_translations(&manifest, &overrides)
            .await
        {
            loaded.warn(warning);
        }

        loaded.config = match self.configs.load_config(
            id,
            &manifest.config.schema,
            &manifest.config.defaults,
            entry.config.as_ref(),
        ) {
            Ok(config) => config,
            Err(e) => match self.configs.get_config(id) {
                Some(defaults) => {
                    loaded.warn(format!("configuration rejected, using defaults: {}", e));
                    defaults
                }
                None => {
                    self.localization.unload_plugin(id);
                    self.fail(
                        id,
                        PluginStatus::Error,
                        PluginFailure::new(
                            LoadStage::Configure,
                            format!("configuration defaults are invalid: {}", e),
                        ),
                    );
                    return;
                }
            },
        };

        apply_role_mapping(&mut loaded, &entry);
        if let Some(ui) = &entry.ui {
            apply_placement(&mut loaded.menu_items, ui);
        }

        self.state
            .write()
            .bindings
            .insert(id.to_string(), outcome.listeners);

        let version = loaded.manifest.version.clone();
        self.registry.update(id, |plugin| plugin.apply_load(loaded));
        self.bus.emit(
            names::PLUGIN_LOADED,
            json!({ "pluginId": id, "version": version }),
        );
    }

    /// 로드된 플러그인의 초기 상태 결정 (enabled / disabled)
    async fn settle(&self, id: &str) {
        let Some(plugin) = self.registry.get(id) else {
            return;
        };
        if plugin.status != PluginStatus::Loaded {
            return;
        }

        if !plugin.enabled {
            debug!(plugin_id = id, "Plugin disabled by deployment configuration");
            self.registry.set_status(id, PluginStatus::Disabled);
            return;
        }

        if let Some(dep) = self.inactive_dependency(&plugin.manifest) {
            let message = format!("dependency '{}' is not enabled", dep);
            warn!(plugin_id = id, "Plugin starts disabled: {}", message);
            self.registry.update(id, |p| {
                p.status = PluginStatus::Disabled;
                p.warn(message);
            });
            return;
        }

        match self.activate(id).await {
            Ok(()) => {
                self.bus
                    .emit(names::PLUGIN_ENABLED, json!({ "pluginId": id }));
            }
            Err(e) => debug!(plugin_id = id, error = %e, "Plugin failed to enable"),
        }
    }

    async fn after_start(&self, id: &str) {
        if self.registry.status(id) != Some(PluginStatus::Enabled) {
            return;
        }
        let Some(lifecycle) = self.lifecycle(id) else {
            return;
        };

        let ctx = self.context(id);
        if let Err(e) = lifecycle.after_start(&ctx).await {
            self.fail(
                id,
                PluginStatus::Error,
                PluginFailure::new(LoadStage::Lifecycle, format!("after_start failed: {}", e)),
            );
        }
    }

    /// 리스너 연결 + on_enable. 실패하면 플러그인은 error
    async fn activate(&self, id: &str) -> Result<()> {
        self.attach(id);

        if let Some(lifecycle) = self.lifecycle(id) {
            let ctx = self.context(id);
            if let Err(e) = lifecycle.on_enable(&ctx).await {
                let message = format!("on_enable failed: {}", e);
                self.fail(
                    id,
                    PluginStatus::Error,
                    PluginFailure::new(LoadStage::Lifecycle, message.clone()),
                );
                return Err(Error::load(id, message));
            }
        }

        self.registry.update(id, |plugin| {
            plugin.status = PluginStatus::Enabled;
            plugin.enabled = true;
        });
        info!(plugin_id = id, "Plugin enabled");
        Ok(())
    }

    /// on_disable + 리스너/훅 해제
    async fn deactivate(&self, id: &str) {
        if let Some(lifecycle) = self.lifecycle(id) {
            let ctx = self.context(id);
            if let Err(e) = lifecycle.on_disable(&ctx).await {
                warn!(plugin_id = id, error = %e, "on_disable failed");
            }
        }
        self.detach(id);
    }

    fn attach(&self, id: &str) {
        let bindings = self
            .state
            .read()
            .bindings
            .get(id)
            .cloned()
            .unwrap_or_default();

        let subscriptions: Vec<Subscription> = bindings
            .into_iter()
            .map(|binding| self.bus.on_owned(binding.event, id, binding.handler))
            .collect();

        if !subscriptions.is_empty() {
            self.state
                .write()
                .subscriptions
                .entry(id.to_string())
                .or_default()
                .extend(subscriptions);
        }
    }

    fn detach(&self, id: &str) -> usize {
        let subscriptions = self
            .state
            .write()
            .subscriptions
            .remove(id)
            .unwrap_or_default();

        let mut removed = 0;
        for subscription in subscriptions {
            if subscription.unsubscribe() {
                removed += 1;
            }
        }
        removed += self.bus.remove_owner(id);
        removed += self.hooks.remove_owner(id);

        if removed > 0 {
            debug!(plugin_id = id, removed, "Detached plugin listeners and hooks");
        }
        removed
    }

    /// 플러그인이 남긴 모든 흔적 제거 (레지스트리 레코드는 호출자가)
    fn release(&self, id: &str) {
        self.detach(id);
        self.localization.unload_plugin(id);
        self.configs.remove(id);

        let mut state = self.state.write();
        state.bindings.remove(id);
        state.lifecycles.remove(id);
    }

    fn fail(&self, id: &str, status: PluginStatus, failure: PluginFailure) {
        warn!(
            plugin_id = id,
            stage = %failure.stage,
            error = %failure.message,
            "Plugin {}",
            status
        );

        let payload = json!({
            "pluginId": id,
            "stage": failure.stage,
            "error": failure.message,
        });

        self.detach(id);
        self.registry.update(id, |plugin| plugin.fail(status, failure));
        self.bus.emit(names::PLUGIN_ERROR, payload);
    }

    /// 활성 플러그인 기여 항목 재집계
    fn recompute(&self) {
        let order = self.state.read().order.clone();

        let mut aggregate = AggregatedCapabilities::default();
        let mut paths = HashSet::new();
        let mut widget_ids = HashSet::new();
        let mut codes = HashSet::new();

        for plugin in order
            .iter()
            .filter_map(|id| self.registry.get(id))
            .filter(LoadedPlugin::is_enabled)
        {
            for route in plugin.routes {
                if paths.insert(route.path.clone()) {
                    aggregate.routes.push(route);
                } else {
                    warn!(plugin_id = %plugin.id, path = %route.path, "Route path already registered, keeping the first");
                }
            }

            aggregate.menu_items.extend(plugin.menu_items);

            for widget in plugin.widgets {
                if widget_ids.insert(widget.id.clone()) {
                    aggregate.widgets.push(widget);
                } else {
                    warn!(plugin_id = %plugin.id, widget = %widget.id, "Widget id already registered, keeping the first");
                }
            }

            for permission in plugin.permissions {
                if codes.insert(permission.code.clone()) {
                    aggregate.permissions.push(permission);
                } else {
                    warn!(plugin_id = %plugin.id, code = %permission.code, "Permission code already registered, keeping the first");
                }
            }
        }

        aggregate.menu_items.sort_by_key(|item| item.order);

        debug!(
            routes = aggregate.routes.len(),
            menu_items = aggregate.menu_items.len(),
            widgets = aggregate.widgets.len(),
            permissions = aggregate.permissions.len(),
            "Recomputed plugin capabilities"
        );
        self.state.write().aggregate = aggregate;
    }

    // ========================================================================
    // 활성화 / 비활성화
    // ========================================================================

    /// 플러그인 활성화 (필수 의존성이 모두 활성이어야 함)
    pub async fn enable(&self, id: &str) -> Result<()> {
        let _ops = self.ops.lock().await;
        let plugin = self.registry.get(id).ok_or_else(|| not_found(id))?;

        match plugin.status {
            PluginStatus::Enabled => return Ok(()),
            PluginStatus::Loaded | PluginStatus::Disabled => {}
            other => {
                return Err(Error::InvalidInput(format!(
                    "plugin '{}' cannot be enabled while {}",
                    id, other
                )))
            }
        }

        if let Some(dep) = self.inactive_dependency(&plugin.manifest) {
            return Err(Error::InvalidInput(format!(
                "plugin '{}' requires '{}' to be enabled first",
                id, dep
            )));
        }

        self.activate(id).await?;
        self.recompute();
        self.bus.emit(names::PLUGIN_ENABLED, json!({ "pluginId": id }));
        Ok(())
    }

    /// 플러그인 비활성화
    pub async fn disable(&self, id: &str) -> Result<()> {
        let _ops = self.ops.lock().await;
        let plugin = self.registry.get(id).ok_or_else(|| not_found(id))?;

        match plugin.status {
            PluginStatus::Disabled => return Ok(()),
            PluginStatus::Enabled | PluginStatus::Loaded => {}
            other => {
                return Err(Error::InvalidInput(format!(
                    "plugin '{}' cannot be disabled while {}",
                    id, other
                )))
            }
        }

        let dependents = self.enabled_dependents(id);
        if !dependents.is_empty() {
            warn!(plugin_id = id, dependents = ?dependents, "Disabling a plugin that enabled plugins depend on");
        }

        self.deactivate(id).await;
        self.registry.update(id, |plugin| {
            plugin.status = PluginStatus::Disabled;
            plugin.enabled = false;
        });
        self.recompute();

        info!(plugin_id = id, "Plugin disabled");
        self.bus.emit(names::PLUGIN_DISABLED, json!({ "pluginId": id }));
        Ok(())
    }

    // ========================================================================
    // 설치 / 제거
    // ========================================================================

    /// 런타임 설치
    ///
    /// 패키지를 찾지 못하거나 이미 등록된 ID 면 에러입니다. 그 외의 실패는
    /// 반환되는 레코드의 상태로 나타납니다.
    pub async fn install(&self, entry: PluginEntry) -> Result<LoadedPlugin> {
        let _ops = self.ops.lock().await;
        entry.validate()?;

        let package = self
            .catalog
            .package(&entry.package)
            .ok_or_else(|| Error::NotFound(format!("package '{}' not found", entry.package)))?;
        let id = package.manifest.id.clone();

        self.registry.register(entry.clone(), package.manifest)?;
        {
            let mut state = self.state.write();
            if let Some(lifecycle) = package.lifecycle {
                state.lifecycles.insert(id.clone(), lifecycle);
            }
            state
                .deployment
                .get_or_insert_with(DeploymentConfig::default)
                .plugins
                .push(entry);
        }

        let ids = vec![id.clone()];
        self.validate_all(&ids);
        let admitted = self
            .resolve_all(&ids)
            .iter()
            .flatten()
            .any(|resolved| resolved == &id);

        if admitted {
            self.state.write().order.push(id.clone());
            if self.run_install_hook(&id).await {
                self.load_one(&id).await;
                self.settle(&id).await;
                self.after_start(&id).await;
            }
        }
        self.recompute();

        info!(plugin_id = %id, "Plugin installed");
        self.bus
            .emit(names::PLUGIN_INSTALLED, json!({ "pluginId": id }));
        self.registry.get(&id).ok_or_else(|| not_found(&id))
    }

    async fn run_install_hook(&self, id: &str) -> bool {
        let Some(lifecycle) = self.lifecycle(id) else {
            return true;
        };

        let ctx = self.context(id);
        match lifecycle.on_install(&ctx).await {
            Ok(()) => true,
            Err(e) => {
                self.fail(
                    id,
                    PluginStatus::Error,
                    PluginFailure::new(LoadStage::Lifecycle, format!("on_install failed: {}", e)),
                );
                false
            }
        }
    }

    /// 런타임 제거 (활성 플러그인이 의존 중이면 거부)
    pub async fn uninstall(&self, id: &str) -> Result<()> {
        let _ops = self.ops.lock().await;
        let plugin = self.registry.get(id).ok_or_else(|| not_found(id))?;

        let dependents = self.enabled_dependents(id);
        if !dependents.is_empty() {
            return Err(Error::InvalidInput(format!(
                "plugin '{}' is required by {}",
                id,
                dependents.join(", ")
            )));
        }

        if plugin.is_enabled() {
            self.deactivate(id).await;
        }
        if let Some(lifecycle) = self.lifecycle(id) {
            let ctx = self.context(id);
            if let Err(e) = lifecycle.on_uninstall(&ctx).await {
                warn!(plugin_id = id, error = %e, "on_uninstall failed");
            }
        }

        self.release(id);
        self.registry.unregister(id);
        {
            let mut state = self.state.write();
            state.order.retain(|x| x != id);
            if let Some(deployment) = state.deployment.as_mut() {
                deployment.plugins.retain(|e| e.package != plugin.package);
            }
        }
        self.recompute();

        info!(plugin_id = id, "Plugin uninstalled");
        self.bus
            .emit(names::PLUGIN_UNINSTALLED, json!({ "pluginId": id }));
        Ok(())
    }

    // ========================================================================
    // 설정
    // ========================================================================

    /// 부분 업데이트 (검증 실패 시 이전 값 유지)
    pub async fn update_config(&self, id: &str, patch: &Value) -> Result<Value> {
        self.change_config(id, |configs| configs.update_config(id, patch))
            .await
    }

    /// 전체 교체
    pub async fn import_config(&self, id: &str, config: &Value) -> Result<Value> {
        self.change_config(id, |configs| configs.import_config(id, config))
            .await
    }

    /// 기본값으로 되돌림
    pub async fn reset_config(&self, id: &str) -> Result<Value> {
        self.change_config(id, |configs| configs.reset_config(id))
            .await
    }

    async fn change_config<F>(&self, id: &str, apply: F) -> Result<Value>
    where
        F: FnOnce(&ConfigManager) -> Result<Value>,
    {
        let _ops = self.ops.lock().await;
        if !self.registry.contains(id) {
            return Err(not_found(id));
        }

        let previous = self
            .configs
            .get_config(id)
            .ok_or_else(|| Error::NotFound(format!("plugin '{}' has no configuration", id)))?;
        let current = apply(&self.configs)?;

        self.registry
            .update(id, |plugin| plugin.config = current.clone());

        if let Some(lifecycle) = self.lifecycle(id) {
            let ctx = self.context(id);
            if let Err(e) = lifecycle.on_config_change(&ctx, &previous, &current).await {
                warn!(plugin_id = id, error = %e, "on_config_change failed");
            }
        }

        info!(plugin_id = id, "Plugin configuration changed");
        self.bus.emit(
            names::PLUGIN_CONFIG_CHANGED,
            json!({ "pluginId": id, "config": current }),
        );
        Ok(current)
    }

    /// 헬스 체크 (실패 상태면 구현을 호출하지 않음)
    pub async fn health_check(&self, id: &str) -> Result<HealthStatus> {
        let plugin = self.registry.get(id).ok_or_else(|| not_found(id))?;

        if let Some(failure) = &plugin.error {
            return Ok(HealthStatus::unhealthy(failure.to_string()));
        }
        if !plugin.status.is_operational() {
            return Ok(HealthStatus::unhealthy(format!("plugin is {}", plugin.status)));
        }

        match self.lifecycle(id) {
            Some(lifecycle) => {
                let ctx = self.context(id);
                Ok(lifecycle
                    .health_check(&ctx)
                    .await
                    .unwrap_or_else(|e| HealthStatus::unhealthy(e.to_string())))
            }
            None => Ok(HealthStatus::healthy()),
        }
    }

    // ========================================================================
    // 내부 헬퍼
    // ========================================================================

    fn lifecycle(&self, id: &str) -> Option<Arc<dyn PluginLifecycle>> {
        self.state.read().lifecycles.get(id).cloned()
    }

    fn context(&self, id: &str) -> PluginContext {
        let config = self
            .configs
            .get_config(id)
            .or_else(|| self.registry.merged_config(id))
            .unwrap_or_else(|| Value::Object(Map::new()));

        PluginContext::new(
            id,
            config,
            self.bus.clone(),
            self.hooks.clone(),
            self.localization.store().clone(),
        )
    }

    fn inactive_dependency(&self, manifest: &PluginManifest) -> Option<String> {
        manifest
            .required_dependencies()
            .find(|dep| self.registry.status(dep) != Some(PluginStatus::Enabled))
            .map(str::to_string)
    }

    fn enabled_dependents(&self, id: &str) -> Vec<String> {
        self.registry
            .get_all()
            .into_iter()
            .filter(|p| p.is_enabled() && p.manifest.required_dependencies().any(|dep| dep == id))
            .map(|p| p.id)
            .collect()
    }

    fn enabled_ids(&self) -> Vec<String> {
        self.registry
            .get_all()
            .into_iter()
            .filter(LoadedPlugin::is_enabled)
            .map(|p| p.id)
            .collect()
    }

    // ========================================================================
    // 조회
    // ========================================================================

    pub fn get_routes(&self) -> Vec<Route> {
        self.state.read().aggregate.routes.clone()
    }

    pub fn get_menu_items(&self) -> Vec<MenuItem> {
        self.state.read().aggregate.menu_items.clone()
    }

    pub fn get_widgets(&self) -> Vec<Widget> {
        self.state.read().aggregate.widgets.clone()
    }

    pub fn get_permissions(&self) -> Vec<Permission> {
        self.state.read().aggregate.permissions.clone()
    }

    /// 집계 전체
    pub fn capabilities(&self) -> AggregatedCapabilities {
        self.state.read().aggregate.clone()
    }

    /// 모든 플러그인 (상태 무관, 등록 순서)
    pub fn get_all_plugins(&self) -> Vec<LoadedPlugin> {
        self.registry.get_all()
    }

    pub fn get_plugin(&self, id: &str) -> Option<LoadedPlugin> {
        self.registry.get(id)
    }

    /// 실제 로드가 시작된 순서
    pub fn load_sequence(&self) -> Vec<String> {
        self.state.read().load_sequence.clone()
    }

    pub fn summary(&self) -> PluginSummary {
        PluginSummary::from_plugins(&self.registry.get_all())
    }

    pub fn is_initialized(&self) -> bool {
        self.state.read().initialized
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().loading
    }

    /// 마지막 초기화 실패 (배포 설정 오류)
    pub fn last_error(&self) -> Option<String> {
        self.state.read().error.clone()
    }

    pub fn deployment(&self) -> Option<DeploymentConfig> {
        self.state.read().deployment.clone()
    }

    pub fn get_config(&self, id: &str) -> Option<Value> {
        self.configs.get_config(id)
    }

    pub fn translate(&self, locale: &str, namespace: &str, key: &str) -> String {
        self.localization.translate(locale, namespace, key)
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn configs(&self) -> &ConfigManager {
        &self.configs
    }

    pub fn translations(&self) -> &TranslationStore {
        self.localization.store()
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &CoreSettings {
        &self.settings
    }
}

/// 카탈로그에 없는 패키지의 레코드 키
///
/// `:` 는 플러그인 ID 에 쓸 수 없으므로 실제 매니페스트 ID 와 겹치지 않습니다.
fn missing_id(package: &str) -> String {
    format!("missing:{}", package)
}

fn not_found(id: &str) -> Error {
    Error::NotFound(format!("plugin '{}'", id))
}

/// 배포 설정의 역할 매핑을 권한에 병합
fn apply_role_mapping(plugin: &mut LoadedPlugin, entry: &PluginEntry) {
    for (code, roles) in &entry.permissions {
        match plugin.permissions.iter_mut().find(|p| &p.code == code) {
            Some(permission) => permission.merge_roles(roles),
            None => {
                warn!(plugin_id = %plugin.id, code = %code, "Role mapping for undeclared permission ignored");
                plugin.warn(format!("role mapping for undeclared permission '{}' ignored", code));
            }
        }
    }
}

/// 최상위 메뉴 항목에 배치 힌트 적용
fn apply_placement(items: &mut [MenuItem], ui: &UiPlacement) {
    for item in items.iter_mut().filter(|item| item.parent.is_none()) {
        if let Some(position) = ui.position {
            item.order = position;
        }
        if let Some(icon) = &ui.icon {
            item.icon = Some(icon.clone());
        }
        if let Some(label) = &ui.label {
            item.label = label.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::discovery::StaticCatalog;
    use crate::plugin::manifest::{PermissionDef, PluginDependency};
    use crate::plugin::module::StaticModuleResolver;

    fn manager(catalog: StaticCatalog, resolver: StaticModuleResolver) -> PluginManager {
        PluginManager::new(
            CoreSettings::with_core_version("1.2.0"),
            Arc::new(catalog),
            Arc::new(resolver),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_unknown_package_is_catalog_error() {
        let manager = manager(StaticCatalog::new(), StaticModuleResolver::new());
        manager
            .initialize(DeploymentConfig::new(vec![PluginEntry::new("@erp/ghost")]))
            .await
            .unwrap();

        let plugins = manager.get_all_plugins();
        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0].status, PluginStatus::Error);
        assert_eq!(plugins[0].error.as_ref().unwrap().stage, LoadStage::Catalog);
        assert!(manager.is_initialized());
    }

    #[tokio::test]
    async fn test_missing_package_does_not_shadow_real_plugin() {
        let catalog = StaticCatalog::new()
            .with_manifest("leave", PluginManifest::new("leave", "Leave", "1.0.0"));
        let manager = manager(catalog, StaticModuleResolver::new());
        manager
            .initialize(DeploymentConfig::new(vec![
                PluginEntry::new("@other/leave"),
                PluginEntry::new("leave"),
            ]))
            .await
            .unwrap();

        assert_eq!(manager.get_all_plugins().len(), 2);
        assert_eq!(manager.get_plugin("leave").unwrap().status, PluginStatus::Enabled);

        let missing = manager.get_plugin("missing:@other/leave").unwrap();
        assert_eq!(missing.status, PluginStatus::Error);
        assert_eq!(missing.package, "@other/leave");
        assert_eq!(missing.error.unwrap().message, "package '@other/leave' not found");
    }

    #[tokio::test]
    async fn test_duplicate_route_first_wins() {
        let catalog = StaticCatalog::new()
            .with_manifest("a", PluginManifest::new("a", "A", "1.0.0").with_routes("routes"))
            .with_manifest("b", PluginManifest::new("b", "B", "1.0.0").with_routes("routes"));
        let resolver = StaticModuleResolver::new()
            .with_data("a", "routes", json!([{ "path": "/reports", "component": "A" }]))
            .with_data(
                "b",
                "routes",
                json!([
                    { "path": "/reports", "component": "B" },
                    { "path": "/b", "component": "B" }
                ]),
            );

        let manager = manager(catalog, resolver);
        manager
            .initialize(DeploymentConfig::new(vec![PluginEntry::new("a"), PluginEntry::new("b")]))
            .await
            .unwrap();

        let routes = manager.get_routes();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].component, "A");
        assert_eq!(routes[1].path, "/b");
    }

    #[tokio::test]
    async fn test_entry_roles_and_placement() {
        let manifest = PluginManifest::new("leave", "Leave", "1.0.0")
            .with_menu("menu")
            .with_permission(PermissionDef::new("leave.approve", "Approve").with_roles(["manager"]));
        let catalog = StaticCatalog::new().with_manifest("@erp/leave", manifest);
        let resolver = StaticModuleResolver::new().with_data(
            "leave",
            "menu",
            json!([
                { "id": "leave", "label": "Leave", "order": 10 },
                { "id": "leave-new", "label": "New", "parent": "leave", "order": 1 }
            ]),
        );

        let entry = PluginEntry::new("@erp/leave")
            .with_roles("leave.approve", ["hr", "manager"])
            .with_ui(UiPlacement {
                position: Some(2),
                icon: Some("calendar".into()),
                label: Some("Time Off".into()),
            });

        let manager = manager(catalog, resolver);
        manager.initialize(DeploymentConfig::new(vec![entry])).await.unwrap();

        let permissions = manager.get_permissions();
        assert_eq!(permissions[0].roles, vec!["manager", "hr"]);

        let menu = manager.get_menu_items();
        assert_eq!(menu[0].id, "leave-new");
        assert_eq!(menu[1].label, "Time Off");
        assert_eq!(menu[1].order, 2);
        assert_eq!(menu[1].icon.as_deref(), Some("calendar"));
    }

    #[tokio::test]
    async fn test_disabled_dependency_keeps_dependent_disabled() {
        let catalog = StaticCatalog::new()
            .with_manifest("core-hr", PluginManifest::new("core-hr", "HR", "1.0.0"))
            .with_manifest(
                "leave",
                PluginManifest::new("leave", "Leave", "1.0.0")
                    .with_dependency(PluginDependency::new("core-hr")),
            );

        let manager = manager(catalog, StaticModuleResolver::new());
        manager
            .initialize(DeploymentConfig::new(vec![
                PluginEntry::new("core-hr").disabled(),
                PluginEntry::new("leave"),
            ]))
            .await
            .unwrap();

        let leave = manager.get_plugin("leave").unwrap();
        assert_eq!(leave.status, PluginStatus::Disabled);
        assert!(leave.warnings[0].contains("core-hr"));

        assert!(manager.enable("leave").await.is_err());
        manager.enable("core-hr").await.unwrap();
        manager.enable("leave").await.unwrap();
        assert_eq!(manager.summary().enabled, 2);
    }

    #[tokio::test]
    async fn test_rejected_dependency_is_unavailable() {
        let catalog = StaticCatalog::new()
            .with_manifest(
                "core-hr",
                PluginManifest::new("core-hr", "HR", "1.0.0").with_core_version(">=2.0.0"),
            )
            .with_manifest(
                "leave",
                PluginManifest::new("leave", "Leave", "1.0.0")
                    .with_dependency(PluginDependency::new("core-hr")),
            );

        let manager = manager(catalog, StaticModuleResolver::new());
        manager
            .initialize(DeploymentConfig::new(vec![PluginEntry::new("core-hr"), PluginEntry::new("leave")]))
            .await
            .unwrap();

        assert_eq!(manager.get_plugin("core-hr").unwrap().status, PluginStatus::Rejected);
        let leave = manager.get_plugin("leave").unwrap();
        assert_eq!(leave.status, PluginStatus::Error);
        assert!(leave.error.unwrap().message.contains("unavailable"));
    }

    #[tokio::test]
    async fn test_invalid_deployment_fails_fast() {
        let manager = manager(StaticCatalog::new(), StaticModuleResolver::new());
        let deployment = DeploymentConfig::new(vec![PluginEntry::new("a"), PluginEntry::new("a")]);

        assert!(matches!(manager.initialize(deployment).await, Err(Error::Config(_))));
        assert!(manager.last_error().is_some());
        assert!(!manager.is_initialized());
    }
}
