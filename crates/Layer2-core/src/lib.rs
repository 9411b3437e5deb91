//! erp-core: Plugin runtime for the ERP client
//!
//! Layer2 - 플러그인 파이프라인 레이어
//!
//! # 주요 모듈
//!
//! - `plugin`: 매니페스트, 검증, 의존성 해석, 레지스트리, 로더, 매니저
//! - `i18n`: 번역 저장소와 플러그인 번들 로드
//! - `config`: 플러그인별 검증된 설정
//! - `host`: UI 계층용 스냅샷 어댑터
//!
//! # 사용 예시
//!
//! ```ignore
//! use erp_core::{DeploymentConfig, FsCatalog, PluginHost, PluginManager};
//!
//! let catalog = FsCatalog::scan(Path::new("plugins")).await?;
//! let resolver = Arc::new(catalog.module_resolver());
//! let manager = PluginManager::new(settings, Arc::new(catalog), resolver)?;
//!
//! let host = PluginHost::new(Arc::new(manager));
//! let snapshot = host.start(DeploymentConfig::load(Path::new("deployment.json"))?).await?;
//!
//! // 라우터 구성
//! for route in &snapshot.routes {
//!     router.add(&route.path, &route.component);
//! }
//!
//! // 활성화 상태가 바뀌면 다시 그리기
//! let _sub = host.on_change(|event| redraw(event));
//! ```

pub mod config;
pub mod host;
pub mod i18n;
pub mod plugin;

// Re-exports: Plugin
pub use plugin::{
    AggregatedCapabilities, DeploymentConfig, FsCatalog, FsModuleResolver, HealthStatus,
    LoadedPlugin, MenuItem, ModuleRef, ModuleResolver, Permission, PluginCatalog, PluginContext,
    PluginEntry, PluginLifecycle, PluginManager, PluginManifest, PluginPackage, PluginStatus,
    PluginSummary, PluginValidator, Route, StaticCatalog, StaticModuleResolver, UiPlacement,
    ValidationReport, Widget,
};

// Re-exports: Config / i18n / Host
pub use config::ConfigManager;
pub use host::{HostSnapshot, PluginHost};
pub use i18n::{LocalizationManager, TranslationStore};

// Re-exports: Foundation
pub use erp_foundation::{
    ConfigSchema, CoreSettings, Error, Event, EventBus, HookRegistry, Result, SettingsLoader,
    Subscription,
};
