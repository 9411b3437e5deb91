//! # Plugin System
//!
//! ERP 클라이언트 플러그인 시스템
//!
//! ## 아키텍처
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       PluginManager                          │
//! │                                                              │
//! │  DeploymentConfig ─▶ PluginCatalog ─▶ PluginRegistry          │
//! │                                          │                   │
//! │        PluginValidator ◀─────────────────┤                   │
//! │        resolver (Kahn) ◀─────────────────┤                   │
//! │                                          ▼                   │
//! │  ┌──────────────┐   ┌────────────────────┐   ┌─────────────┐ │
//! │  │ PluginLoader │   │ LocalizationManager│   │ConfigManager│ │
//! │  └──────┬───────┘   └─────────┬──────────┘   └─────────────┘ │
//! │         └────── ModuleResolver ┘                             │
//! │                                                              │
//! │  EventBus / HookRegistry (플러그인 소유 태그로 정리)            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 플러그인 상태
//!
//! `pending → validating → (rejected | resolving) → (error | loading)
//!  → (error | loaded) → (enabled ↔ disabled)`
//!
//! 한 플러그인의 실패는 그 플러그인의 상태로만 남고, 나머지 초기화는
//! 계속 진행됩니다.
//!
//! ## 예시
//!
//! ```ignore
//! let catalog = FsCatalog::scan(Path::new("plugins")).await?;
//! let resolver = Arc::new(catalog.module_resolver());
//! let manager = PluginManager::new(CoreSettings::default(), Arc::new(catalog), resolver)?;
//!
//! manager.initialize(DeploymentConfig::load(Path::new("deployment.json"))?).await?;
//! for route in manager.get_routes() {
//!     println!("{} -> {}", route.path, route.component);
//! }
//! ```

mod deployment;
mod discovery;
mod loader;
mod manager;
mod manifest;
mod module;
mod registry;
mod resolver;
mod traits;
mod types;
mod validator;

pub use deployment::{DeploymentConfig, PluginEntry, UiPlacement, DEPLOYMENT_SCHEMA_VERSION};
pub use discovery::{FsCatalog, PluginCatalog, PluginPackage, StaticCatalog, MANIFEST_FILES};
pub use loader::{ListenerBinding, LoadOutcome, PluginLoader};
pub use manager::{AggregatedCapabilities, PluginManager};
pub use manifest::{
    BackendDescriptor, BackendFunction, ConfigDescriptor, DatabaseDescriptor, EventListenerDecl,
    EventsDescriptor, FrontendDescriptor, LifecycleHook, ModuleRef, PermissionDef, PluginCategory,
    PluginDependency, PluginManifest,
};
pub use module::{FsModuleResolver, ModuleResolver, PluginModule, StaticModuleResolver};
pub use registry::PluginRegistry;
pub use resolver::{levels, resolve, resolve_partial, Resolution};
pub use traits::{HealthStatus, PluginContext, PluginLifecycle};
pub use types::{
    LoadStage, LoadedPlugin, MenuItem, Permission, PluginFailure, PluginStatus, PluginSummary,
    Route, Widget,
};
pub use validator::{satisfies, validate, PluginValidator, ValidationReport, VersionRange};
