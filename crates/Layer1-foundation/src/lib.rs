//! # erp-foundation
//!
//! Foundation layer for the ERP plugin system:
//! - Error: 에러 분류 (Validation, Dependency, Load, ConfigValidation ...)
//! - Util: 객체 경로 get/set, 딥 머지, dotted-key 확장
//! - Event: 동기 Event Bus (구독 해제 핸들, 에러 격리, 재진입 제한)
//! - Hook: 우선순위 기반 Hook Registry (action / filter)
//! - Schema: 플러그인 설정 스키마 검증 + 기본값 적용
//! - Config: CoreSettings, 레이어드 설정 로더, JSON/TOML 문서 파싱
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  erp-core (PluginManager, Registry, Loader, ...)        │
//! │                     │                                   │
//! │                     ▼                                   │
//! │   ┌──────────┬──────────┬──────────┬──────────┐        │
//! │   │  util    │  event   │  hook    │  schema  │        │
//! │   └──────────┴──────────┴──────────┴──────────┘        │
//! │                error  /  config                         │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod hook;
pub mod schema;
pub mod util;

// ============================================================================
// Error
// ============================================================================
pub use error::{DependencyError, Error, Result, SchemaViolation};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{CoreSettings, SettingsLoader};

// ============================================================================
// Event / Hook
// ============================================================================
pub use event::{Event, EventBus, EventBusConfig, EventHandler, ListenerId, Subscription};
pub use hook::{HookCallback, HookId, HookRegistration, HookRegistry};

// ============================================================================
// Schema
// ============================================================================
pub use schema::{ConfigSchema, SchemaType};
