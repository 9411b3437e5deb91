//! Plugin traits - 라이프사이클 인터페이스와 플러그인 컨텍스트

use crate::i18n::TranslationStore;
use async_trait::async_trait;
use erp_foundation::event::EventHandler;
use erp_foundation::hook::HookCallback;
use erp_foundation::util::get_path;
use erp_foundation::{Event, EventBus, HookRegistration, HookRegistry, Result, Subscription};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

// ============================================================================
// PluginContext - 라이프사이클 훅에 제공되는 컨텍스트
// ============================================================================

/// 플러그인 컨텍스트 - 플러그인이 코어와 상호작용하는 인터페이스
///
/// 컨텍스트를 통해 등록한 리스너와 훅은 플러그인 소유로 태그되어
/// 제거/리로드 시 함께 정리됩니다.
#[derive(Clone)]
pub struct PluginContext {
    plugin_id: String,
    config: Value,
    bus: EventBus,
    hooks: HookRegistry,
    translations: TranslationStore,
}

impl PluginContext {
    /// 새 컨텍스트 생성
    pub fn new(
        plugin_id: impl Into<String>,
        config: Value,
        bus: EventBus,
        hooks: HookRegistry,
        translations: TranslationStore,
    ) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            config,
            bus,
            hooks,
            translations,
        }
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    // ========================================================================
    // 설정
    // ========================================================================

    /// 현재 설정
    pub fn config(&self) -> &Value {
        &self.config
    }

    /// dotted path 로 설정 값 조회
    pub fn config_value(&self, path: &str) -> Option<&Value> {
        get_path(&self.config, path)
    }

    // ========================================================================
    // 이벤트
    // ========================================================================

    /// 이벤트 버스 접근
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// 이 플러그인 명의로 이벤트 발행
    pub fn emit(&self, event: impl Into<String>, payload: Value) -> usize {
        self.bus
            .publish(Event::new(event, payload).with_source(self.plugin_id.clone()))
    }

    /// 플러그인 소유 리스너 등록
    pub fn on<F>(&self, event: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(&Event) -> Result<()> + Send + Sync + 'static,
    {
        let handler: EventHandler = Arc::new(handler);
        self.bus.on_owned(event, self.plugin_id.clone(), handler)
    }

    // ========================================================================
    // 훅
    // ========================================================================

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// 플러그인 소유 훅 등록
    pub fn register_hook<F>(&self, hook: impl Into<String>, priority: i32, callback: F) -> HookRegistration
    where
        F: Fn(Value, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        let callback: HookCallback = Arc::new(callback);
        self.hooks
            .register_owned(hook, self.plugin_id.clone(), priority, callback)
    }

    // ========================================================================
    // 번역
    // ========================================================================

    /// 플러그인 네임스페이스에서 번역
    pub fn t(&self, locale: &str, key: &str) -> String {
        self.translations.translate(locale, &self.plugin_id, key)
    }
}

// ============================================================================
// HealthStatus
// ============================================================================

/// 헬스 체크 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthStatus {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            message: None,
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: Some(message.into()),
        }
    }
}

// ============================================================================
// PluginLifecycle Trait - 패키지가 선택적으로 구현하는 훅
// ============================================================================

/// 플러그인 라이프사이클 트레이트
///
/// 모든 메서드는 기본 구현이 있으므로 필요한 것만 구현하면 됩니다.
/// 호출 순서: `on_install` (런타임 설치 시) → `before_start` → 로드 →
/// `on_enable` → `after_start` → ... → `on_disable` → `on_uninstall`.
#[async_trait]
pub trait PluginLifecycle: Send + Sync {
    /// 런타임 설치 시 호출
    async fn on_install(&self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    /// 로드 직전 호출
    async fn before_start(&self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    /// 활성화 시 호출
    async fn on_enable(&self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    /// 전체 초기화가 끝난 뒤 한 번 호출
    async fn after_start(&self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    /// 비활성화 시 호출
    async fn on_disable(&self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    /// 제거 시 호출
    async fn on_uninstall(&self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    /// 설정 변경 커밋 후 호출
    async fn on_config_change(&self, _ctx: &PluginContext, _previous: &Value, _current: &Value) -> Result<()> {
        Ok(())
    }

    /// 헬스 체크
    async fn health_check(&self, _ctx: &PluginContext) -> Result<HealthStatus> {
        Ok(HealthStatus::healthy())
    }
}
