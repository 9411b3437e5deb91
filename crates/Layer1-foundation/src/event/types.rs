//! Event Types - 이벤트 데이터 정의

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Event ID
// ============================================================================

/// 이벤트 고유 ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub String);

impl EventId {
    /// 새 이벤트 ID 생성
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Event
// ============================================================================

/// 버스로 전달되는 이벤트 (이름 + 임의 페이로드)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// 이벤트 ID
    pub id: EventId,

    /// 이벤트 이름 (예: "plugin:enabled", "leave:request-approved")
    pub name: String,

    /// 페이로드
    pub payload: Value,

    /// 발행 주체 (플러그인 ID 또는 "core")
    pub source: String,

    /// 발행 시각
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// 새 이벤트 생성
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            id: EventId::new(),
            name: name.into(),
            payload,
            source: "core".to_string(),
            timestamp: Utc::now(),
        }
    }

    /// 발행 주체 설정
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// 페이로드의 `pluginId` 필드
    pub fn plugin_id(&self) -> Option<&str> {
        self.payload.get("pluginId").and_then(Value::as_str)
    }
}

// ============================================================================
// 코어가 발행하는 이벤트 이름
// ============================================================================

/// Plugin Manager 라이프사이클 이벤트 이름
pub mod names {
    pub const PLUGIN_LOADED: &str = "plugin:loaded";
    pub const PLUGIN_ERROR: &str = "plugin:error";
    pub const PLUGIN_ENABLED: &str = "plugin:enabled";
    pub const PLUGIN_DISABLED: &str = "plugin:disabled";
    pub const PLUGIN_CONFIG_CHANGED: &str = "plugin:config-changed";
    pub const PLUGIN_INSTALLED: &str = "plugin:installed";
    pub const PLUGIN_UNINSTALLED: &str = "plugin:uninstalled";
    pub const PLUGINS_INITIALIZED: &str = "plugins:initialized";

    /// 모든 이벤트를 받는 와일드카드
    pub const WILDCARD: &str = "*";
}
