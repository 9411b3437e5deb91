//! Event System - 이벤트 발행/구독 시스템
//!
//! 플러그인과 코어가 서로를 직접 참조하지 않고 통신하는 수단입니다.
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        EventBus                              │
//! │  emit("plugin:enabled", payload)                             │
//! │         │  (동기, 등록 순서)                                  │
//! │         ▼                                                    │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐       │
//! │  │  Listener 1  │  │  Listener 2  │  │  "*" 리스너  │       │
//! │  │  (leave)     │  │  (host UI)   │  │  (audit)     │       │
//! │  └──────────────┘  └──────────────┘  └──────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 사용법
//!
//! ```ignore
//! use erp_foundation::event::{EventBus, names};
//!
//! let bus = EventBus::new();
//! let sub = bus.on(names::PLUGIN_ENABLED, |event| {
//!     println!("enabled: {:?}", event.plugin_id());
//!     Ok(())
//! });
//!
//! bus.emit(names::PLUGIN_ENABLED, json!({ "pluginId": "leave" }));
//! sub.unsubscribe();
//! ```

pub mod bus;
pub mod types;

// Re-exports
pub use bus::{EventBus, EventBusConfig, EventHandler, ListenerId, Subscription};
pub use types::{names, Event, EventId};
