//! # Hook Registry
//!
//! 코어가 정해진 시점에 호출하는 이름 있는 확장 지점입니다.
//!
//! ## 호출 방식
//!
//! - **action** (`invoke`): 모든 콜백을 호출하고 결과를 모음
//! - **filter** (`apply_filter`): 콜백이 값을 받아 변환한 값을 다음 콜백에 넘김
//!
//! ## 순서
//!
//! 우선순위 내림차순, 같은 우선순위는 등록 순서.
//!
//! ## 예시
//!
//! ```ignore
//! let hooks = HookRegistry::new();
//!
//! let reg = hooks.register("menu:items", 10, |items, _args| {
//!     // items 변환
//!     Ok(items)
//! });
//!
//! let items = hooks.apply_filter("menu:items", json!([]), &[]);
//! reg.unregister();
//! ```

mod registry;

pub use registry::{HookCallback, HookId, HookRegistration, HookRegistry};

/// 코어가 호출하는 훅 이름
pub mod names {
    /// action: 초기화 완료 후 (args: [초기화 요약])
    pub const PLUGINS_INITIALIZED: &str = "plugins:initialized";
    /// filter: 호스트에 노출할 라우트 목록 (JSON 배열)
    pub const PLUGIN_ROUTES: &str = "plugin:routes";
    /// filter: 호스트에 노출할 메뉴 목록 (JSON 배열)
    pub const PLUGIN_MENU_ITEMS: &str = "plugin:menu-items";
}
