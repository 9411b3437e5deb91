//! Shared utilities - 객체 경로, 딥 머지, 식별자 헬퍼
//!
//! Registry, Config Manager, Localization Manager 가 공통으로 쓰는
//! 순수 함수 모음. 시스템의 다른 모듈에 의존하지 않습니다.
//!
//! - `merge`: JSON 값 딥 머지 (override 우선, 배열/원시값은 교체)
//! - `path`: 점 표기 경로 get/set, dotted-key 확장/평탄화
//! - `ident`: 플러그인 ID / 네임스페이스 키 처리

mod ident;
mod merge;
mod path;

pub use ident::{is_valid_plugin_id, split_namespace};
pub use merge::{deep_merge, deep_merge_into, is_plain_object};
pub use path::{expand_dotted, flatten, get_path, remove_path, set_path};
