//! Config - 코어 설정 및 설정 문서 로딩
//!
//! - `settings.rs` - CoreSettings, 레이어드 SettingsLoader
//! - `document.rs` - JSON(주석 허용) / TOML 문서 파싱

mod document;
mod settings;

pub use document::{parse_document, read_document, read_typed, strip_json_comments, DocumentFormat};
pub use settings::{CoreSettings, SettingsLoader, DEFAULT_CORE_VERSION, SETTINGS_DIR_NAME};
