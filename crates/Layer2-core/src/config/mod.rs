//! # Plugin Configuration
//!
//! 플러그인별 설정의 우선순위 (낮은 → 높은)
//!
//! 1. 스키마에 선언된 `default`
//! 2. 매니페스트 `config.defaults`
//! 3. 배포 설정의 `config` 오버라이드
//! 4. 런타임 `update_config` / `import_config`
//!
//! 어느 단계든 스키마 검증을 통과한 값만 "현재 설정"이 됩니다.
//!
//! ## 사용 예시
//!
//! ```ignore
//! let configs = ConfigManager::new();
//! configs.load_config("leave", &schema, &defaults, Some(&overlay))?;
//!
//! // 잘못된 값은 거부되고 이전 값이 유지됨
//! assert!(configs.update_config("leave", &json!({ "maxItems": -5 })).is_err());
//! ```

mod manager;

pub use manager::ConfigManager;
