//! Module resolution - `ModuleRef` 를 실제 모듈로 해석
//!
//! 로더와 번역 관리자는 `ModuleResolver` 에만 의존합니다. 정적 테이블,
//! 파일 시스템, 테스트 더블 어느 것이든 주입할 수 있습니다.

use super::manifest::ModuleRef;
use async_trait::async_trait;
use erp_foundation::config::{parse_document, DocumentFormat};
use erp_foundation::event::EventHandler;
use erp_foundation::{Error, Event, Result};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

// ============================================================================
// PluginModule
// ============================================================================

/// 해석된 모듈
#[derive(Clone)]
pub enum PluginModule {
    /// JSON 데이터 (routes, menu, widgets, 번역 번들 ...)
    Data(Value),

    /// 이벤트 핸들러
    Handler(EventHandler),
}

impl PluginModule {
    pub fn into_data(self) -> Option<Value> {
        match self {
            PluginModule::Data(value) => Some(value),
            PluginModule::Handler(_) => None,
        }
    }

    pub fn into_handler(self) -> Option<EventHandler> {
        match self {
            PluginModule::Handler(handler) => Some(handler),
            PluginModule::Data(_) => None,
        }
    }
}

impl fmt::Debug for PluginModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginModule::Data(value) => f.debug_tuple("Data").field(value).finish(),
            PluginModule::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

// ============================================================================
// ModuleResolver trait
// ============================================================================

/// 모듈 해석기
#[async_trait]
pub trait ModuleResolver: Send + Sync {
    /// 플러그인의 모듈 참조를 해석
    async fn resolve(&self, plugin_id: &str, reference: &ModuleRef) -> Result<PluginModule>;
}

// ============================================================================
// StaticModuleResolver
// ============================================================================

#[derive(Clone)]
enum StaticEntry {
    Module(PluginModule),
    Fail(String),
    Stall,
}

/// 메모리 기반 해석기 (테스트, 임베디드 호스트)
#[derive(Default)]
pub struct StaticModuleResolver {
    entries: RwLock<HashMap<(String, String), StaticEntry>>,
    /// 해석 요청 기록 (plugin_id, reference)
    requests: RwLock<Vec<(String, String)>>,
}

impl StaticModuleResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 빌더 패턴: 데이터 모듈
    pub fn with_data(self, plugin_id: &str, reference: &str, data: Value) -> Self {
        self.insert_data(plugin_id, reference, data);
        self
    }

    pub fn insert_data(&self, plugin_id: &str, reference: &str, data: Value) {
        self.insert(plugin_id, reference, StaticEntry::Module(PluginModule::Data(data)));
    }

    pub fn insert_handler<F>(&self, plugin_id: &str, reference: &str, handler: F)
    where
        F: Fn(&Event) -> Result<()> + Send + Sync + 'static,
    {
        let handler: EventHandler = Arc::new(handler);
        self.insert(plugin_id, reference, StaticEntry::Module(PluginModule::Handler(handler)));
    }

    /// 해석 시 에러를 내도록 설정
    pub fn insert_failure(&self, plugin_id: &str, reference: &str, message: impl Into<String>) {
        self.insert(plugin_id, reference, StaticEntry::Fail(message.into()));
    }

    /// 해석이 끝나지 않도록 설정 (타임아웃 확인용)
    pub fn insert_stall(&self, plugin_id: &str, reference: &str) {
        self.insert(plugin_id, reference, StaticEntry::Stall);
    }

    /// 지금까지의 해석 요청
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.read().clone()
    }

    fn insert(&self, plugin_id: &str, reference: &str, entry: StaticEntry) {
        self.entries
            .write()
            .insert((plugin_id.to_string(), reference.to_string()), entry);
    }
}

#[async_trait]
impl ModuleResolver for StaticModuleResolver {
    async fn resolve(&self, plugin_id: &str, reference: &ModuleRef) -> Result<PluginModule> {
        self.requests
            .write()
            .push((plugin_id.to_string(), reference.as_str().to_string()));

        let entry = self
            .entries
            .read()
            .get(&(plugin_id.to_string(), reference.as_str().to_string()))
            .cloned();

        match entry {
            Some(StaticEntry::Module(module)) => Ok(module),
            Some(StaticEntry::Fail(message)) => Err(Error::load(plugin_id, message)),
            Some(StaticEntry::Stall) => {
                std::future::pending::<()>().await;
                Err(Error::load(plugin_id, "unreachable"))
            }
            None => Err(Error::load(
                plugin_id,
                format!("module '{}' not found", reference),
            )),
        }
    }
}

// ============================================================================
// FsModuleResolver
// ============================================================================

/// 파일 시스템 해석기 - 참조를 플러그인 디렉토리 기준 JSON/TOML 파일로 읽음
#[derive(Default)]
pub struct FsModuleResolver {
    roots: RwLock<HashMap<String, PathBuf>>,
}

impl FsModuleResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 플러그인 루트 디렉토리 설정
    pub fn set_root(&self, plugin_id: impl Into<String>, root: impl Into<PathBuf>) {
        self.roots.write().insert(plugin_id.into(), root.into());
    }

    pub fn root(&self, plugin_id: &str) -> Option<PathBuf> {
        self.roots.read().get(plugin_id).cloned()
    }

    fn locate(&self, plugin_id: &str, reference: &ModuleRef) -> Result<PathBuf> {
        let root = self
            .root(plugin_id)
            .ok_or_else(|| Error::load(plugin_id, "no module root registered"))?;

        let relative = Path::new(reference.as_str());
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(Error::load(
                plugin_id,
                format!("module '{}' escapes the plugin directory", reference),
            ));
        }

        let path = root.join(relative);
        if path.extension().is_some() {
            return Ok(path);
        }
        // 확장자 생략 시 .json → .toml 순서로 시도
        let json = path.with_extension("json");
        if json.exists() {
            return Ok(json);
        }
        Ok(path.with_extension("toml"))
    }
}

#[async_trait]
impl ModuleResolver for FsModuleResolver {
    async fn resolve(&self, plugin_id: &str, reference: &ModuleRef) -> Result<PluginModule> {
        let path = self.locate(plugin_id, reference)?;
        debug!(plugin_id, path = %path.display(), "Reading module");

        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            Error::load(plugin_id, format!("cannot read {}: {}", path.display(), e))
        })?;
        let value = parse_document(&content, DocumentFormat::from_path(&path))
            .map_err(|e| Error::load(plugin_id, format!("{}: {}", path.display(), e)))?;

        Ok(PluginModule::Data(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_static_resolver() {
        let resolver = StaticModuleResolver::new().with_data("leave", "routes", json!([]));
        resolver.insert_failure("leave", "menu", "import failed");

        let routes = resolver.resolve("leave", &"routes".into()).await.unwrap();
        assert_eq!(routes.into_data(), Some(json!([])));

        let err = resolver.resolve("leave", &"menu".into()).await.unwrap_err();
        assert!(err.to_string().contains("import failed"));

        let err = resolver.resolve("other", &"routes".into()).await.unwrap_err();
        assert!(err.to_string().contains("not found"));

        assert_eq!(resolver.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_static_resolver_stall() {
        let resolver = StaticModuleResolver::new();
        resolver.insert_stall("slow", "routes");

        let result = tokio::time::timeout(
            Duration::from_millis(20),
            resolver.resolve("slow", &"routes".into()),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fs_resolver() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("locales")).unwrap();
        std::fs::write(dir.path().join("routes.json"), r#"[{ "path": "/a", "component": "A" }]"#).unwrap();
        std::fs::write(dir.path().join("locales/en.toml"), "title = \"Leave\"\n").unwrap();

        let resolver = FsModuleResolver::new();
        resolver.set_root("leave", dir.path());

        let routes = resolver.resolve("leave", &"routes.json".into()).await.unwrap();
        assert_eq!(routes.into_data().unwrap()[0]["path"], "/a");

        let bundle = resolver.resolve("leave", &"locales/en".into()).await.unwrap();
        assert_eq!(bundle.into_data().unwrap(), json!({ "title": "Leave" }));

        assert!(resolver.resolve("leave", &"../secret.json".into()).await.is_err());
        assert!(resolver.resolve("leave", &"missing.json".into()).await.is_err());
        assert!(resolver.resolve("ghost", &"routes.json".into()).await.is_err());
    }
}
