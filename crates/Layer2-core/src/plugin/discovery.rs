//! Plugin Catalog - 패키지 식별자로 매니페스트 찾기
//!
//! - `StaticCatalog`: 코드에서 직접 등록 (라이프사이클 구현 포함 가능)
//! - `FsCatalog`: 디렉토리에서 `*/plugin.json` 또는 `*/plugin.toml` 스캔

use super::manifest::PluginManifest;
use super::module::FsModuleResolver;
use super::traits::PluginLifecycle;
use erp_foundation::config::read_typed;
use erp_foundation::Result;
use parking_lot::RwLock;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

/// 매니페스트 파일 이름 (우선순위 순)
pub const MANIFEST_FILES: [&str; 2] = ["plugin.json", "plugin.toml"];

// ============================================================================
// PluginPackage
// ============================================================================

/// 설치 가능한 플러그인 패키지
#[derive(Clone)]
pub struct PluginPackage {
    /// 패키지 식별자
    pub name: String,

    pub manifest: PluginManifest,

    /// 라이프사이클 구현 (없으면 모든 훅이 no-op)
    pub lifecycle: Option<Arc<dyn PluginLifecycle>>,

    /// 패키지 디렉토리 (파일 시스템 카탈로그)
    pub root: Option<PathBuf>,
}

impl PluginPackage {
    pub fn new(name: impl Into<String>, manifest: PluginManifest) -> Self {
        Self {
            name: name.into(),
            manifest,
            lifecycle: None,
            root: None,
        }
    }

    pub fn with_lifecycle(mut self, lifecycle: Arc<dyn PluginLifecycle>) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }
}

impl fmt::Debug for PluginPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginPackage")
            .field("name", &self.name)
            .field("id", &self.manifest.id)
            .field("lifecycle", &self.lifecycle.is_some())
            .field("root", &self.root)
            .finish()
    }
}

// ============================================================================
// PluginCatalog trait
// ============================================================================

/// 패키지 카탈로그
pub trait PluginCatalog: Send + Sync {
    /// 패키지 식별자로 조회
    fn package(&self, name: &str) -> Option<PluginPackage>;

    /// 알려진 패키지 식별자 목록
    fn packages(&self) -> Vec<String>;
}

// ============================================================================
// StaticCatalog
// ============================================================================

/// 메모리 카탈로그
#[derive(Default)]
pub struct StaticCatalog {
    packages: RwLock<Vec<PluginPackage>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 빌더 패턴: 매니페스트만 있는 패키지
    pub fn with_manifest(self, name: &str, manifest: PluginManifest) -> Self {
        self.insert(PluginPackage::new(name, manifest));
        self
    }

    /// 빌더 패턴: 패키지 추가
    pub fn with_package(self, package: PluginPackage) -> Self {
        self.insert(package);
        self
    }

    /// 같은 이름이 있으면 교체
    pub fn insert(&self, package: PluginPackage) {
        let mut packages = self.packages.write();
        packages.retain(|p| p.name != package.name);
        packages.push(package);
    }
}

impl PluginCatalog for StaticCatalog {
    fn package(&self, name: &str) -> Option<PluginPackage> {
        self.packages.read().iter().find(|p| p.name == name).cloned()
    }

    fn packages(&self) -> Vec<String> {
        self.packages.read().iter().map(|p| p.name.clone()).collect()
    }
}

// ============================================================================
// FsCatalog
// ============================================================================

/// 디렉토리 기반 카탈로그
///
/// `<dir>/<package>/plugin.json` 구조. 패키지 식별자는 디렉토리 이름이며
/// 매니페스트 ID 로도 찾을 수 있습니다.
pub struct FsCatalog {
    packages: Vec<PluginPackage>,
}

impl FsCatalog {
    /// 디렉토리 스캔. 읽을 수 없는 매니페스트는 경고 후 건너뜀
    pub async fn scan(dir: &Path) -> Result<Self> {
        let mut packages = Vec::new();
        let mut entries = fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let Some(manifest_path) = MANIFEST_FILES
                .iter()
                .map(|name| path.join(name))
                .find(|p| p.exists())
            else {
                continue;
            };

            match read_typed::<PluginManifest>(&manifest_path) {
                Ok(manifest) => {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| manifest.id.clone());
                    debug!(package = %name, plugin_id = %manifest.id, "Found plugin at {:?}", path);
                    packages.push(PluginPackage {
                        name,
                        manifest,
                        lifecycle: None,
                        root: Some(path),
                    });
                }
                Err(e) => {
                    warn!("Failed to parse plugin manifest {:?}: {}", manifest_path, e);
                }
            }
        }

        // read_dir 순서는 플랫폼마다 다름
        packages.sort_by(|a, b| a.name.cmp(&b.name));

        info!("Discovered {} plugins in {}", packages.len(), dir.display());
        Ok(Self { packages })
    }

    /// 스캔한 패키지 디렉토리를 루트로 하는 모듈 해석기
    pub fn module_resolver(&self) -> FsModuleResolver {
        let resolver = FsModuleResolver::new();
        for package in &self.packages {
            if let Some(root) = &package.root {
                resolver.set_root(package.manifest.id.clone(), root.clone());
            }
        }
        resolver
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

impl PluginCatalog for FsCatalog {
    fn package(&self, name: &str) -> Option<PluginPackage> {
        self.packages
            .iter()
            .find(|p| p.name == name)
            .or_else(|| self.packages.iter().find(|p| p.manifest.id == name))
            .cloned()
    }

    fn packages(&self) -> Vec<String> {
        self.packages.iter().map(|p| p.name.clone()).collect()
    }
}
