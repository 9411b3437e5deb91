//! Plugin Registry - 플러그인 저장소
//!
//! 매니페스트와 배포 항목을 보관하고, 등록 시점에 설정 오버라이드와
//! 번역 오버라이드를 병합해 둡니다. 조회는 절대 실패하지 않습니다.

use super::deployment::PluginEntry;
use super::manifest::PluginManifest;
use super::types::{LoadedPlugin, PluginStatus};
use crate::i18n::{expand_overrides, LocaleOverrides};
use erp_foundation::util::deep_merge;
use erp_foundation::{Error, Result};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// 레지스트리 레코드
struct RegistryRecord {
    plugin: LoadedPlugin,
    entry: PluginEntry,
    merged_config: Value,
    localization: LocaleOverrides,
}

#[derive(Default)]
struct RegistryInner {
    records: HashMap<String, RegistryRecord>,
    /// 등록 순서
    order: Vec<String>,
}

/// 플러그인 레지스트리 - 모든 플러그인 레코드 관리
#[derive(Default)]
pub struct PluginRegistry {
    inner: RwLock<RegistryInner>,
}

impl PluginRegistry {
    /// 새 레지스트리 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 플러그인 등록
    ///
    /// 같은 ID 가 이미 있으면 경고 후 거부하고 기존 등록을 유지합니다.
    pub fn register(&self, entry: PluginEntry, manifest: PluginManifest) -> Result<()> {
        let id = manifest.id.clone();
        let mut inner = self.inner.write();

        if inner.records.contains_key(&id) {
            warn!(plugin_id = %id, package = %entry.package, "Plugin is already registered, ignoring duplicate");
            return Err(Error::InvalidInput(format!(
                "plugin '{}' is already registered",
                id
            )));
        }

        let merged_config = match &entry.config {
            Some(overlay) => deep_merge(&manifest.config.defaults, overlay),
            None => manifest.config.defaults.clone(),
        };
        let localization = expand_overrides(&id, &entry.localization);

        let mut plugin = LoadedPlugin::new(manifest, entry.package.clone());
        plugin.enabled = entry.enabled;
        plugin.config = merged_config.clone();

        info!(plugin_id = %id, version = %plugin.manifest.version, "Registered plugin");

        inner.order.push(id.clone());
        inner.records.insert(
            id,
            RegistryRecord {
                plugin,
                entry,
                merged_config,
                localization,
            },
        );
        Ok(())
    }

    /// 플러그인 등록 해제
    pub fn unregister(&self, id: &str) -> Option<LoadedPlugin> {
        let mut inner = self.inner.write();
        let record = inner.records.remove(id)?;
        inner.order.retain(|x| x != id);
        info!(plugin_id = %id, "Unregistered plugin");
        Some(record.plugin)
    }

    /// 플러그인 조회
    pub fn get(&self, id: &str) -> Option<LoadedPlugin> {
        self.inner.read().records.get(id).map(|r| r.plugin.clone())
    }

    /// 모든 플러그인 (등록 순서)
    pub fn get_all(&self) -> Vec<LoadedPlugin> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.records.get(id))
            .map(|r| r.plugin.clone())
            .collect()
    }

    pub fn manifest(&self, id: &str) -> Option<PluginManifest> {
        self.inner.read().records.get(id).map(|r| r.plugin.manifest.clone())
    }

    pub fn entry(&self, id: &str) -> Option<PluginEntry> {
        self.inner.read().records.get(id).map(|r| r.entry.clone())
    }

    /// 매니페스트 기본값 ← 배포 오버라이드
    pub fn merged_config(&self, id: &str) -> Option<Value> {
        self.inner.read().records.get(id).map(|r| r.merged_config.clone())
    }

    /// 확장된 번역 오버라이드 (locale → namespace → 중첩 객체)
    pub fn localization_overrides(&self, id: &str) -> Option<LocaleOverrides> {
        self.inner.read().records.get(id).map(|r| r.localization.clone())
    }

    pub fn status(&self, id: &str) -> Option<PluginStatus> {
        self.inner.read().records.get(id).map(|r| r.plugin.status)
    }

    /// 플러그인 상태 설정
    pub fn set_status(&self, id: &str, status: PluginStatus) -> bool {
        self.update(id, |plugin| plugin.status = status)
    }

    /// 레코드 수정
    pub fn update<F>(&self, id: &str, f: F) -> bool
    where
        F: FnOnce(&mut LoadedPlugin),
    {
        let mut inner = self.inner.write();
        match inner.records.get_mut(id) {
            Some(record) => {
                f(&mut record.plugin);
                debug!(plugin_id = %id, status = %record.plugin.status, "Updated plugin record");
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.read().records.contains_key(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.inner.read().order.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.records.clear();
        inner.order.clear();
    }
}
