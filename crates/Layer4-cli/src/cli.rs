//! Non-interactive commands
//!
//! `check` 는 모듈을 읽지 않고 검증과 의존성 해석만 수행하고, 나머지
//! 명령은 배포 설정 전체를 초기화한 뒤 결과를 출력합니다.

use anyhow::{anyhow, Context};
use erp_core::plugin::resolve_partial;
use erp_core::{
    CoreSettings, DeploymentConfig, FsCatalog, HostSnapshot, LoadedPlugin, MenuItem, Permission,
    PluginCatalog, PluginHost, PluginManager, PluginValidator, Route, Widget,
};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

// ============================================================================
// check
// ============================================================================

/// 패키지별 점검 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckLine {
    pub package: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// ok | missing | rejected | excluded
    pub verdict: &'static str,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    pub core_version: String,
    pub plugins: Vec<CheckLine>,

    /// 해석된 로드 순서
    pub order: Vec<String>,
}

impl CheckReport {
    pub fn passed(&self) -> bool {
        self.plugins.iter().all(|line| line.verdict == "ok")
    }
}

/// 매니페스트 검증 + 의존성 해석
pub async fn check(catalog_dir: &Path, deployment_path: &Path, settings: &CoreSettings) -> anyhow::Result<CheckReport> {
    let catalog = FsCatalog::scan(catalog_dir)
        .await
        .with_context(|| format!("scanning catalog {}", catalog_dir.display()))?;
    let deployment = DeploymentConfig::load(deployment_path)
        .with_context(|| format!("reading deployment {}", deployment_path.display()))?;
    deployment.validate()?;

    let validator = PluginValidator::new(&settings.core_version)?;
    let mut report = CheckReport {
        core_version: settings.core_version.clone(),
        ..Default::default()
    };
    let mut candidates = Vec::new();

    for entry in &deployment.plugins {
        let Some(package) = catalog.package(&entry.package) else {
            report.plugins.push(CheckLine {
                package: entry.package.clone(),
                id: None,
                version: None,
                verdict: "missing",
                messages: vec![format!("package '{}' not found", entry.package)],
            });
            continue;
        };

        let manifest = package.manifest;
        let validation = validator.validate(&manifest);
        debug!(plugin = %manifest.id, valid = validation.valid, "Manifest checked");

        report.plugins.push(CheckLine {
            package: entry.package.clone(),
            id: Some(manifest.id.clone()),
            version: Some(manifest.version.clone()),
            verdict: if validation.valid { "ok" } else { "rejected" },
            messages: validation.errors,
        });
        if validation.valid {
            candidates.push(manifest);
        }
    }

    let resolution = resolve_partial(&candidates);
    for failure in &resolution.failures {
        for id in failure.implicated() {
            if let Some(line) = report
                .plugins
                .iter_mut()
                .find(|line| line.id.as_deref() == Some(id.as_str()))
            {
                line.verdict = "excluded";
                line.messages.push(failure.to_string());
            }
        }
    }
    report.order = resolution.order;

    Ok(report)
}

// ============================================================================
// Session
// ============================================================================

/// 초기화된 배포 설정
pub struct Session {
    host: PluginHost,
}

impl Session {
    pub async fn open(catalog_dir: &Path, deployment_path: &Path, settings: CoreSettings) -> anyhow::Result<Self> {
        let catalog = FsCatalog::scan(catalog_dir)
            .await
            .with_context(|| format!("scanning catalog {}", catalog_dir.display()))?;
        let deployment = DeploymentConfig::load(deployment_path)
            .with_context(|| format!("reading deployment {}", deployment_path.display()))?;

        let resolver = Arc::new(catalog.module_resolver());
        let manager = PluginManager::new(settings, Arc::new(catalog), resolver)?;
        let host = PluginHost::new(Arc::new(manager));
        host.start(deployment).await?;

        Ok(Self { host })
    }

    pub fn plugins(&self) -> Vec<LoadedPlugin> {
        self.host.manager().get_all_plugins()
    }

    pub fn snapshot(&self) -> HostSnapshot {
        self.host.snapshot()
    }

    pub fn config(&self, id: &str, path: Option<&str>) -> anyhow::Result<Value> {
        if self.host.plugin(id).is_none() {
            return Err(anyhow!("unknown plugin '{}'", id));
        }
        let value = match path {
            Some(path) => self.host.plugin_config_value(id, path),
            None => self.host.plugin_config(id),
        };
        value.ok_or_else(|| anyhow!("no configuration at '{}' for plugin '{}'", path.unwrap_or(""), id))
    }

    pub fn translate(&self, locale: &str, namespace: &str, key: &str) -> String {
        self.host.manager().translate(locale, namespace, key)
    }
}

// ============================================================================
// Output
// ============================================================================

/// 표 또는 JSON 출력
pub struct Output {
    pub json: bool,
}

impl Output {
    pub fn check(&self, report: &CheckReport) -> anyhow::Result<()> {
        if self.json {
            return print_json(report);
        }

        println!("core {}\n", report.core_version);
        println!("{:<24} {:<20} {:<10} {:<10}", "Package", "Plugin", "Version", "Result");
        println!("{}", "-".repeat(70));
        for line in &report.plugins {
            println!(
                "{:<24} {:<20} {:<10} {:<10}",
                truncate(&line.package, 24),
                truncate(line.id.as_deref().unwrap_or("-"), 20),
                line.version.as_deref().unwrap_or("-"),
                line.verdict
            );
            for message in &line.messages {
                println!("    {}", message);
            }
        }
        println!("\nload order: {}", report.order.join(" -> "));
        Ok(())
    }

    pub fn plugins(&self, plugins: &[LoadedPlugin]) -> anyhow::Result<()> {
        if self.json {
            let rows: Vec<PluginRow> = plugins.iter().map(PluginRow::from).collect();
            return print_json(&rows);
        }

        println!("{:<20} {:<10} {:<10} {:<40}", "Plugin", "Version", "Status", "Error");
        println!("{}", "-".repeat(80));
        for plugin in plugins {
            let error = plugin.error.as_ref().map(|e| e.to_string()).unwrap_or_default();
            println!(
                "{:<20} {:<10} {:<10} {:<40}",
                truncate(&plugin.id, 20),
                plugin.manifest.version,
                plugin.status.to_string(),
                truncate(&error, 40)
            );
            for warning in &plugin.warnings {
                println!("    ! {}", warning);
            }
        }
        Ok(())
    }

    pub fn routes(&self, routes: &[Route]) -> anyhow::Result<()> {
        if self.json {
            return print_json(&routes);
        }
        println!("{:<30} {:<30} {:<20}", "Path", "Component", "Plugin");
        println!("{}", "-".repeat(80));
        for route in routes {
            println!(
                "{:<30} {:<30} {:<20}",
                truncate(&route.path, 30),
                truncate(&route.component, 30),
                route.plugin_id
            );
        }
        Ok(())
    }

    pub fn menu(&self, items: &[MenuItem]) -> anyhow::Result<()> {
        if self.json {
            return print_json(&items);
        }
        println!("{:<6} {:<24} {:<30} {:<20}", "Order", "Label", "Path", "Plugin");
        println!("{}", "-".repeat(80));
        for item in items {
            let indent = if item.parent.is_some() { "  " } else { "" };
            println!(
                "{:<6} {:<24} {:<30} {:<20}",
                item.order,
                truncate(&format!("{}{}", indent, item.label), 24),
                truncate(item.path.as_deref().unwrap_or("-"), 30),
                item.plugin_id
            );
        }
        Ok(())
    }

    pub fn widgets(&self, widgets: &[Widget]) -> anyhow::Result<()> {
        if self.json {
            return print_json(&widgets);
        }
        println!("{:<24} {:<30} {:<8} {:<16}", "Widget", "Component", "Size", "Plugin");
        println!("{}", "-".repeat(80));
        for widget in widgets {
            println!(
                "{:<24} {:<30} {:<8} {:<16}",
                truncate(&widget.id, 24),
                truncate(&widget.component, 30),
                widget.size.as_deref().unwrap_or("-"),
                widget.plugin_id
            );
        }
        Ok(())
    }

    pub fn permissions(&self, permissions: &[Permission]) -> anyhow::Result<()> {
        if self.json {
            return print_json(&permissions);
        }
        println!("{:<28} {:<16} {:<36}", "Code", "Plugin", "Roles");
        println!("{}", "-".repeat(80));
        for permission in permissions {
            println!(
                "{:<28} {:<16} {:<36}",
                truncate(&permission.code, 28),
                permission.plugin_id,
                permission.roles.join(", ")
            );
        }
        Ok(())
    }

    /// 설정 값은 형식과 무관하게 JSON
    pub fn value(&self, value: &Value) -> anyhow::Result<()> {
        print_json(value)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PluginRow {
    id: String,
    package: String,
    version: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
}

impl From<&LoadedPlugin> for PluginRow {
    fn from(plugin: &LoadedPlugin) -> Self {
        Self {
            id: plugin.id.clone(),
            package: plugin.package.clone(),
            version: plugin.manifest.version.clone(),
            status: plugin.status.to_string(),
            error: plugin.error.as_ref().map(|e| e.to_string()),
            warnings: plugin.warnings.clone(),
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Truncate a string for display
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    fn write_plugin(root: &Path, dir: &str, manifest: Value) {
        let plugin_dir = root.join(dir);
        fs::create_dir_all(&plugin_dir).unwrap();
        fs::write(plugin_dir.join("plugin.json"), manifest.to_string()).unwrap();
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let plugins = dir.path().join("plugins");

        write_plugin(
            &plugins,
            "hr-core",
            json!({ "id": "hr-core", "name": "HR Core", "version": "1.0.0", "coreVersion": ">=1.0.0" }),
        );
        write_plugin(
            &plugins,
            "leave",
            json!({
                "id": "leave",
                "name": "Leave",
                "version": "1.2.0",
                "dependencies": [{ "id": "hr-core", "version": "^1.0.0" }],
                "config": { "defaults": { "approval": { "levels": 2 } } },
                "frontend": { "routes": "routes.json" }
            }),
        );
        fs::write(
            plugins.join("leave").join("routes.json"),
            r#"[{ "path": "leave", "component": "LeaveList" }]"#,
        )
        .unwrap();
        write_plugin(
            &plugins,
            "future",
            json!({ "id": "future", "name": "Future", "version": "1.0.0", "coreVersion": "^9.0.0" }),
        );

        fs::write(
            dir.path().join("deployment.json"),
            json!({ "plugins": [{ "package": "leave" }, { "package": "hr-core" }] }).to_string(),
        )
        .unwrap();
        dir
    }

    fn settings() -> CoreSettings {
        CoreSettings::with_core_version("1.5.0")
    }

    #[tokio::test]
    async fn test_check_passes_and_orders() {
        let dir = fixture();
        let report = check(&dir.path().join("plugins"), &dir.path().join("deployment.json"), &settings())
            .await
            .unwrap();

        assert!(report.passed());
        assert_eq!(report.order, vec!["hr-core", "leave"]);
    }

    #[tokio::test]
    async fn test_check_flags_rejected_and_dependents() {
        let dir = fixture();
        fs::write(
            dir.path().join("deployment.json"),
            json!({ "plugins": [{ "package": "future" }, { "package": "leave" }, { "package": "ghost" }] })
                .to_string(),
        )
        .unwrap();

        let report = check(&dir.path().join("plugins"), &dir.path().join("deployment.json"), &settings())
            .await
            .unwrap();

        assert!(!report.passed());
        let verdicts: Vec<_> = report.plugins.iter().map(|l| (l.package.as_str(), l.verdict)).collect();
        assert_eq!(
            verdicts,
            vec![("future", "rejected"), ("leave", "excluded"), ("ghost", "missing")]
        );
        assert!(report.order.is_empty());
    }

    #[tokio::test]
    async fn test_session_routes_and_config() {
        let dir = fixture();
        let session = Session::open(&dir.path().join("plugins"), &dir.path().join("deployment.json"), settings())
            .await
            .unwrap();

        let routes = session.snapshot().routes;
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].path, "/leave");
        assert_eq!(session.config("leave", Some("approval.levels")).unwrap(), json!(2));
        assert!(session.config("ghost", None).is_err());
        assert!(session.config("leave", Some("approval.missing")).is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a-very-long-plugin-id", 10), "a-very-...");
    }
}
