//! Dependency Resolver - 의존성 그래프와 로드 순서
//!
//! Kahn 알고리즘. 제약이 없는 플러그인끼리는 입력 순서를 유지합니다.
//! 모든 함수는 순수 함수입니다.

use super::manifest::PluginManifest;
use super::validator::VersionRange;
use erp_foundation::DependencyError;
use semver::Version;
use std::collections::{BTreeSet, HashMap, HashSet};

/// 부분 해석 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// 로드 가능한 플러그인 (의존성 뒤에 위치)
    pub order: Vec<String>,

    /// 제외된 플러그인별 에러
    pub failures: Vec<DependencyError>,
}

impl Resolution {
    /// 제외된 플러그인 ID 집합
    pub fn excluded(&self) -> HashSet<String> {
        self.failures.iter().flat_map(|f| f.implicated()).collect()
    }
}

// ============================================================================
// Graph
// ============================================================================

struct Graph<'a> {
    ids: Vec<&'a str>,
    /// i 가 의존하는 노드들 (선언 순서)
    deps: Vec<Vec<usize>>,
    /// 그래프 구성 중 발견된 Missing / VersionMismatch
    failures: Vec<(usize, DependencyError)>,
}

impl<'a> Graph<'a> {
    fn build(manifests: &'a [PluginManifest]) -> Self {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut nodes: Vec<&PluginManifest> = Vec::new();
        for manifest in manifests {
            // 중복 ID 는 첫 번째만 사용
            if !index.contains_key(manifest.id.as_str()) {
                index.insert(manifest.id.as_str(), nodes.len());
                nodes.push(manifest);
            }
        }

        let mut deps = vec![Vec::new(); nodes.len()];
        let mut failures = Vec::new();

        for (i, manifest) in nodes.iter().enumerate() {
            for dep in &manifest.dependencies {
                let Some(&target) = index.get(dep.id.as_str()) else {
                    if !dep.optional {
                        failures.push((
                            i,
                            DependencyError::Missing {
                                plugin: manifest.id.clone(),
                                missing: dep.id.clone(),
                            },
                        ));
                    }
                    continue;
                };

                if let Some(required) = &dep.version {
                    if !version_satisfies(required, &nodes[target].version) {
                        if !dep.optional {
                            failures.push((
                                i,
                                DependencyError::VersionMismatch {
                                    plugin: manifest.id.clone(),
                                    dependency: dep.id.clone(),
                                    required: required.clone(),
                                    found: nodes[target].version.clone(),
                                },
                            ));
                        }
                        continue;
                    }
                }

                if target != i && !deps[i].contains(&target) {
                    deps[i].push(target);
                }
            }
        }

        Self {
            ids: nodes.iter().map(|m| m.id.as_str()).collect(),
            deps,
            failures,
        }
    }

    fn dependents(&self) -> Vec<Vec<usize>> {
        let mut dependents = vec![Vec::new(); self.ids.len()];
        for (i, deps) in self.deps.iter().enumerate() {
            for &d in deps {
                dependents[d].push(i);
            }
        }
        dependents
    }
}

fn version_satisfies(range: &str, version: &str) -> bool {
    match (VersionRange::parse(range), Version::parse(version.trim())) {
        (Ok(range), Ok(version)) => range.matches(&version),
        _ => false,
    }
}

// ============================================================================
// 해석
// ============================================================================

/// 제외 가능한 플러그인을 빼고 나머지의 순서를 계산
pub fn resolve_partial(manifests: &[PluginManifest]) -> Resolution {
    let graph = Graph::build(manifests);
    let n = graph.ids.len();
    let dependents = graph.dependents();

    let mut excluded = vec![false; n];
    let mut failures = Vec::new();

    for (i, failure) in graph.failures {
        if !excluded[i] {
            excluded[i] = true;
            failures.push(failure);
        }
    }
    propagate_unavailable(&graph.deps, &dependents, &graph.ids, &mut excluded, &mut failures);

    // Kahn (입력 순서가 가장 빠른 준비 노드부터)
    let mut in_degree: Vec<usize> = (0..n)
        .map(|i| graph.deps[i].len())
        .collect();
    let mut ready: BTreeSet<usize> = (0..n)
        .filter(|&i| !excluded[i] && in_degree[i] == 0)
        .collect();
    let mut emitted = vec![false; n];
    let mut order = Vec::with_capacity(n);

    while let Some(i) = ready.pop_first() {
        emitted[i] = true;
        order.push(graph.ids[i].to_string());
        for &d in &dependents[i] {
            in_degree[d] -= 1;
            if in_degree[d] == 0 && !excluded[d] {
                ready.insert(d);
            }
        }
    }

    // 남은 노드는 순환에 속하거나 순환에 의존
    loop {
        let Some(start) = (0..n).find(|&i| !emitted[i] && !excluded[i]) else {
            break;
        };

        let members = find_cycle(start, &graph.deps, &emitted, &excluded);
        for &m in &members {
            excluded[m] = true;
        }
        failures.push(DependencyError::Cycle {
            members: members.iter().map(|&m| graph.ids[m].to_string()).collect(),
        });
        propagate_unavailable(&graph.deps, &dependents, &graph.ids, &mut excluded, &mut failures);
    }

    Resolution { order, failures }
}

/// 순수 해석: 첫 번째 실패를 에러로 반환
pub fn resolve(manifests: &[PluginManifest]) -> Result<Vec<String>, DependencyError> {
    let mut resolution = resolve_partial(manifests);
    if resolution.failures.is_empty() {
        Ok(resolution.order)
    } else {
        Err(resolution.failures.remove(0))
    }
}

/// 제외된 노드에 (직간접) 의존하는 노드를 Unavailable 로 제외
fn propagate_unavailable(
    deps: &[Vec<usize>],
    dependents: &[Vec<usize>],
    ids: &[&str],
    excluded: &mut [bool],
    failures: &mut Vec<DependencyError>,
) {
    let mut queue: Vec<usize> = (0..excluded.len()).filter(|&i| excluded[i]).collect();
    while let Some(failed) = queue.pop() {
        for &d in &dependents[failed] {
            if excluded[d] {
                continue;
            }
            // 제외된 의존성 중 선언 순서상 첫 번째를 보고
            let dependency = deps[d]
                .iter()
                .find(|&&x| excluded[x])
                .map(|&x| ids[x])
                .unwrap_or(ids[failed]);
            excluded[d] = true;
            failures.push(DependencyError::Unavailable {
                plugin: ids[d].to_string(),
                dependency: dependency.to_string(),
            });
            queue.push(d);
        }
    }
}

/// start 에서 출발해 남은 의존성을 따라가며 순환을 찾음 (발견 순서)
fn find_cycle(start: usize, deps: &[Vec<usize>], emitted: &[bool], excluded: &[bool]) -> Vec<usize> {
    let mut path: Vec<usize> = Vec::new();
    let mut position: HashMap<usize, usize> = HashMap::new();
    let mut current = start;

    loop {
        if let Some(&at) = position.get(&current) {
            return path[at..].to_vec();
        }
        position.insert(current, path.len());
        path.push(current);

        // Kahn 이후 남은 노드는 남은 의존성을 최소 하나 가짐
        match deps[current]
            .iter()
            .copied()
            .find(|&d| !emitted[d] && !excluded[d])
        {
            Some(next) => current = next,
            None => return vec![current],
        }
    }
}

/// 순서를 동시 로드 가능한 단계로 묶음
///
/// 같은 단계의 플러그인끼리는 의존 관계가 없습니다.
pub fn levels(order: &[String], manifests: &[PluginManifest]) -> Vec<Vec<String>> {
    let by_id: HashMap<&str, &PluginManifest> =
        manifests.iter().map(|m| (m.id.as_str(), m)).collect();
    let mut level_of: HashMap<&str, usize> = HashMap::new();
    let mut levels: Vec<Vec<String>> = Vec::new();

    for id in order {
        let level = by_id
            .get(id.as_str())
            .map(|m| {
                m.dependencies
                    .iter()
                    .filter_map(|d| level_of.get(d.id.as_str()))
                    .map(|l| l + 1)
                    .max()
                    .unwrap_or(0)
            })
            .unwrap_or(0);

        level_of.insert(id.as_str(), level);
        if levels.len() <= level {
            levels.resize_with(level + 1, Vec::new);
        }
        levels[level].push(id.clone());
    }

    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::manifest::PluginDependency;

    fn plugin(id: &str, deps: &[&str]) -> PluginManifest {
        deps.iter().fold(PluginManifest::new(id, id, "1.0.0"), |m, d| {
            m.with_dependency(PluginDependency::new(*d))
        })
    }

    fn position(order: &[String], id: &str) -> usize {
        order.iter().position(|x| x == id).unwrap()
    }

    #[test]
    fn test_dependencies_come_first() {
        let manifests = vec![plugin("b", &["a"]), plugin("a", &[])];
        assert_eq!(resolve(&manifests).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_stable_for_independent_plugins() {
        let manifests = vec![plugin("c", &[]), plugin("a", &[]), plugin("b", &[])];
        assert_eq!(resolve(&manifests).unwrap(), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_topological_property() {
        let manifests = vec![
            plugin("reports", &["leave", "payroll"]),
            plugin("payroll", &["employees"]),
            plugin("leave", &["employees"]),
            plugin("employees", &[]),
            plugin("audit", &[]),
        ];
        let order = resolve(&manifests).unwrap();
        assert_eq!(order.len(), 5);
        for m in &manifests {
            for d in &m.dependencies {
                assert!(position(&order, &d.id) < position(&order, &m.id));
            }
        }
    }

    #[test]
    fn test_missing_dependency() {
        let manifests = vec![plugin("a", &["ghost"]), plugin("b", &[])];
        let err = resolve(&manifests).unwrap_err();
        assert_eq!(
            err,
            DependencyError::Missing {
                plugin: "a".into(),
                missing: "ghost".into()
            }
        );

        let partial = resolve_partial(&manifests);
        assert_eq!(partial.order, vec!["b"]);
    }

    #[test]
    fn test_cycle_reported_with_members() {
        let manifests = vec![
            plugin("x", &[]),
            plugin("a", &["b"]),
            plugin("b", &["c"]),
            plugin("c", &["a"]),
            plugin("d", &["a"]),
        ];

        let err = resolve(&manifests).unwrap_err();
        assert_eq!(
            err,
            DependencyError::Cycle {
                members: vec!["a".into(), "b".into(), "c".into()]
            }
        );

        let partial = resolve_partial(&manifests);
        assert_eq!(partial.order, vec!["x"]);
        assert!(partial.failures.contains(&DependencyError::Unavailable {
            plugin: "d".into(),
            dependency: "a".into()
        }));
        assert_eq!(partial.excluded().len(), 4);
    }

    #[test]
    fn test_dependents_of_missing_are_unavailable() {
        let manifests = vec![plugin("a", &["ghost"]), plugin("b", &["a"]), plugin("c", &["b"])];
        let partial = resolve_partial(&manifests);

        assert!(partial.order.is_empty());
        assert_eq!(partial.failures.len(), 3);
        assert!(partial.failures.contains(&DependencyError::Unavailable {
            plugin: "c".into(),
            dependency: "b".into()
        }));
    }

    #[test]
    fn test_optional_dependency() {
        let with_optional = PluginManifest::new("b", "b", "1.0.0")
            .with_dependency(PluginDependency::new("a").optional())
            .with_dependency(PluginDependency::new("ghost").optional());

        let manifests = vec![with_optional.clone(), plugin("a", &[])];
        assert_eq!(resolve(&manifests).unwrap(), vec!["a", "b"]);
        assert_eq!(resolve(&[with_optional]).unwrap(), vec!["b"]);
    }

    #[test]
    fn test_version_mismatch() {
        let b = PluginManifest::new("b", "b", "1.0.0")
            .with_dependency(PluginDependency::new("a").with_version("^2.0.0"));
        let err = resolve(&[plugin("a", &[]), b]).unwrap_err();
        assert!(matches!(err, DependencyError::VersionMismatch { ref found, .. } if found == "1.0.0"));
    }

    #[test]
    fn test_levels() {
        let manifests = vec![
            plugin("a", &[]),
            plugin("b", &["a"]),
            plugin("c", &[]),
            plugin("d", &["b", "c"]),
        ];
        let order = resolve(&manifests).unwrap();
        let levels = levels(&order, &manifests);
        assert_eq!(
            levels,
            vec![vec!["a".to_string(), "c".into()], vec!["b".into()], vec!["d".into()]]
        );
    }
}
