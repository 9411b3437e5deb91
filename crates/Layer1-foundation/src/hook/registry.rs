//! Hook Registry 구현

use crate::Result;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, warn};

/// 훅 콜백
///
/// 첫 인자는 filter 호출에서는 현재 값, action 호출에서는 `Value::Null`.
pub type HookCallback = Arc<dyn Fn(Value, &[Value]) -> Result<Value> + Send + Sync>;

/// 등록된 콜백 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

impl std::fmt::Display for HookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "hook-{}", self.0)
    }
}

struct RegisteredHook {
    id: HookId,
    priority: i32,
    callback: HookCallback,
    owner: Option<String>,
}

struct HookInner {
    hooks: RwLock<HashMap<String, Vec<RegisteredHook>>>,
    counter: AtomicU64,
}

impl HookInner {
    fn remove(&self, hook: &str, id: HookId) -> bool {
        let mut hooks = self.hooks.write();
        let Some(list) = hooks.get_mut(hook) else {
            return false;
        };
        let before = list.len();
        list.retain(|h| h.id != id);
        let removed = before != list.len();
        if list.is_empty() {
            hooks.remove(hook);
        }
        removed
    }
}

/// 훅 등록 핸들 (`unregister()` 로 해제)
#[must_use = "store the registration and call unregister() on teardown"]
#[derive(Debug)]
pub struct HookRegistration {
    registry: Weak<HookInner>,
    hook: String,
    id: HookId,
}

impl HookRegistration {
    pub fn id(&self) -> HookId {
        self.id
    }

    pub fn hook(&self) -> &str {
        &self.hook
    }

    /// 콜백 해제
    pub fn unregister(self) -> bool {
        match self.registry.upgrade() {
            Some(inner) => inner.remove(&self.hook, self.id),
            None => false,
        }
    }
}

/// 훅 레지스트리
#[derive(Clone)]
pub struct HookRegistry {
    inner: Arc<HookInner>,
}

impl HookRegistry {
    /// 새 레지스트리 생성
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HookInner {
                hooks: RwLock::new(HashMap::new()),
                counter: AtomicU64::new(0),
            }),
        }
    }

    // ========================================================================
    // 등록
    // ========================================================================

    /// 콜백 등록 (priority 가 클수록 먼저 호출)
    pub fn register<F>(&self, hook: impl Into<String>, priority: i32, callback: F) -> HookRegistration
    where
        F: Fn(Value, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.insert(hook.into(), priority, Arc::new(callback), None)
    }

    /// 소유자 태그와 함께 등록 (`remove_owner` 로 일괄 해제)
    pub fn register_owned(
        &self,
        hook: impl Into<String>,
        owner: impl Into<String>,
        priority: i32,
        callback: HookCallback,
    ) -> HookRegistration {
        self.insert(hook.into(), priority, callback, Some(owner.into()))
    }

    fn insert(
        &self,
        hook: String,
        priority: i32,
        callback: HookCallback,
        owner: Option<String>,
    ) -> HookRegistration {
        let id = HookId(self.inner.counter.fetch_add(1, Ordering::SeqCst));

        let mut hooks = self.inner.hooks.write();
        let list = hooks.entry(hook.clone()).or_default();

        // 같은 우선순위 뒤에 넣어서 등록 순서 유지
        let position = list
            .iter()
            .position(|h| h.priority < priority)
            .unwrap_or(list.len());
        list.insert(
            position,
            RegisteredHook {
                id,
                priority,
                callback,
                owner,
            },
        );

        debug!(hook = %hook, hook_id = %id, priority, "Registered hook callback");

        HookRegistration {
            registry: Arc::downgrade(&self.inner),
            hook,
            id,
        }
    }

    /// 특정 훅의 모든 콜백 제거
    pub fn remove_all(&self, hook: &str) -> usize {
        self.inner
            .hooks
            .write()
            .remove(hook)
            .map_or(0, |list| list.len())
    }

    /// 소유자가 등록한 콜백 전부 제거
    pub fn remove_owner(&self, owner: &str) -> usize {
        let mut hooks = self.inner.hooks.write();
        let mut removed = 0;
        for list in hooks.values_mut() {
            let before = list.len();
            list.retain(|h| h.owner.as_deref() != Some(owner));
            removed += before - list.len();
        }
        hooks.retain(|_, list| !list.is_empty());
        removed
    }

    // ========================================================================
    // 호출
    // ========================================================================

    fn snapshot(&self, hook: &str) -> Vec<(HookId, HookCallback)> {
        self.inner
            .hooks
            .read()
            .get(hook)
            .map(|list| list.iter().map(|h| (h.id, Arc::clone(&h.callback))).collect())
            .unwrap_or_default()
    }

    /// action 호출: 실패한 콜백의 결과는 빠짐
    pub fn invoke(&self, hook: &str, args: &[Value]) -> Vec<Value> {
        let mut results = Vec::new();

        for (id, callback) in self.snapshot(hook) {
            match catch_unwind(AssertUnwindSafe(|| callback(Value::Null, args))) {
                Ok(Ok(value)) => results.push(value),
                Ok(Err(e)) => {
                    warn!(hook, hook_id = %id, error = %e, "Hook callback failed");
                }
                Err(_) => {
                    error!(hook, hook_id = %id, "Hook callback panicked");
                }
            }
        }

        results
    }

    /// filter 호출: 실패한 콜백은 건너뛰고 직전 값을 그대로 넘김
    pub fn apply_filter(&self, hook: &str, value: Value, args: &[Value]) -> Value {
        let mut current = value;

        for (id, callback) in self.snapshot(hook) {
            let input = current.clone();
            match catch_unwind(AssertUnwindSafe(|| callback(input, args))) {
                Ok(Ok(next)) => current = next,
                Ok(Err(e)) => {
                    warn!(hook, hook_id = %id, error = %e, "Filter callback failed, keeping previous value");
                }
                Err(_) => {
                    error!(hook, hook_id = %id, "Filter callback panicked, keeping previous value");
                }
            }
        }

        current
    }

    // ========================================================================
    // 조회
    // ========================================================================

    /// 콜백이 하나라도 있는지
    pub fn has(&self, hook: &str) -> bool {
        self.count(hook) > 0
    }

    /// 등록된 콜백 수
    pub fn count(&self, hook: &str) -> usize {
        self.inner.hooks.read().get(hook).map_or(0, Vec::len)
    }

    /// 등록된 훅 이름 목록 (정렬됨)
    pub fn hook_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.hooks.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hooks", &self.hook_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use serde_json::json;

    #[test]
    fn test_priority_order() {
        let hooks = HookRegistry::new();
        let _a = hooks.register("h", 1, |_, _| Ok(json!(1)));
        let _b = hooks.register("h", 5, |_, _| Ok(json!(5)));
        let _c = hooks.register("h", 3, |_, _| Ok(json!(3)));

        assert_eq!(hooks.invoke("h", &[]), vec![json!(5), json!(3), json!(1)]);
    }

    #[test]
    fn test_equal_priority_keeps_registration_order() {
        let hooks = HookRegistry::new();
        let _a = hooks.register("h", 0, |_, _| Ok(json!("first")));
        let _b = hooks.register("h", 2, |_, _| Ok(json!("high")));
        let _c = hooks.register("h", 0, |_, _| Ok(json!("second")));
        let _d = hooks.register("h", 0, |_, _| Ok(json!("third")));

        assert_eq!(
            hooks.invoke("h", &[]),
            vec![json!("high"), json!("first"), json!("second"), json!("third")]
        );
    }

    #[test]
    fn test_filter_chain() {
        let hooks = HookRegistry::new();
        let _a = hooks.register("total", 0, |v, _| Ok(json!(v.as_i64().unwrap_or(0) * 2)));
        let _b = hooks.register("total", 10, |v, args| {
            let add = args.first().and_then(Value::as_i64).unwrap_or(0);
            Ok(json!(v.as_i64().unwrap_or(0) + add))
        });

        // (1 + 4) * 2
        assert_eq!(hooks.apply_filter("total", json!(1), &[json!(4)]), json!(10));
    }

    #[test]
    fn test_filter_failure_keeps_previous_value() {
        let hooks = HookRegistry::new();
        let _a = hooks.register("f", 3, |v, _| Ok(json!(format!("{}-a", v.as_str().unwrap_or("")))));
        let _b = hooks.register("f", 2, |_, _| Err(Error::Internal("broken".into())));
        let _c = hooks.register("f", 1, |_, _| panic!("also broken"));
        let _d = hooks.register("f", 0, |v, _| Ok(json!(format!("{}-d", v.as_str().unwrap_or("")))));

        assert_eq!(hooks.apply_filter("f", json!("x"), &[]), json!("x-a-d"));
    }

    #[test]
    fn test_action_omits_failed_results() {
        let hooks = HookRegistry::new();
        let _a = hooks.register("act", 0, |_, _| Ok(json!("ok")));
        let _b = hooks.register("act", 0, |_, _| Err(Error::Internal("no".into())));

        assert_eq!(hooks.invoke("act", &[]), vec![json!("ok")]);
    }

    #[test]
    fn test_unregister_and_owner_removal() {
        let hooks = HookRegistry::new();
        let reg = hooks.register("h", 0, |_, _| Ok(Value::Null));
        let cb: HookCallback = Arc::new(|_: Value, _: &[Value]| -> Result<Value> { Ok(Value::Null) });
        let _o1 = hooks.register_owned("h", "leave", 0, Arc::clone(&cb));
        let _o2 = hooks.register_owned("other", "leave", 0, cb);

        assert_eq!(hooks.count("h"), 2);
        assert!(reg.unregister());
        assert_eq!(hooks.remove_owner("leave"), 2);
        assert!(!hooks.has("h"));
        assert!(!hooks.has("other"));
    }

    #[test]
    fn test_unknown_hook() {
        let hooks = HookRegistry::new();
        assert!(hooks.invoke("missing", &[]).is_empty());
        assert_eq!(hooks.apply_filter("missing", json!(7), &[]), json!(7));
    }
}
