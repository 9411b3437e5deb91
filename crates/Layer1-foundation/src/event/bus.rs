//! Event Bus - 플러그인 간 발행/구독
//!
//! 같은 프로세스 안에서만 동작하는 동기 이벤트 버스입니다.
//!
//! - 전달은 `emit` 호출 컨텍스트에서 등록 순서대로 동기 실행
//! - 핸들러가 `Err` 를 반환하거나 panic 해도 나머지 핸들러는 계속 호출
//! - `on`/`once` 는 항상 [`Subscription`] 을 반환 (해제용)
//! - 핸들러 안에서 다시 `emit` 하는 체인은 `max_depth` 로 제한

use super::types::{names, Event};
use crate::Result;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::cell::Cell;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, trace, warn};

/// 이벤트 핸들러
pub type EventHandler = Arc<dyn Fn(&Event) -> Result<()> + Send + Sync>;

// ============================================================================
// ListenerId / Subscription
// ============================================================================

/// 이벤트 리스너 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// 구독 핸들
///
/// `unsubscribe()` 를 호출해야 리스너가 제거됩니다. 핸들을 drop 해도
/// 리스너는 남아있으므로, 재초기화가 있는 곳에서는 반드시 보관했다가 해제합니다.
#[must_use = "store the subscription and call unsubscribe() on teardown"]
#[derive(Debug)]
pub struct Subscription {
    bus: Weak<BusInner>,
    event: String,
    id: ListenerId,
}

impl Subscription {
    /// 리스너 ID
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// 구독한 이벤트 이름
    pub fn event(&self) -> &str {
        &self.event
    }

    /// 리스너 해제. 이미 제거됐거나 버스가 사라졌으면 false
    pub fn unsubscribe(self) -> bool {
        match self.bus.upgrade() {
            Some(inner) => inner.remove(&self.event, self.id),
            None => false,
        }
    }
}

// ============================================================================
// EventBusConfig
// ============================================================================

/// 이벤트 버스 설정
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// 이벤트 히스토리 보관 개수
    pub history_size: usize,

    /// 핸들러 안에서 중첩 emit 할 수 있는 최대 깊이
    pub max_depth: usize,

    /// 디버그 모드 (모든 이벤트 로깅)
    pub debug_mode: bool,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            history_size: 100,
            max_depth: 8,
            debug_mode: false,
        }
    }
}

// ============================================================================
// EventBus
// ============================================================================

struct RegisteredListener {
    id: ListenerId,
    handler: EventHandler,
    once: bool,
    owner: Option<String>,
}

struct BusInner {
    config: EventBusConfig,
    listeners: RwLock<HashMap<String, Vec<RegisteredListener>>>,
    listener_counter: AtomicU64,
    history: Mutex<VecDeque<Event>>,
    event_count: AtomicU64,
}

impl BusInner {
    fn remove(&self, event: &str, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let Some(list) = listeners.get_mut(event) else {
            return false;
        };
        let before = list.len();
        list.retain(|l| l.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            listeners.remove(event);
        }
        if removed {
            debug!(listener_id = %id, event, "Unregistered event listener");
        }
        removed
    }
}

thread_local! {
    static EMIT_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// 중첩 emit 깊이 카운터 (drop 시 감소)
struct DepthGuard;

impl DepthGuard {
    fn enter(max_depth: usize) -> Option<Self> {
        EMIT_DEPTH.with(|depth| {
            if depth.get() >= max_depth {
                None
            } else {
                depth.set(depth.get() + 1);
                Some(DepthGuard)
            }
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        EMIT_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// 이벤트 버스
///
/// 복제 비용이 낮은 핸들이며, 복제본은 같은 리스너 목록을 공유합니다.
///
/// ## 사용법
///
/// ```ignore
/// let bus = EventBus::new();
///
/// let sub = bus.on("leave:approved", |event| {
///     println!("approved: {}", event.payload);
///     Ok(())
/// });
///
/// bus.emit("leave:approved", json!({ "requestId": 7 }));
///
/// sub.unsubscribe();
/// ```
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// 기본 설정으로 이벤트 버스 생성
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// 커스텀 설정으로 이벤트 버스 생성
    pub fn with_config(config: EventBusConfig) -> Self {
        Self {
            inner: Arc::new(BusInner {
                config,
                listeners: RwLock::new(HashMap::new()),
                listener_counter: AtomicU64::new(0),
                history: Mutex::new(VecDeque::new()),
                event_count: AtomicU64::new(0),
            }),
        }
    }

    // ========================================================================
    // 구독
    // ========================================================================

    /// 리스너 등록 (`"*"` 은 모든 이벤트)
    pub fn on<F>(&self, event: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(&Event) -> Result<()> + Send + Sync + 'static,
    {
        self.register(event.into(), Arc::new(handler), false, None)
    }

    /// 한 번만 호출되는 리스너 등록
    pub fn once<F>(&self, event: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(&Event) -> Result<()> + Send + Sync + 'static,
    {
        self.register(event.into(), Arc::new(handler), true, None)
    }

    /// 소유자 태그와 함께 리스너 등록 (`remove_owner` 로 일괄 해제)
    pub fn on_owned(
        &self,
        event: impl Into<String>,
        owner: impl Into<String>,
        handler: EventHandler,
    ) -> Subscription {
        self.register(event.into(), handler, false, Some(owner.into()))
    }

    /// 비동기 리스너 등록
    ///
    /// 버스 입장에서는 fire-and-forget 입니다. 현재 tokio 런타임에 태스크를
    /// 띄우며, 런타임 밖에서 emit 되면 해당 호출은 에러로 기록됩니다.
    pub fn on_async<F, Fut>(&self, event: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: EventHandler = Arc::new(move |event: &Event| {
            let handle = tokio::runtime::Handle::try_current()
                .map_err(|e| crate::Error::Internal(format!("no async runtime: {}", e)))?;
            handle.spawn(handler(event.clone()));
            Ok(())
        });
        self.register(event.into(), handler, false, None)
    }

    fn register(
        &self,
        event: String,
        handler: EventHandler,
        once: bool,
        owner: Option<String>,
    ) -> Subscription {
        let id = ListenerId(self.inner.listener_counter.fetch_add(1, Ordering::SeqCst));

        debug!(listener_id = %id, event = %event, once, "Registering event listener");

        self.inner
            .listeners
            .write()
            .entry(event.clone())
            .or_default()
            .push(RegisteredListener {
                id,
                handler,
                once,
                owner,
            });

        Subscription {
            bus: Arc::downgrade(&self.inner),
            event,
            id,
        }
    }

    /// 리스너 해제 (ID 로)
    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        self.inner.remove(event, id)
    }

    /// 소유자가 등록한 리스너 전부 해제
    pub fn remove_owner(&self, owner: &str) -> usize {
        let mut listeners = self.inner.listeners.write();
        let mut removed = 0;
        for list in listeners.values_mut() {
            let before = list.len();
            list.retain(|l| l.owner.as_deref() != Some(owner));
            removed += before - list.len();
        }
        listeners.retain(|_, list| !list.is_empty());
        if removed > 0 {
            debug!(owner, removed, "Removed owned event listeners");
        }
        removed
    }

    // ========================================================================
    // 발행
    // ========================================================================

    /// 이벤트 발행. 정상 처리한 핸들러 수를 반환
    pub fn emit(&self, event: impl Into<String>, payload: Value) -> usize {
        self.publish(Event::new(event, payload))
    }

    /// 미리 만든 이벤트 발행
    pub fn publish(&self, event: Event) -> usize {
        let Some(_guard) = DepthGuard::enter(self.inner.config.max_depth) else {
            warn!(
                event = %event.name,
                max_depth = self.inner.config.max_depth,
                "Event chain too deep, dropping emit"
            );
            return 0;
        };

        let count = self.inner.event_count.fetch_add(1, Ordering::SeqCst);
        if self.inner.config.debug_mode {
            trace!(event_id = %event.id, event = %event.name, "Publishing event #{}", count + 1);
        }

        {
            let mut history = self.inner.history.lock();
            history.push_back(event.clone());
            while history.len() > self.inner.config.history_size {
                history.pop_front();
            }
        }

        let handlers = self.take_handlers(&event.name);

        let mut delivered = 0;
        for (id, handler) in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    warn!(
                        event = %event.name,
                        source = %event.source,
                        listener_id = %id,
                        error = %e,
                        "Event handler failed"
                    );
                }
                Err(_) => {
                    error!(
                        event = %event.name,
                        source = %event.source,
                        listener_id = %id,
                        "Event handler panicked"
                    );
                }
            }
        }

        delivered
    }

    /// 이번 발행에서 호출할 핸들러 스냅샷 (once 리스너는 여기서 제거)
    fn take_handlers(&self, event: &str) -> Vec<(ListenerId, EventHandler)> {
        let mut listeners = self.inner.listeners.write();
        let mut out = Vec::new();

        let mut keys = vec![event];
        if event != names::WILDCARD {
            keys.push(names::WILDCARD);
        }

        for key in keys {
            if let Some(list) = listeners.get_mut(key) {
                out.extend(list.iter().map(|l| (l.id, Arc::clone(&l.handler))));
                list.retain(|l| !l.once);
                if list.is_empty() {
                    listeners.remove(key);
                }
            }
        }

        out
    }

    // ========================================================================
    // 조회
    // ========================================================================

    /// 특정 이벤트의 리스너 수
    pub fn listener_count(&self, event: &str) -> usize {
        self.inner
            .listeners
            .read()
            .get(event)
            .map_or(0, Vec::len)
    }

    /// 전체 리스너 수
    pub fn total_listeners(&self) -> usize {
        self.inner.listeners.read().values().map(Vec::len).sum()
    }

    /// 최근 이벤트 히스토리 (최신순)
    pub fn history(&self, limit: Option<usize>) -> Vec<Event> {
        let history = self.inner.history.lock();
        let limit = limit.unwrap_or(history.len());
        history.iter().rev().take(limit).cloned().collect()
    }

    /// 총 발행된 이벤트 수
    pub fn event_count(&self) -> u64 {
        self.inner.event_count.load(Ordering::SeqCst)
    }

    /// 모든 리스너와 히스토리 제거
    pub fn clear(&self) {
        self.inner.listeners.write().clear();
        self.inner.history.lock().clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.total_listeners())
            .field("event_count", &self.event_count())
            .finish()
    }
}

// ============================================================================
// 테스트
// ============================================================================
