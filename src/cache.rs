//! 依赖查询缓存
//!
//! 以 (查询名, 依赖值序列) 为键缓存查询结果，向上层提供：
//! - 依赖门控：任一依赖缺失时查询保持空闲，不发请求
//! - 并发合流：同键的并发订阅只触发一次抓取
//! - 新鲜期与过期重验证：过期条目先返回旧数据，后台刷新一次
//! - 级联失效：下游查询把上游值编进键里，上游一变键就变，
//!   自然挂到新条目上，不需要任何“通知子查询”的回调
//! - 过期结果丢弃：提交按代号校验，失效后到达的结果直接丢弃
//!
//! 失败的条目不自动重试，直到显式失效后重新订阅。

use crate::error::{ApiError, ApiResult};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, warn};

/// 默认新鲜期（五分钟）
pub const DEFAULT_FRESH_WINDOW: Duration = Duration::from_secs(300);

/// 查询依赖值
///
/// 缺失（None 或空串）的依赖会让查询保持空闲。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dep {
    Missing,
    Value(String),
}

impl Dep {
    pub fn is_present(&self) -> bool {
        matches!(self, Dep::Value(v) if !v.is_empty())
    }

    fn as_key_part(&self) -> &str {
        match self {
            Dep::Missing => "",
            Dep::Value(v) => v,
        }
    }
}

impl From<i64> for Dep {
    fn from(value: i64) -> Self {
        Dep::Value(value.to_string())
    }
}

impl From<Option<i64>> for Dep {
    fn from(value: Option<i64>) -> Self {
        match value {
            Some(n) => Dep::Value(n.to_string()),
            None => Dep::Missing,
        }
    }
}

impl From<&str> for Dep {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            Dep::Missing
        } else {
            Dep::Value(value.to_string())
        }
    }
}

impl From<String> for Dep {
    fn from(value: String) -> Self {
        if value.is_empty() {
            Dep::Missing
        } else {
            Dep::Value(value)
        }
    }
}

impl From<Option<String>> for Dep {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(s) => Dep::from(s),
            None => Dep::Missing,
        }
    }
}

/// 缓存键 = 查询名 + 有序依赖值
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    name: String,
    deps: Vec<String>,
}

impl CacheKey {
    fn new(name: &str, deps: &[Dep]) -> Self {
        Self {
            name: name.to_string(),
            deps: deps.iter().map(|d| d.as_key_part().to_string()).collect(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.name, self.deps.join(","))
    }
}

/// 订阅方看到的查询状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Idle,
    Pending,
    Fresh,
    Stale,
    Error,
}

/// 一次订阅返回的条目快照
#[derive(Debug)]
pub struct QuerySnapshot<T> {
    pub status: QueryStatus,
    pub data: Option<Arc<T>>,
    pub error: Option<ApiError>,
    pub fetched_at: Option<Instant>,
}

impl<T> QuerySnapshot<T> {
    fn idle() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            fetched_at: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.status == QueryStatus::Idle
    }

    /// 折叠成 Result：有数据（新鲜或过期）即成功
    pub fn into_result(self) -> ApiResult<Arc<T>> {
        if let Some(data) = self.data {
            return Ok(data);
        }
        match self.error {
            Some(err) => Err(err),
            None => Err(ApiError::transport("查询未就绪（依赖缺失或尚未执行）")),
        }
    }
}

impl<T> Clone for QuerySnapshot<T> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            fetched_at: self.fetched_at,
        }
    }
}

/// 条目槽位状态，Stale 由 Fresh + 新鲜期推导，不单独存储
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Vacant,
    Pending,
    Fresh,
    Error,
}

struct CacheEntry {
    state: SlotState,
    data: Option<Arc<dyn Any + Send + Sync>>,
    error: Option<ApiError>,
    fetched_at: Option<Instant>,
    /// 失效时自增，提交结果时校验，拦下迟到的旧抓取
    generation: u64,
    /// 过期重验证进行中，保证同一条目只刷新一次
    revalidating: bool,
    /// 状态变更广播，订阅方在锁内拿接收端，不会漏掉唤醒
    tick: watch::Sender<u64>,
}

impl CacheEntry {
    fn new() -> Self {
        let (tick, _) = watch::channel(0u64);
        Self {
            state: SlotState::Vacant,
            data: None,
            error: None,
            fetched_at: None,
            generation: 0,
            revalidating: false,
            tick,
        }
    }

    fn is_expired(&self, window: Duration) -> bool {
        self.fetched_at
            .map(|at| at.elapsed() >= window)
            .unwrap_or(true)
    }

    fn bump_tick(&self) {
        self.tick.send_modify(|v| *v = v.wrapping_add(1));
    }

    fn snapshot<T: Send + Sync + 'static>(&self, window: Duration) -> QuerySnapshot<T> {
        match self.state {
            SlotState::Vacant => QuerySnapshot::idle(),
            SlotState::Pending => QuerySnapshot {
                status: QueryStatus::Pending,
                data: None,
                error: None,
                fetched_at: None,
            },
            SlotState::Error => QuerySnapshot {
                status: QueryStatus::Error,
                data: None,
                error: self.error.clone(),
                fetched_at: None,
            },
            SlotState::Fresh => match self.data.clone().and_then(|d| d.downcast::<T>().ok()) {
                Some(typed) => QuerySnapshot {
                    status: if self.is_expired(window) {
                        QueryStatus::Stale
                    } else {
                        QueryStatus::Fresh
                    },
                    data: Some(typed),
                    error: None,
                    fetched_at: self.fetched_at,
                },
                None => QuerySnapshot {
                    status: QueryStatus::Error,
                    data: None,
                    error: Some(ApiError::parse("缓存条目与请求的类型不匹配")),
                    fetched_at: None,
                },
            },
        }
    }
}

/// 锁内决策的产物，锁释放后再执行抓取或等待
enum Step<T> {
    Ready(QuerySnapshot<T>),
    Wait(watch::Receiver<u64>),
    Fetch {
        generation: u64,
        rx: watch::Receiver<u64>,
    },
    Revalidate {
        generation: u64,
        snapshot: QuerySnapshot<T>,
    },
}

struct CacheInner {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    fresh_window: Duration,
}

impl CacheInner {
    fn lock_entries(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn commit(&self, key: &CacheKey, generation: u64, result: ApiResult<Arc<dyn Any + Send + Sync>>) {
        let mut entries = self.lock_entries();
        let entry = match entries.get_mut(key) {
            Some(entry) => entry,
            None => return,
        };
        if entry.generation != generation {
            debug!("🗑 丢弃过期抓取结果: {}", key);
            return;
        }
        match result {
            Ok(data) => {
                entry.state = SlotState::Fresh;
                entry.data = Some(data);
                entry.error = None;
                entry.fetched_at = Some(Instant::now());
            }
            Err(err) => {
                warn!("⚠️ 查询失败: {} -> {}", key, err);
                entry.state = SlotState::Error;
                entry.error = Some(err);
                entry.data = None;
                entry.fetched_at = None;
            }
        }
        entry.revalidating = false;
        entry.bump_tick();
    }
}

/// 依赖查询缓存，克隆句柄共享同一份状态
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

impl QueryCache {
    pub fn new(fresh_window: Duration) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: Mutex::new(HashMap::new()),
                fresh_window,
            }),
        }
    }

    /// 订阅一个查询
    ///
    /// # 参数
    /// - `name`: 查询名
    /// - `deps`: 有序依赖值，参与键组合
    /// - `fetch`: 抓取闭包，只在需要发请求时被调用
    ///
    /// # 返回
    /// 条目结算后的快照。依赖缺失时立即返回空闲快照；过期条目
    /// 立即返回旧数据并在后台刷新。
    pub async fn subscribe<T, F, Fut>(&self, name: &str, deps: &[Dep], fetch: F) -> QuerySnapshot<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        if !deps.iter().all(Dep::is_present) {
            return QuerySnapshot::idle();
        }
        let key = CacheKey::new(name, deps);

        let step = {
            let mut entries = self.inner.lock_entries();
            let entry = entries.entry(key.clone()).or_insert_with(CacheEntry::new);
            match entry.state {
                SlotState::Vacant => {
                    entry.state = SlotState::Pending;
                    Step::Fetch {
                        generation: entry.generation,
                        rx: entry.tick.subscribe(),
                    }
                }
                SlotState::Pending => Step::Wait(entry.tick.subscribe()),
                SlotState::Fresh => {
                    if entry.is_expired(self.inner.fresh_window) && !entry.revalidating {
                        entry.revalidating = true;
                        Step::Revalidate {
                            generation: entry.generation,
                            snapshot: entry.snapshot(self.inner.fresh_window),
                        }
                    } else {
                        Step::Ready(entry.snapshot(self.inner.fresh_window))
                    }
                }
                SlotState::Error => Step::Ready(entry.snapshot(self.inner.fresh_window)),
            }
        };

        match step {
            Step::Ready(snapshot) => snapshot,
            Step::Revalidate {
                generation,
                snapshot,
            } => {
                debug!("♻️ 条目过期，先用旧数据并后台刷新: {}", key);
                self.spawn_fetch(key, generation, fetch);
                snapshot
            }
            Step::Fetch { generation, rx } => {
                debug!("📦 新建缓存条目: {}", key);
                self.spawn_fetch(key.clone(), generation, fetch);
                self.wait_settled(key, rx).await
            }
            Step::Wait(rx) => self.wait_settled(key, rx).await,
        }
    }

    /// 显式失效一个条目，下次订阅会重新抓取
    pub fn invalidate(&self, name: &str, deps: &[Dep]) {
        let key = CacheKey::new(name, deps);
        let mut entries = self.inner.lock_entries();
        if let Some(entry) = entries.get_mut(&key) {
            entry.generation = entry.generation.wrapping_add(1);
            entry.state = SlotState::Vacant;
            entry.data = None;
            entry.error = None;
            entry.fetched_at = None;
            entry.revalidating = false;
            entry.bump_tick();
        }
    }

    /// 已结算（非空闲）条目数
    pub fn len(&self) -> usize {
        self.inner
            .lock_entries()
            .values()
            .filter(|e| e.state != SlotState::Vacant)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn spawn_fetch<T, F, Fut>(&self, key: CacheKey, generation: u64, fetch: F)
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        let inner = self.inner.clone();
        let fut = fetch();
        tokio::spawn(async move {
            let result = fut
                .await
                .map(|value| Arc::new(value) as Arc<dyn Any + Send + Sync>);
            inner.commit(&key, generation, result);
        });
    }

    async fn wait_settled<T: Send + Sync + 'static>(
        &self,
        key: CacheKey,
        mut rx: watch::Receiver<u64>,
    ) -> QuerySnapshot<T> {
        loop {
            if rx.changed().await.is_err() {
                // 发送端随缓存一起销毁，按未执行处理
                return QuerySnapshot::idle();
            }
            let snapshot = {
                let entries = self.inner.lock_entries();
                match entries.get(&key) {
                    Some(entry) if entry.state == SlotState::Pending => None,
                    Some(entry) => Some(entry.snapshot(self.inner.fresh_window)),
                    None => Some(QuerySnapshot::idle()),
                }
            };
            if let Some(snapshot) = snapshot {
                return snapshot;
            }
        }
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_FRESH_WINDOW)
    }
}
