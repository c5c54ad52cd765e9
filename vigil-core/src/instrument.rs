//! Higher-order wrappers that time and cache operations.
//!
//! Each wrapper takes the component it feeds explicitly; there is no global
//! monitor or cache.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

use crate::cache::CacheManager;
use crate::error::VigilError;
use crate::monitor::HostMetricsSource;
use crate::perf::{PerformanceMetric, PerformanceMonitor};

/// Records elapsed time when dropped, so a metric lands on success, error and panic.
struct TimingGuard<'a> {
    monitor: &'a PerformanceMonitor,
    name: &'a str,
    started: Instant,
    memory: Option<(&'a dyn HostMetricsSource, u64)>,
}

impl<'a> TimingGuard<'a> {
    fn start(monitor: &'a PerformanceMonitor, name: &'a str) -> Self {
        Self {
            monitor,
            name,
            started: Instant::now(),
            memory: None,
        }
    }

    fn with_memory(mut self, host: &'a dyn HostMetricsSource) -> Self {
        self.memory = host.process_memory_bytes().map(|before| (host, before));
        self
    }
}

impl Drop for TimingGuard<'_> {
    fn drop(&mut self) {
        let delta = self.memory.and_then(|(host, before)| {
            host.process_memory_bytes()
                .map(|after| after as i64 - before as i64)
        });

        self.monitor.record(
            PerformanceMetric::new(self.name, self.started.elapsed()).with_memory_delta(delta),
        );
    }
}

/// Run `op` and record its execution time under `name`.
///
/// The metric is recorded before the result (including an `Err`) is returned.
pub fn timed<T, E, F>(monitor: &PerformanceMonitor, name: &str, op: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
{
    let _guard = TimingGuard::start(monitor, name);
    op()
}

/// Like [`timed`], also recording the process memory delta when the host can report it.
pub fn timed_with_memory<T, E, F>(
    monitor: &PerformanceMonitor,
    host: &dyn HostMetricsSource,
    name: &str,
    op: F,
) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
{
    let _guard = TimingGuard::start(monitor, name).with_memory(host);
    op()
}

pub async fn timed_async<T, E, Fut>(
    monitor: &PerformanceMonitor,
    name: &str,
    future: Fut,
) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
{
    let _guard = TimingGuard::start(monitor, name);
    future.await
}

/// Return the cached value for `key`, or compute, store and return it.
pub fn cached<V, F>(cache: &CacheManager<V>, key: &str, ttl: Option<Duration>, op: F) -> V
where
    V: Clone,
    F: FnOnce() -> V,
{
    if let Some(hit) = cache.get(key) {
        return hit;
    }

    let value = op();
    store(cache, key, ttl, value.clone());
    value
}

/// Fallible variant of [`cached`]; errors are returned and not cached.
pub fn try_cached<V, E, F>(
    cache: &CacheManager<V>,
    key: &str,
    ttl: Option<Duration>,
    op: F,
) -> Result<V, E>
where
    V: Clone,
    F: FnOnce() -> Result<V, E>,
{
    if let Some(hit) = cache.get(key) {
        return Ok(hit);
    }

    let value = op()?;
    store(cache, key, ttl, value.clone());
    Ok(value)
}

pub async fn cached_async<V, E, Fut>(
    cache: &CacheManager<V>,
    key: &str,
    ttl: Option<Duration>,
    future: Fut,
) -> Result<V, E>
where
    V: Clone,
    Fut: Future<Output = Result<V, E>>,
{
    if let Some(hit) = cache.get(key) {
        return Ok(hit);
    }

    let value = future.await?;
    store(cache, key, ttl, value.clone());
    Ok(value)
}

fn store<V: Clone>(cache: &CacheManager<V>, key: &str, ttl: Option<Duration>, value: V) {
    match ttl {
        Some(ttl) => cache.set_with_ttl(key, value, ttl),
        None => cache.set(key, value),
    }
}

pub const DEFAULT_BATCH_WORKERS: usize = 10;

/// Run `op` over `items` in chunks of `batch_size`, at most `max_workers`
/// chunks at a time, and concatenate the results in input order.
///
/// Inputs no longer than `batch_size` go to `op` in one call without
/// spawning. The first failing chunk aborts the rest and its error is
/// returned. A panicking chunk resumes the panic on the caller.
pub async fn batch_process<T, R, E, F, Fut>(
    items: Vec<T>,
    batch_size: usize,
    max_workers: Option<usize>,
    op: F,
) -> Result<Vec<R>, E>
where
    T: Send + 'static,
    R: Send + 'static,
    E: From<VigilError> + Send + 'static,
    F: Fn(Vec<T>) -> Fut,
    Fut: Future<Output = Result<Vec<R>, E>> + Send + 'static,
{
    let batch_size = batch_size.max(1);
    if items.len() <= batch_size {
        return op(items).await;
    }

    let workers = max_workers.unwrap_or(DEFAULT_BATCH_WORKERS).max(1);
    let semaphore = Arc::new(Semaphore::new(workers));
    let mut tasks = JoinSet::new();

    let mut items = items.into_iter().peekable();
    let mut batch_count = 0;
    while items.peek().is_some() {
        let batch: Vec<T> = items.by_ref().take(batch_size).collect();
        let index = batch_count;
        batch_count += 1;

        let semaphore = Arc::clone(&semaphore);
        let work = op(batch);
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.map_err(|e| {
                E::from(VigilError::runtime(format!(
                    "failed to acquire batch worker: {}",
                    e
                )))
            })?;
            work.await.map(|results| (index, results))
        });
    }

    debug!(batches = batch_count, batch_size, workers, "Processing in batches");

    let mut ordered: Vec<Option<Vec<R>>> = (0..batch_count).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        let (index, results) = match joined {
            Ok(result) => result?,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                return Err(E::from(VigilError::runtime(format!(
                    "batch task cancelled: {}",
                    e
                ))))
            }
        };
        ordered[index] = Some(results);
    }

    Ok(ordered.into_iter().flatten().flatten().collect())
}

/// Drops calls that arrive sooner than `wait` after the last accepted one.
pub struct Debouncer {
    wait: Duration,
    last_called: Mutex<Option<Instant>>,
}

impl Debouncer {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            last_called: Mutex::new(None),
        }
    }

    pub fn call<T>(&self, op: impl FnOnce() -> T) -> Option<T> {
        {
            let mut last = self.last_called.lock();
            let now = Instant::now();
            if last.is_some_and(|at| now.duration_since(at) < self.wait) {
                return None;
            }
            *last = Some(now);
        }
        Some(op())
    }
}
