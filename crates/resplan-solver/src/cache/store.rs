// Copyright (c) 2025 Felix Kahle.
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE
// LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION
// WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use crate::cache::err::{CacheComputationError, CacheError};
use chrono::{DateTime, Utc};
use fxhash::FxHashMap;
use parking_lot::{Condvar, Mutex};
use resplan_core::prelude::Fingerprint;
use serde::{Deserialize, Serialize};
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

/// Approximate in-memory size of a cached value, in bytes.
pub trait Weigh {
    fn weight(&self) -> usize;
}

/// Memory budget enforced after every insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_bytes: Option<usize>,
    pub max_entries: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_bytes: Some(512 * 1024 * 1024),
            max_entries: None,
        }
    }
}

impl CacheConfig {
    /// No budget; entries live until evicted explicitly.
    #[inline]
    pub fn unbounded() -> Self {
        Self {
            max_bytes: None,
            max_entries: None,
        }
    }

    #[inline]
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    #[inline]
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub fingerprint: Fingerprint,
    pub label: String,
    pub computed_at: DateTime<Utc>,
    pub compute_time: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Drop least recently used entries until both limits hold.
    LeastRecentlyUsed {
        max_bytes: Option<usize>,
        max_entries: Option<usize>,
    },
    /// Drop every entry that is not leased.
    Unpinned,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionReport {
    pub evicted: Vec<Fingerprint>,
    pub freed_bytes: usize,
    /// Leased entries that were kept although the policy selected them.
    pub skipped_pinned: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub bytes: usize,
    pub pinned: usize,
    pub hits: u64,
    pub misses: u64,
    pub computations: u64,
    pub failures: u64,
    pub coalesced_waits: u64,
    pub evictions: u64,
}

struct Entry<V> {
    value: V,
    provenance: Arc<Provenance>,
    weight: usize,
    last_access: u64,
}

type FlightResult<V> = Option<Result<V, CacheComputationError>>;

/// A computation in progress; waiters park on `done`.
struct Flight<V> {
    state: Mutex<FlightResult<V>>,
    done: Condvar,
}

impl<V: Clone> Flight<V> {
    fn new() -> Self {
        Self {
            state: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    fn publish(&self, result: Result<V, CacheComputationError>) {
        *self.state.lock() = Some(result);
        self.done.notify_all();
    }

    fn wait(&self) -> Result<V, CacheComputationError> {
        let mut state = self.state.lock();
        loop {
            if let Some(result) = state.as_ref() {
                return result.clone();
            }
            self.done.wait(&mut state);
        }
    }
}

enum Slot<V> {
    Ready(Entry<V>),
    InFlight(Arc<Flight<V>>),
}

struct Inner<V> {
    slots: FxHashMap<Fingerprint, Slot<V>>,
    pins: FxHashMap<Fingerprint, usize>,
    tick: u64,
    bytes: usize,
    ready: usize,
    closed: bool,
}

impl<V> Inner<V> {
    fn is_pinned(&self, fp: &Fingerprint) -> bool {
        self.pins.get(fp).is_some_and(|&n| n > 0)
    }

    fn remove_ready(&mut self, fp: &Fingerprint) -> Option<usize> {
        match self.slots.get(fp) {
            Some(Slot::Ready(_)) => {}
            _ => return None,
        }
        match self.slots.remove(fp) {
            Some(Slot::Ready(e)) => {
                self.bytes -= e.weight;
                self.ready -= 1;
                Some(e.weight)
            }
            _ => None,
        }
    }

    fn evict(&mut self, policy: EvictionPolicy) -> EvictionReport {
        let mut candidates: Vec<(u64, Fingerprint)> = self
            .slots
            .iter()
            .filter_map(|(fp, slot)| match slot {
                Slot::Ready(e) => Some((e.last_access, *fp)),
                Slot::InFlight(_) => None,
            })
            .collect();
        candidates.sort_unstable();

        let mut report = EvictionReport::default();
        for (_, fp) in candidates {
            if let EvictionPolicy::LeastRecentlyUsed {
                max_bytes,
                max_entries,
            } = policy
            {
                let bytes_ok = max_bytes.is_none_or(|m| self.bytes <= m);
                let entries_ok = max_entries.is_none_or(|m| self.ready <= m);
                if bytes_ok && entries_ok {
                    break;
                }
            }
            if self.is_pinned(&fp) {
                report.skipped_pinned += 1;
                continue;
            }
            if let Some(freed) = self.remove_ready(&fp) {
                report.freed_bytes += freed;
                report.evicted.push(fp);
            }
        }
        report
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    computations: AtomicU64,
    failures: AtomicU64,
    coalesced_waits: AtomicU64,
    evictions: AtomicU64,
}

impl Counters {
    #[inline]
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Content-addressed store with at most one computation per fingerprint.
///
/// The map lock is held only for bookkeeping, never while a value is being
/// computed, so unrelated fingerprints compute in parallel. Callers that
/// request a fingerprint already in flight block on that flight alone and
/// receive the leader's value or error.
pub struct ArtifactCache<V> {
    inner: Mutex<Inner<V>>,
    config: CacheConfig,
    counters: Counters,
}

impl<V> std::fmt::Debug for ArtifactCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ArtifactCache")
            .field("entries", &inner.ready)
            .field("bytes", &inner.bytes)
            .field("closed", &inner.closed)
            .field("config", &self.config)
            .finish()
    }
}

impl<V> Default for ArtifactCache<V>
where
    V: Clone + Send + Sync + Weigh,
{
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

/// Clears the in-flight slot if the leader unwinds before publishing.
struct FlightGuard<'a, V: Clone + Send + Sync + Weigh> {
    cache: &'a ArtifactCache<V>,
    fingerprint: Fingerprint,
    label: &'a str,
    flight: Arc<Flight<V>>,
    armed: bool,
}

impl<'a, V: Clone + Send + Sync + Weigh> Drop for FlightGuard<'a, V> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.cache.inner.lock().slots.remove(&self.fingerprint);
        Counters::bump(&self.cache.counters.failures);
        self.flight.publish(Err(CacheComputationError::new(
            self.fingerprint,
            self.label,
            "computation panicked",
        )));
    }
}

impl<V> ArtifactCache<V>
where
    V: Clone + Send + Sync + Weigh,
{
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                slots: FxHashMap::default(),
                pins: FxHashMap::default(),
                tick: 0,
                bytes: 0,
                ready: 0,
                closed: false,
            }),
            config,
            counters: Counters::default(),
        }
    }

    #[inline]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns the value stored under `fingerprint`, computing it with
    /// `compute` if absent. A failed computation stores nothing.
    pub fn get_or_compute<F, E>(
        &self,
        fingerprint: Fingerprint,
        label: &str,
        compute: F,
    ) -> Result<V, CacheError>
    where
        F: FnOnce() -> Result<V, E>,
        E: std::fmt::Display,
    {
        let flight = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return Err(CacheError::Closed);
            }
            inner.tick += 1;
            let tick = inner.tick;
            match inner.slots.get_mut(&fingerprint) {
                Some(Slot::Ready(entry)) => {
                    entry.last_access = tick;
                    Counters::bump(&self.counters.hits);
                    return Ok(entry.value.clone());
                }
                Some(Slot::InFlight(flight)) => {
                    let flight = Arc::clone(flight);
                    drop(inner);
                    Counters::bump(&self.counters.coalesced_waits);
                    return flight.wait().map_err(CacheError::from);
                }
                None => {
                    Counters::bump(&self.counters.misses);
                    let flight = Arc::new(Flight::new());
                    inner
                        .slots
                        .insert(fingerprint, Slot::InFlight(Arc::clone(&flight)));
                    flight
                }
            }
        };

        let mut guard = FlightGuard {
            cache: self,
            fingerprint,
            label,
            flight: Arc::clone(&flight),
            armed: true,
        };

        let started = Instant::now();
        let result = {
            let _span =
                tracing::debug_span!("compute", label, fingerprint = %fingerprint.short()).entered();
            compute()
        };
        let elapsed = started.elapsed();
        Counters::bump(&self.counters.computations);

        let result = match result {
            Ok(value) => {
                self.store(fingerprint, label, value.clone(), elapsed);
                tracing::debug!(label, fingerprint = %fingerprint.short(), ?elapsed, "Cached artifact");
                Ok(value)
            }
            Err(e) => {
                self.inner.lock().slots.remove(&fingerprint);
                Counters::bump(&self.counters.failures);
                tracing::debug!(label, fingerprint = %fingerprint.short(), error = %e, "Artifact computation failed");
                Err(CacheComputationError::new(fingerprint, label, e.to_string()))
            }
        };

        guard.armed = false;
        flight.publish(result.clone());
        result.map_err(CacheError::from)
    }

    fn store(&self, fingerprint: Fingerprint, label: &str, value: V, compute_time: Duration) {
        let weight = value.weight();
        let mut inner = self.inner.lock();
        if inner.closed {
            inner.slots.remove(&fingerprint);
            return;
        }
        inner.tick += 1;
        let entry = Entry {
            value,
            provenance: Arc::new(Provenance {
                fingerprint,
                label: label.to_string(),
                computed_at: Utc::now(),
                compute_time,
            }),
            weight,
            last_access: inner.tick,
        };
        inner.slots.insert(fingerprint, Slot::Ready(entry));
        inner.bytes += weight;
        inner.ready += 1;

        if self.config.max_bytes.is_some() || self.config.max_entries.is_some() {
            let report = inner.evict(EvictionPolicy::LeastRecentlyUsed {
                max_bytes: self.config.max_bytes,
                max_entries: self.config.max_entries,
            });
            self.record_evictions(&report);
        }
    }

    fn record_evictions(&self, report: &EvictionReport) {
        if !report.evicted.is_empty() {
            self.counters
                .evictions
                .fetch_add(report.evicted.len() as u64, Ordering::Relaxed);
            tracing::debug!(
                evicted = report.evicted.len(),
                freed_bytes = report.freed_bytes,
                "Evicted cache entries"
            );
        }
    }

    /// The stored value, without computing and without touching recency.
    pub fn peek(&self, fingerprint: &Fingerprint) -> Option<V> {
        match self.inner.lock().slots.get(fingerprint) {
            Some(Slot::Ready(e)) => Some(e.value.clone()),
            _ => None,
        }
    }

    #[inline]
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        matches!(
            self.inner.lock().slots.get(fingerprint),
            Some(Slot::Ready(_))
        )
    }

    pub fn provenance(&self, fingerprint: &Fingerprint) -> Option<Arc<Provenance>> {
        match self.inner.lock().slots.get(fingerprint) {
            Some(Slot::Ready(e)) => Some(Arc::clone(&e.provenance)),
            _ => None,
        }
    }

    /// Pins `fingerprints` against eviction until the lease is dropped.
    pub fn lease<I>(&self, fingerprints: I) -> CacheLease<'_, V>
    where
        I: IntoIterator<Item = Fingerprint>,
    {
        let fingerprints: Vec<Fingerprint> = fingerprints.into_iter().collect();
        let mut inner = self.inner.lock();
        for fp in &fingerprints {
            *inner.pins.entry(*fp).or_insert(0) += 1;
        }
        CacheLease {
            cache: self,
            fingerprints,
        }
    }

    fn release(&self, fingerprints: &[Fingerprint]) {
        let mut inner = self.inner.lock();
        for fp in fingerprints {
            if let Some(n) = inner.pins.get_mut(fp) {
                *n -= 1;
                if *n == 0 {
                    inner.pins.remove(fp);
                }
            }
        }
    }

    pub fn evict(&self, policy: EvictionPolicy) -> EvictionReport {
        let report = self.inner.lock().evict(policy);
        self.record_evictions(&report);
        report
    }

    /// Evicts every unleased entry.
    #[inline]
    pub fn drain(&self) -> EvictionReport {
        self.evict(EvictionPolicy::Unpinned)
    }

    /// Stops serving requests and drains unleased entries.
    pub fn close(&self) -> EvictionReport {
        self.inner.lock().closed = true;
        tracing::debug!("Closing artifact cache");
        self.drain()
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let c = &self.counters;
        CacheStats {
            entries: inner.ready,
            bytes: inner.bytes,
            pinned: inner.pins.len(),
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            computations: c.computations.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
            coalesced_waits: c.coalesced_waits.load(Ordering::Relaxed),
            evictions: c.evictions.load(Ordering::Relaxed),
        }
    }
}

/// RAII pin on a set of cache entries.
pub struct CacheLease<'a, V>
where
    V: Clone + Send + Sync + Weigh,
{
    cache: &'a ArtifactCache<V>,
    fingerprints: Vec<Fingerprint>,
}

impl<'a, V> CacheLease<'a, V>
where
    V: Clone + Send + Sync + Weigh,
{
    #[inline]
    pub fn fingerprints(&self) -> &[Fingerprint] {
        &self.fingerprints
    }
}

impl<'a, V> Drop for CacheLease<'a, V>
where
    V: Clone + Send + Sync + Weigh,
{
    fn drop(&mut self) {
        self.cache.release(&self.fingerprints);
    }
}

impl<'a, V> std::fmt::Debug for CacheLease<'a, V>
where
    V: Clone + Send + Sync + Weigh,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheLease")
            .field("fingerprints", &self.fingerprints.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resplan_core::prelude::CanonicalEncoder;
    use std::sync::{Barrier, atomic::AtomicUsize};

    #[derive(Debug, Clone, PartialEq)]
    struct Blob(Arc<Vec<u8>>);

    impl Weigh for Blob {
        fn weight(&self) -> usize {
            self.0.len()
        }
    }

    fn blob(n: usize) -> Blob {
        Blob(Arc::new(vec![0; n]))
    }

    fn fp(n: u64) -> Fingerprint {
        CanonicalEncoder::new("test").u64(n).finish()
    }

    fn ok(n: usize) -> impl FnOnce() -> Result<Blob, String> {
        move || Ok(blob(n))
    }

    #[test]
    fn concurrent_callers_share_one_computation() {
        const N: usize = 16;
        let cache: ArtifactCache<Blob> = ArtifactCache::new(CacheConfig::unbounded());
        let calls = AtomicUsize::new(0);
        let barrier = Barrier::new(N);

        let results: Vec<Blob> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..N)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        cache
                            .get_or_compute(fp(1), "blob", || {
                                calls.fetch_add(1, Ordering::SeqCst);
                                std::thread::sleep(Duration::from_millis(50));
                                Ok::<_, String>(blob(8))
                            })
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|b| Arc::ptr_eq(&b.0, &results[0].0)));
        let stats = cache.stats();
        assert_eq!(stats.computations, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits + stats.coalesced_waits, (N - 1) as u64);
    }

    #[test]
    fn failures_are_shared_and_not_stored() {
        const N: usize = 8;
        let cache: ArtifactCache<Blob> = ArtifactCache::new(CacheConfig::unbounded());
        let calls = AtomicUsize::new(0);
        let barrier = Barrier::new(N);

        let errors: Vec<CacheError> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..N)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        cache
                            .get_or_compute(fp(2), "blob", || {
                                calls.fetch_add(1, Ordering::SeqCst);
                                std::thread::sleep(Duration::from_millis(50));
                                Err::<Blob, _>("disk on fire")
                            })
                            .unwrap_err()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(errors.iter().all(|e| *e == errors[0]));
        assert!(matches!(&errors[0], CacheError::Computation(e) if e.message() == "disk on fire"));
        assert!(!cache.contains(&fp(2)));

        let retried = cache.get_or_compute(fp(2), "blob", ok(4)).unwrap();
        assert_eq!(retried.weight(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.contains(&fp(2)));
    }

    #[test]
    fn panicking_computation_releases_waiters() {
        let cache: ArtifactCache<Blob> = ArtifactCache::new(CacheConfig::unbounded());
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = cache.get_or_compute(fp(3), "blob", || -> Result<Blob, String> {
                panic!("boom")
            });
        }));
        assert!(outcome.is_err());
        assert!(!cache.contains(&fp(3)));
        assert!(cache.get_or_compute(fp(3), "blob", ok(1)).is_ok());
    }

    #[test]
    fn unrelated_fingerprints_compute_in_parallel() {
        let cache: ArtifactCache<Blob> = ArtifactCache::new(CacheConfig::unbounded());
        let barrier = Barrier::new(2);
        std::thread::scope(|s| {
            for i in 0..2u64 {
                let cache = &cache;
                let barrier = &barrier;
                s.spawn(move || {
                    cache
                        .get_or_compute(fp(10 + i), "blob", || {
                            // Both computations must be running at once to pass.
                            barrier.wait();
                            Ok::<_, String>(blob(1))
                        })
                        .unwrap();
                });
            }
        });
        assert_eq!(cache.stats().computations, 2);
    }

    #[test]
    fn lru_eviction_respects_leases() {
        let cache: ArtifactCache<Blob> = ArtifactCache::new(CacheConfig::unbounded());
        for i in 0..4 {
            cache.get_or_compute(fp(i), "blob", ok(10)).unwrap();
        }
        // Touch 0 so that 1 becomes the oldest.
        cache.get_or_compute(fp(0), "blob", ok(10)).unwrap();
        let lease = cache.lease([fp(1)]);

        let report = cache.evict(EvictionPolicy::LeastRecentlyUsed {
            max_bytes: Some(20),
            max_entries: None,
        });
        assert_eq!(report.evicted, vec![fp(2), fp(3)]);
        assert_eq!(report.freed_bytes, 20);
        assert_eq!(report.skipped_pinned, 1);
        assert!(cache.contains(&fp(1)));
        assert!(cache.contains(&fp(0)));

        drop(lease);
        let report = cache.drain();
        assert_eq!(report.evicted.len(), 2);
        assert_eq!(cache.stats().entries, 0);
        assert_eq!(cache.stats().evictions, 4);
    }

    #[test]
    fn budget_is_enforced_on_insert() {
        let cache: ArtifactCache<Blob> =
            ArtifactCache::new(CacheConfig::unbounded().with_max_entries(2));
        for i in 0..3 {
            cache.get_or_compute(fp(i), "blob", ok(1)).unwrap();
        }
        assert!(!cache.contains(&fp(0)));
        assert!(cache.contains(&fp(1)));
        assert!(cache.contains(&fp(2)));
    }

    #[test]
    fn closed_cache_rejects_requests() {
        let cache: ArtifactCache<Blob> = ArtifactCache::default();
        cache.get_or_compute(fp(1), "blob", ok(1)).unwrap();
        let lease = cache.lease([fp(1)]);
        let report = cache.close();
        assert!(report.evicted.is_empty());
        assert!(cache.is_closed());
        assert_eq!(
            cache.get_or_compute(fp(1), "blob", ok(1)).unwrap_err(),
            CacheError::Closed
        );
        drop(lease);
        assert_eq!(cache.drain().evicted, vec![fp(1)]);
    }

    #[test]
    fn provenance_is_recorded() {
        let cache: ArtifactCache<Blob> = ArtifactCache::default();
        cache.get_or_compute(fp(5), "blob-five", ok(3)).unwrap();
        let p = cache.provenance(&fp(5)).unwrap();
        assert_eq!(p.label, "blob-five");
        assert_eq!(p.fingerprint, fp(5));
        assert!(p.computed_at <= Utc::now());
    }
}
