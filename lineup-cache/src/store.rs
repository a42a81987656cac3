//! The cache store: entries, in-flight loads and the session epoch.
//!
//! Every operation takes the store mutex, does its bookkeeping and releases
//! it before returning. The lock is never held across an `.await`, so an
//! observer sees either none or all of an invalidation.

use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, Shared};
use lineup_core::CacheKey;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::entry::{CacheEntry, EntryState};
use crate::error::FetchError;

/// A load shared by every reader of one key.
pub(crate) type SharedLoad = Shared<BoxFuture<'static, Result<Value, FetchError>>>;

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads served from a fresh entry.
    pub hits: u64,
    /// Reads that started a load.
    pub misses: u64,
    /// Reads that joined a load already in flight.
    pub joined: u64,
    pub entry_count: u64,
    pub stale_count: u64,
    pub in_flight: u64,
}

impl CacheStats {
    /// Share of reads that did not start a load (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses + self.joined;
        if total == 0 {
            0.0
        } else {
            (self.hits + self.joined) as f64 / total as f64
        }
    }
}

/// Identifies one load so its completion lands on the right record.
#[derive(Debug, Clone)]
pub(crate) struct LoadTicket {
    pub key: CacheKey,
    pub id: u64,
    pub epoch: u64,
}

/// What a read should do, decided under a single lock.
pub(crate) enum ReadPlan {
    Hit {
        data: Value,
        fetched_at: DateTime<Utc>,
    },
    Join(SharedLoad),
    Lead(SharedLoad),
}

struct InFlight {
    id: u64,
    load: SharedLoad,
    /// State to restore if the load fails.
    resume_state: Option<EntryState>,
    /// Set when `mark_stale` hits the key while the load runs.
    invalidated: bool,
}

#[derive(Default)]
struct StoreInner {
    entries: HashMap<CacheKey, CacheEntry>,
    in_flight: HashMap<CacheKey, InFlight>,
    epoch: u64,
    next_load_id: u64,
    hits: u64,
    misses: u64,
    joined: u64,
}

/// Process-wide cache of remote resources.
///
/// Construct one per process and share it by `Arc`. Only the fetch
/// coordinator, mutation executor and session boundary should mutate it.
pub struct CacheStore {
    inner: Mutex<StoreInner>,
    clock: Arc<dyn Clock>,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // === Public operations ===

    /// Snapshot of the entry for `key`. No side effects.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.lock().entries.get(key).cloned()
    }

    /// Create or overwrite `key` as Fresh, fetched now.
    pub fn put(&self, key: CacheKey, data: Value) {
        let now = self.clock.now();
        let mut inner = self.lock();
        store_fresh(&mut inner.entries, key, data, now);
    }

    /// Mark every entry at or below `prefix` Stale.
    ///
    /// Matching is segment-wise. Entries with a load in flight keep their
    /// Fetching state but will land as Stale. Returns the number of entries hit.
    pub fn mark_stale(&self, prefix: &CacheKey) -> usize {
        let mut inner = self.lock();
        let inner = &mut *inner;
        let mut affected = 0;
        for (key, entry) in inner.entries.iter_mut() {
            if !key.starts_with(prefix) {
                continue;
            }
            affected += 1;
            match entry.state {
                EntryState::Fresh => entry.state = EntryState::Stale,
                EntryState::Fetching => {
                    if let Some(flight) = inner.in_flight.get_mut(key) {
                        flight.invalidated = true;
                    }
                }
                EntryState::Stale | EntryState::Error => {}
            }
        }
        affected
    }

    /// Drop every entry and in-flight record and start a new epoch.
    ///
    /// Loads that were running keep going, but their results are discarded.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.in_flight.clear();
        inner.epoch += 1;
    }

    /// Remove a single entry. Returns whether it existed.
    pub fn evict(&self, key: &CacheKey) -> bool {
        let mut inner = self.lock();
        inner.in_flight.remove(key);
        inner.entries.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// All cached keys in sorted order.
    pub fn keys(&self) -> Vec<CacheKey> {
        let mut keys: Vec<CacheKey> = self.lock().entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.lock().in_flight.contains_key(key)
    }

    /// Incremented by every `clear()`.
    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            joined: inner.joined,
            entry_count: inner.entries.len() as u64,
            stale_count: inner.entries.values().filter(|e| e.is_stale()).count() as u64,
            in_flight: inner.in_flight.len() as u64,
        }
    }

    // === Coordinator bookkeeping ===

    /// Serve, join or start a load for `key`.
    ///
    /// `start` builds the load future for a new ticket. It runs under the
    /// lock and must only construct the future, not poll it.
    pub(crate) fn plan_read<F>(&self, key: &CacheKey, stale_time: Duration, start: F) -> ReadPlan
    where
        F: FnOnce(LoadTicket) -> SharedLoad,
    {
        let now = self.clock.now();
        let mut inner = self.lock();

        if let Some(flight) = inner.in_flight.get(key) {
            let load = flight.load.clone();
            inner.joined += 1;
            return ReadPlan::Join(load);
        }

        if let Some(entry) = inner.entries.get(key) {
            if entry.is_servable(now, stale_time) {
                if let (Some(data), Some(fetched_at)) = (entry.data.clone(), entry.fetched_at) {
                    inner.hits += 1;
                    return ReadPlan::Hit { data, fetched_at };
                }
            }
        }

        inner.misses += 1;
        inner.next_load_id += 1;
        let ticket = LoadTicket {
            key: key.clone(),
            id: inner.next_load_id,
            epoch: inner.epoch,
        };
        let id = ticket.id;
        let load = start(ticket);

        let resume_state = match inner.entries.get_mut(key) {
            Some(entry) => {
                let previous = entry.state;
                entry.state = EntryState::Fetching;
                Some(previous)
            }
            None => {
                inner
                    .entries
                    .insert(key.clone(), CacheEntry::pending(key.clone()));
                None
            }
        };
        inner.in_flight.insert(
            key.clone(),
            InFlight {
                id,
                load: load.clone(),
                resume_state,
                invalidated: false,
            },
        );
        ReadPlan::Lead(load)
    }

    /// Record the outcome of a load. Returns false if it was discarded
    /// because the session changed or the key was evicted while it ran.
    pub(crate) fn finish_load(&self, ticket: &LoadTicket, result: &Result<Value, FetchError>) -> bool {
        let now = self.clock.now();
        let mut inner = self.lock();

        if ticket.epoch != inner.epoch {
            return false;
        }

        let owns_record = inner
            .in_flight
            .get(&ticket.key)
            .is_some_and(|f| f.id == ticket.id);
        if !owns_record {
            return false;
        }
        let (invalidated, resume_state) = match inner.in_flight.remove(&ticket.key) {
            Some(flight) => (flight.invalidated, flight.resume_state),
            None => (false, None),
        };

        match result {
            Ok(data) => {
                store_fresh(&mut inner.entries, ticket.key.clone(), data.clone(), now);
                if invalidated {
                    if let Some(entry) = inner.entries.get_mut(&ticket.key) {
                        entry.state = EntryState::Stale;
                    }
                }
            }
            Err(err) => {
                let entry = inner
                    .entries
                    .entry(ticket.key.clone())
                    .or_insert_with(|| CacheEntry::pending(ticket.key.clone()));
                entry.error_info = Some(err.to_string());
                entry.state = if entry.data.is_none() {
                    EntryState::Error
                } else if invalidated {
                    EntryState::Stale
                } else {
                    match resume_state {
                        Some(EntryState::Fresh) => EntryState::Fresh,
                        _ => EntryState::Stale,
                    }
                };
            }
        }
        true
    }
}

fn store_fresh(
    entries: &mut HashMap<CacheKey, CacheEntry>,
    key: CacheKey,
    data: Value,
    now: DateTime<Utc>,
) {
    let entry = entries
        .entry(key.clone())
        .or_insert_with(|| CacheEntry::pending(key));
    entry.data = Some(data);
    entry.fetched_at = Some(now);
    entry.state = EntryState::Fresh;
    entry.error_info = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use futures_util::FutureExt;
    use lineup_core::{PlayerId, QueryKeys};
    use serde_json::json;

    fn ready_load(value: Value) -> SharedLoad {
        futures_util::future::ready(Ok(value)).boxed().shared()
    }

    #[test]
    fn test_get_has_no_side_effects() {
        let store = CacheStore::new();
        let key = QueryKeys::coach_players();
        assert!(store.get(&key).is_none());
        assert!(store.is_empty());

        store.put(key.clone(), json!([]));
        let before = store.get(&key).unwrap();
        let after = store.get(&key).unwrap();
        assert_eq!(before, after);
        assert_eq!(store.stats().hits, 0);
    }

    #[test]
    fn test_put_sets_fresh_and_timestamp() {
        let clock = Arc::new(ManualClock::starting_now());
        let store = CacheStore::with_clock(clock.clone());
        let key = QueryKeys::me();

        store.put(key.clone(), json!({ "id": 1 }));
        let entry = store.get(&key).unwrap();
        assert_eq!(entry.state, EntryState::Fresh);
        assert_eq!(entry.fetched_at, Some(clock.now()));
        assert_eq!(entry.data, Some(json!({ "id": 1 })));
    }

    #[test]
    fn test_mark_stale_cascades_to_descendants_only() {
        let store = CacheStore::new();
        let p1 = QueryKeys::coach_player(PlayerId::new(1));
        let p1_match = p1.child("matches").child(10i64);
        let p2 = QueryKeys::coach_player(PlayerId::new(2));

        for key in [&p1, &p1_match, &p2] {
            store.put(key.clone(), json!({}));
        }

        assert_eq!(store.mark_stale(&p1), 2);
        assert!(store.get(&p1).unwrap().is_stale());
        assert!(store.get(&p1_match).unwrap().is_stale());
        assert!(store.get(&p2).unwrap().is_fresh());
        assert_eq!(store.stats().stale_count, 2);
    }

    #[test]
    fn test_mark_stale_does_not_match_string_prefix() {
        let store = CacheStore::new();
        store.put(CacheKey::new(["coach", "player"]), json!(1));
        assert_eq!(store.mark_stale(&CacheKey::new(["coach", "pl"])), 0);
        assert!(store.get(&CacheKey::new(["coach", "player"])).unwrap().is_fresh());
    }

    #[test]
    fn test_clear_empties_and_bumps_epoch() {
        let store = CacheStore::new();
        for id in 0..5 {
            store.put(QueryKeys::coach_player(PlayerId::new(id)), json!(id));
        }
        assert_eq!(store.len(), 5);

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.epoch(), 1);
    }

    #[test]
    fn test_plan_read_hit_join_and_lead() {
        let store = CacheStore::new();
        let key = QueryKeys::coach_players();
        let window = Duration::from_secs(60);

        let plan = store.plan_read(&key, window, |_| ready_load(json!([])));
        assert!(matches!(plan, ReadPlan::Lead(_)));
        assert_eq!(store.get(&key).unwrap().state, EntryState::Fetching);
        assert!(store.is_in_flight(&key));

        let plan = store.plan_read(&key, window, |_| panic!("must join"));
        assert!(matches!(plan, ReadPlan::Join(_)));

        store.lock().in_flight.clear();
        store.put(key.clone(), json!([]));
        let plan = store.plan_read(&key, window, |_| panic!("must hit"));
        assert!(matches!(plan, ReadPlan::Hit { .. }));

        let stats = store.stats();
        assert_eq!((stats.misses, stats.joined, stats.hits), (1, 1, 1));
    }

    #[test]
    fn test_finish_load_discarded_after_clear() {
        let store = CacheStore::new();
        let key = QueryKeys::me();
        let mut captured = None;
        store.plan_read(&key, Duration::from_secs(60), |ticket| {
            captured = Some(ticket);
            ready_load(json!(1))
        });
        let ticket = captured.unwrap();

        store.clear();
        assert!(!store.finish_load(&ticket, &Ok(json!(1))));
        assert!(store.get(&key).is_none());
    }

    #[test]
    fn test_evict_during_load_drops_result() {
        let store = CacheStore::new();
        let key = QueryKeys::coach_player(PlayerId::new(42));
        let mut captured = None;
        store.plan_read(&key, Duration::from_secs(60), |ticket| {
            captured = Some(ticket);
            ready_load(json!(null))
        });

        assert!(store.evict(&key));
        assert!(!store.is_in_flight(&key));
        assert!(!store.finish_load(&captured.unwrap(), &Ok(json!({ "id": 42 }))));
        assert!(store.get(&key).is_none());
        assert_eq!(store.epoch(), 0);
    }

    #[test]
    fn test_evict_missing_key() {
        let store = CacheStore::new();
        store.put(QueryKeys::me(), json!({}));
        assert!(!store.evict(&QueryKeys::coach_players()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_failed_refresh_keeps_old_data() {
        let store = CacheStore::new();
        let key = QueryKeys::coach_players();
        store.put(key.clone(), json!(["old"]));
        store.mark_stale(&key);

        let mut captured = None;
        store.plan_read(&key, Duration::from_secs(60), |ticket| {
            captured = Some(ticket);
            ready_load(json!(null))
        });
        let err = FetchError::from(lineup_core::ApiError::transport("offline"));
        assert!(store.finish_load(&captured.unwrap(), &Err(err)));

        let entry = store.get(&key).unwrap();
        assert_eq!(entry.state, EntryState::Stale);
        assert_eq!(entry.data, Some(json!(["old"])));
        assert!(entry.error_info.unwrap().contains("offline"));
        assert!(!store.is_in_flight(&key));
    }

    #[test]
    fn test_first_load_failure_is_error_state() {
        let store = CacheStore::new();
        let key = QueryKeys::me();
        let mut captured = None;
        store.plan_read(&key, Duration::from_secs(60), |ticket| {
            captured = Some(ticket);
            ready_load(json!(null))
        });
        let err = FetchError::from(lineup_core::ApiError::status(500, "boom"));
        store.finish_load(&captured.unwrap(), &Err(err));

        let entry = store.get(&key).unwrap();
        assert_eq!(entry.state, EntryState::Error);
        assert!(entry.data.is_none());
    }

    #[test]
    fn test_invalidated_while_fetching_lands_stale() {
        let store = CacheStore::new();
        let key = QueryKeys::coach_player(PlayerId::new(42));
        let mut captured = None;
        store.plan_read(&key, Duration::from_secs(60), |ticket| {
            captured = Some(ticket);
            ready_load(json!(null))
        });

        assert_eq!(store.mark_stale(&QueryKeys::coach_players()), 1);
        store.finish_load(&captured.unwrap(), &Ok(json!({ "id": 42 })));

        let entry = store.get(&key).unwrap();
        assert_eq!(entry.state, EntryState::Stale);
        assert_eq!(entry.data, Some(json!({ "id": 42 })));
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 6,
            misses: 2,
            joined: 2,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}
