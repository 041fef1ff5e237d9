//! Optional in-process read cache for action records.
//!
//! Entries are keyed by id and dropped on every mutation of that id made
//! through the engine. Mutations made by other processes sharing the same
//! database are not observed, so enable this only for single-process
//! deployments. Execution always reads the store, so limit and expiry checks
//! never see a cached record.
//!
//! Fills are guarded by a generation counter: a reader takes a
//! [`ticket`](ActionCache::ticket) before querying the store and the fill is
//! dropped if any invalidation happened in between, so a slow read can never
//! put back a record that a concurrent mutation already replaced.

use crate::action::ActionRecord;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ActionCache {
    records: DashMap<i64, ActionRecord>,
    generation: AtomicU64,
}

impl ActionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: i64) -> Option<ActionRecord> {
        self.records.get(&id).map(|entry| entry.value().clone())
    }

    /// Generation to pass to [`fill`](Self::fill). Take it before reading the store.
    pub fn ticket(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Cache a record read from the store, unless something was invalidated
    /// since `ticket` was taken. Returns whether the record was cached.
    pub fn fill(&self, record: &ActionRecord, ticket: u64) -> bool {
        // The check runs under the shard lock, so an invalidation that bumps
        // the generation after it still removes whatever this inserts.
        let entry = self.records.entry(record.id);
        if self.generation.load(Ordering::SeqCst) != ticket {
            return false;
        }
        entry.insert(record.clone());
        true
    }

    pub fn invalidate(&self, id: i64) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.records.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::CallbackRef;

    fn record(id: i64, count: i64) -> ActionRecord {
        ActionRecord {
            id,
            password_hash: String::new(),
            name: format!("cached-{}", id),
            callback: CallbackRef::new("noop", vec![]),
            limit: 5,
            count,
            expiration: -1,
            created_at: 0,
            persistent: false,
        }
    }

    #[test]
    fn test_fill_get_invalidate() {
        let cache = ActionCache::new();
        assert!(cache.get(1).is_none());

        cache.fill(&record(1, 0), cache.ticket());
        cache.fill(&record(2, 0), cache.ticket());
        assert_eq!(cache.get(1).unwrap().count, 0);
        assert_eq!(cache.len(), 2);

        assert!(cache.fill(&record(1, 4), cache.ticket()));
        assert_eq!(cache.get(1).unwrap().count, 4);

        cache.invalidate(1);
        assert!(cache.get(1).is_none());
        assert!(cache.get(2).is_some());

        // Invalidating an absent id is a no-op.
        cache.invalidate(1);
        assert!(!cache.is_empty());
    }

    #[test]
    fn test_fill_after_invalidation_is_dropped() {
        let cache = ActionCache::new();

        // A reader takes its ticket and reads count 0 from the store...
        let ticket = cache.ticket();
        let stale = record(1, 0);

        // ...while another caller advances the counter and invalidates.
        cache.invalidate(1);

        assert!(!cache.fill(&stale, ticket));
        assert!(cache.get(1).is_none());

        // A read that starts after the invalidation fills normally.
        assert!(cache.fill(&record(1, 1), cache.ticket()));
        assert_eq!(cache.get(1).unwrap().count, 1);
    }
}
