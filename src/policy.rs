//! Invocation policy predicates.
//!
//! Pure functions over an [`ActionRecord`] and a unix timestamp. Expiration is
//! evaluated lazily: nothing fires when a deadline passes, the record is
//! simply observed as expired the next time it is read, verified or swept.

use crate::action::{ActionRecord, NEVER_EXPIRES, UNLIMITED};
use std::sync::Arc;

/// Host-supplied predicate OR-ed into the sweep's eviction decision.
pub type RecordPredicate = Arc<dyn Fn(&ActionRecord) -> bool + Send + Sync>;

/// Host-supplied override for explicit deletion. Receives the default
/// decision (`!persistent`) and returns the final one.
pub type DeletePredicate = Arc<dyn Fn(&ActionRecord, bool) -> bool + Send + Sync>;

/// Whether an explicit delete may proceed.
pub fn may_delete(record: &ActionRecord, hook: Option<&DeletePredicate>) -> bool {
    let default = !record.persistent;
    match hook {
        Some(predicate) => predicate(record, default),
        None => default,
    }
}

/// Where a record sits in its lifecycle at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Active,
    Expired,
    Exhausted,
}

/// Deadline has passed. A record is still valid at exactly `created_at + expiration`.
pub fn is_expired(record: &ActionRecord, now: i64) -> bool {
    if record.expiration == NEVER_EXPIRES {
        return false;
    }
    now > record.created_at.saturating_add(record.expiration)
}

/// Invocation count has reached the limit.
pub fn is_limit_reached(record: &ActionRecord) -> bool {
    if record.limit == UNLIMITED {
        return false;
    }
    record.count >= record.limit
}

pub fn is_invocable(record: &ActionRecord, now: i64) -> bool {
    !is_expired(record, now) && !is_limit_reached(record)
}

/// Classify a record. Expiry is reported ahead of exhaustion.
pub fn verdict(record: &ActionRecord, now: i64) -> Verdict {
    if is_expired(record, now) {
        Verdict::Expired
    } else if is_limit_reached(record) {
        Verdict::Exhausted
    } else {
        Verdict::Active
    }
}

/// Whether the sweep should remove this record.
///
/// Persistent records are never evicted. `cleanup` is OR-ed in after the
/// built-in checks and is only consulted for non-persistent records.
pub fn should_evict(record: &ActionRecord, now: i64, cleanup: Option<&RecordPredicate>) -> bool {
    if record.persistent {
        return false;
    }
    if !is_invocable(record, now) {
        return true;
    }
    cleanup.is_some_and(|predicate| predicate(record))
}
