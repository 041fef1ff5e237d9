//! Action database models.

use crate::action::{ActionRecord, CallbackRef, Value};
use crate::db::DbError;

/// Column tuple as selected by every action query.
pub(super) type RowTuple = (i64, String, String, String, String, i64, i64, i64, i64, bool);

/// A `secure_actions` row before its argument blob is decoded.
///
/// The sweep sees rows in this form so it can evict entries whose blobs no
/// longer decode instead of failing the whole scan.
#[derive(Debug, Clone)]
pub struct ActionRow {
    pub id: i64,
    pub password_hash: String,
    pub name: String,
    pub handler: String,
    pub args: String,
    pub limit: i64,
    pub count: i64,
    pub expiration: i64,
    pub created_at: i64,
    pub persistent: bool,
}

impl From<RowTuple> for ActionRow {
    fn from(
        (id, password_hash, name, handler, args, limit, count, expiration, created_at, persistent): RowTuple,
    ) -> Self {
        Self {
            id,
            password_hash,
            name,
            handler,
            args,
            limit,
            count,
            expiration,
            created_at,
            persistent,
        }
    }
}

impl ActionRow {
    /// Decode the argument blob into a full record.
    pub fn into_record(self) -> Result<ActionRecord, DbError> {
        if self.handler.is_empty() {
            return Err(DbError::Corrupt {
                id: self.id,
                field: "callback",
                reason: "empty handler identifier".to_string(),
            });
        }

        let args: Vec<Value> =
            serde_json::from_str(&self.args).map_err(|e| DbError::Corrupt {
                id: self.id,
                field: "args",
                reason: e.to_string(),
            })?;

        Ok(ActionRecord {
            id: self.id,
            password_hash: self.password_hash,
            name: self.name,
            callback: CallbackRef {
                handler: self.handler,
                args,
            },
            limit: self.limit,
            count: self.count,
            expiration: self.expiration,
            created_at: self.created_at,
            persistent: self.persistent,
        })
    }
}

/// Fields for inserting a new record. The store assigns `id`; `count` starts at 0.
#[derive(Debug, Clone)]
pub struct NewAction {
    pub password_hash: String,
    pub name: String,
    pub callback: CallbackRef,
    pub limit: i64,
    pub expiration: i64,
    pub created_at: i64,
    pub persistent: bool,
}

/// Partial update of a record.
///
/// `None` leaves a column untouched. `created_at` is immutable and the
/// counter only moves through
/// [`increment_count`](super::ActionRepository::increment_count).
#[derive(Debug, Clone, Default)]
pub struct ActionUpdate {
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub callback: Option<CallbackRef>,
    pub limit: Option<i64>,
    pub expiration: Option<i64>,
    pub persistent: Option<bool>,
}

impl ActionUpdate {
    pub fn is_empty(&self) -> bool {
        self.password_hash.is_none()
            && self.name.is_none()
            && self.callback.is_none()
            && self.limit.is_none()
            && self.expiration.is_none()
            && self.persistent.is_none()
    }
}

/// Columns that may be used for single-record lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionColumn {
    Name,
    Handler,
    PasswordHash,
}

impl ActionColumn {
    pub(super) fn as_sql(self) -> &'static str {
        match self {
            ActionColumn::Name => "name",
            ActionColumn::Handler => "callback",
            ActionColumn::PasswordHash => "password_hash",
        }
    }
}

/// Result of advancing a record's invocation counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrementOutcome {
    /// Counter advanced; carries the new value.
    Incremented(i64),
    /// Conditional write refused: the limit was already reached.
    LimitReached,
    /// No record with that id.
    Missing,
}
