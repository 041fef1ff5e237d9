//! Action records and the values bound to them.
//!
//! An [`ActionRecord`] is the persisted description of one grantable action:
//! which handler to run, with which arguments, how often and for how long.
//! Arguments use the closed [`Value`] schema so that decoding a stored record
//! can never construct anything other than plain data.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel for "no limit" on [`ActionRecord::limit`].
pub const UNLIMITED: i64 = -1;

/// Sentinel for "never expires" on [`ActionRecord::expiration`].
pub const NEVER_EXPIRES: i64 = -1;

/// A value that can be stored as a handler argument or returned as a result.
///
/// Serialized as `{"type": "...", "value": ...}` so the stored form is
/// self-describing and rejects unknown kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    /// Whether this value signals "the action happened".
    ///
    /// `Null`, `false`, `0`, the empty string and the empty list are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// Reference to a registered handler plus the arguments it is called with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackRef {
    /// Registry key of the handler.
    pub handler: String,
    /// Ordered argument list.
    #[serde(default)]
    pub args: Vec<Value>,
}

impl CallbackRef {
    pub fn new(handler: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            handler: handler.into(),
            args,
        }
    }
}

/// A persisted secure action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRecord {
    pub id: i64,
    /// PHC-format hash of the secret. The secret itself is never stored.
    pub password_hash: String,
    pub name: String,
    pub callback: CallbackRef,
    /// Maximum successful invocations, or [`UNLIMITED`].
    pub limit: i64,
    /// Successful invocations so far.
    pub count: i64,
    /// Lifetime in seconds from `created_at`, or [`NEVER_EXPIRES`].
    pub expiration: i64,
    /// Unix timestamp (seconds).
    pub created_at: i64,
    /// Exempt from automatic eviction.
    pub persistent: bool,
}

impl ActionRecord {
    /// Absolute unix deadline, if the record expires at all.
    pub fn deadline(&self) -> Option<i64> {
        if self.expiration == NEVER_EXPIRES {
            None
        } else {
            Some(self.created_at.saturating_add(self.expiration))
        }
    }

    /// Invocations left before the record is exhausted, if limited.
    pub fn remaining(&self) -> Option<i64> {
        if self.limit == UNLIMITED {
            None
        } else {
            Some((self.limit - self.count).max(0))
        }
    }
}

/// Either a bare id or an already-loaded record.
#[derive(Debug, Clone, Copy)]
pub enum ActionRef<'a> {
    Id(i64),
    Record(&'a ActionRecord),
}

impl ActionRef<'_> {
    pub fn id(&self) -> i64 {
        match self {
            ActionRef::Id(id) => *id,
            ActionRef::Record(record) => record.id,
        }
    }
}

impl From<i64> for ActionRef<'_> {
    fn from(id: i64) -> Self {
        ActionRef::Id(id)
    }
}

impl<'a> From<&'a ActionRecord> for ActionRef<'a> {
    fn from(record: &'a ActionRecord) -> Self {
        ActionRef::Record(record)
    }
}
