//! Handler registry.
//!
//! Records never store executable code. They store a handler identifier,
//! and the [`CallbackRegistry`] maps that identifier to a handler registered
//! by the host at startup. Invoking an action is a lookup followed by a call.

use crate::action::{ActionRecord, Value};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// A handler's report that the action did not happen.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Result type for action handlers.
pub type HandlerResult = Result<Value, HandlerError>;

/// Side-effecting code bound to secure actions.
///
/// Return a truthy [`Value`] when the action took place. A falsy value or an
/// error leaves the invocation counter untouched so the bearer can retry.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Run the action with its stored arguments. `action` is the record
    /// being executed, as loaded before the counter advanced.
    async fn invoke(&self, args: &[Value], action: &ActionRecord) -> HandlerResult;
}

/// Adapter for plain synchronous closures.
pub struct FnHandler<F>(F);

#[async_trait]
impl<F> ActionHandler for FnHandler<F>
where
    F: Fn(&[Value], &ActionRecord) -> HandlerResult + Send + Sync,
{
    async fn invoke(&self, args: &[Value], action: &ActionRecord) -> HandlerResult {
        (self.0)(args, action)
    }
}

/// Registry of action handlers keyed by identifier.
#[derive(Default)]
pub struct CallbackRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn ActionHandler>>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one with the same id.
    pub fn register(
        &self,
        id: impl Into<String>,
        handler: impl ActionHandler + 'static,
    ) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.write().insert(id.into(), Arc::new(handler))
    }

    /// Register a synchronous closure.
    pub fn register_fn<F>(&self, id: impl Into<String>, f: F) -> Option<Arc<dyn ActionHandler>>
    where
        F: Fn(&[Value], &ActionRecord) -> HandlerResult + Send + Sync + 'static,
    {
        self.register(id, FnHandler(f))
    }

    pub fn unregister(&self, id: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.write().remove(id)
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.handlers.read().contains_key(id)
    }

    /// Registered identifiers, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.handlers.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("handlers", &self.ids())
            .finish()
    }
}
