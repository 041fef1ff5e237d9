//! Secure action execution engine.
//!
//! [`SecureActions`] ties the store, the handler registry, the credential
//! hasher and the policy evaluator together. It is the only type most hosts
//! need: mint actions with [`add_action`](SecureActions::add_action), hand the
//! returned token to a user, and pass whatever comes back to
//! [`execute_action`](SecureActions::execute_action).
//!
//! # Eviction on presentation
//!
//! A genuine token that is expired or exhausted destroys its record when it is
//! presented (unless the record is persistent). A late but otherwise valid
//! request can therefore silently delete the resource; callers that need the
//! record to outlive its policy must mark it persistent.

use crate::action::{ActionRecord, ActionRef, CallbackRef, NEVER_EXPIRES, UNLIMITED, Value};
use crate::cache::ActionCache;
use crate::clock::{Clock, SystemClock};
use crate::config::{self, Config};
use crate::credential::Credentials;
use crate::db::{ActionColumn, ActionUpdate, Database, IncrementOutcome, NewAction};
use crate::error::{ActionError, ActionResult};
use crate::metrics;
use crate::policy::{self, DeletePredicate, RecordPredicate, Verdict};
use crate::registry::CallbackRegistry;
use crate::telemetry::{ExecutionTimer, spans};
use crate::token;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, info, warn};
use zeroize::Zeroizing;

/// Parameters for [`SecureActions::add_action`].
///
/// Defaults: never expires, unlimited invocations, not persistent, secret
/// minted by the engine.
#[derive(Clone)]
pub struct NewActionRequest {
    pub name: String,
    pub callback: CallbackRef,
    /// Lifetime in seconds, or [`NEVER_EXPIRES`].
    pub expiration: i64,
    /// Maximum successful invocations, or [`UNLIMITED`].
    pub limit: i64,
    pub persistent: bool,
    /// Caller-chosen secret. Minted when absent.
    pub secret: Option<Zeroizing<String>>,
}

impl NewActionRequest {
    pub fn new(name: impl Into<String>, handler: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            callback: CallbackRef::new(handler, Vec::new()),
            expiration: NEVER_EXPIRES,
            limit: UNLIMITED,
            persistent: false,
            secret: None,
        }
    }

    pub fn args(mut self, args: Vec<Value>) -> Self {
        self.callback.args = args;
        self
    }

    pub fn expires_in(mut self, secs: i64) -> Self {
        self.expiration = secs;
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(Zeroizing::new(secret.into()));
        self
    }

    fn validate(&self) -> ActionResult<()> {
        if self.name.is_empty() {
            return Err(ActionError::InvalidRequest("name must not be empty".into()));
        }
        if self.expiration < NEVER_EXPIRES {
            return Err(ActionError::InvalidRequest(format!(
                "expiration must be -1 or non-negative, got {}",
                self.expiration
            )));
        }
        if self.limit < UNLIMITED {
            return Err(ActionError::InvalidRequest(format!(
                "limit must be -1 or non-negative, got {}",
                self.limit
            )));
        }
        if let Some(secret) = &self.secret {
            if secret.is_empty() {
                return Err(ActionError::InvalidRequest("secret must not be empty".into()));
            }
            if secret.contains(token::SEPARATOR) {
                return Err(ActionError::InvalidRequest(
                    "secret must not contain ':'".into(),
                ));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for NewActionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewActionRequest")
            .field("name", &self.name)
            .field("callback", &self.callback)
            .field("expiration", &self.expiration)
            .field("limit", &self.limit)
            .field("persistent", &self.persistent)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// The secure actions engine.
pub struct SecureActions {
    pub(crate) db: Database,
    pub(crate) registry: Arc<CallbackRegistry>,
    pub(crate) credentials: Credentials,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) strict_limits: bool,
    pub(crate) sweep_interval: Duration,
    pub(crate) sweep_batch: usize,
    pub(crate) cache: Option<ActionCache>,
    pub(crate) cleanup: Option<RecordPredicate>,
    pub(crate) may_delete: Option<DeletePredicate>,
}

impl SecureActions {
    /// Build an engine over an open database.
    pub fn new(db: Database, registry: Arc<CallbackRegistry>, config: &Config) -> ActionResult<Self> {
        let credentials = Credentials::new(&config.credentials)
            .map_err(|e| ActionError::Credential(e.to_string()))?;

        Ok(Self {
            db,
            registry,
            credentials,
            clock: Arc::new(SystemClock),
            strict_limits: config.execution.strict_limits,
            sweep_interval: config.sweeper.interval(),
            sweep_batch: config.sweeper.batch_size.max(1),
            cache: config.cache.enabled.then(ActionCache::new),
            cleanup: None,
            may_delete: None,
        })
    }

    /// Validate `config`, open its database and build an engine.
    pub async fn connect(config: &Config, registry: Arc<CallbackRegistry>) -> ActionResult<Self> {
        if let Err(errors) = config::validate(config) {
            for error in &errors {
                warn!(error = %error, "Configuration validation failed");
            }
            let joined = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ActionError::Config(joined));
        }

        let db = Database::new(&config.database.path).await?;
        Self::new(db, registry, config)
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Install a predicate OR-ed into the sweep's eviction decision.
    pub fn with_cleanup_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ActionRecord) -> bool + Send + Sync + 'static,
    {
        self.cleanup = Some(Arc::new(predicate));
        self
    }

    /// Install an override for [`delete_action`](Self::delete_action). The
    /// predicate receives the default decision (`!persistent`).
    pub fn with_may_delete_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ActionRecord, bool) -> bool + Send + Sync + 'static,
    {
        self.may_delete = Some(Arc::new(predicate));
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn registry(&self) -> &Arc<CallbackRegistry> {
        &self.registry
    }

    /// Interval configured for the background sweep.
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    /// Current time according to the engine's clock.
    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Persist a new action and return its bearer token `"<id>:<secret>"`.
    ///
    /// The plaintext secret exists only in the returned token. Use
    /// [`token::wrap`] before embedding it in a URL.
    pub async fn add_action(&self, request: NewActionRequest) -> ActionResult<String> {
        request.validate()?;

        if !self.registry.contains(&request.callback.handler) {
            return Err(ActionError::UnknownHandler(request.callback.handler));
        }

        let secret = match request.secret {
            Some(secret) => secret,
            None => self.credentials.generate_secret(),
        };
        let password_hash = self
            .credentials
            .hash_secret(&secret)
            .map_err(|e| ActionError::Credential(e.to_string()))?;

        let id = self
            .db
            .actions()
            .create(&NewAction {
                password_hash,
                name: request.name.clone(),
                callback: request.callback,
                limit: request.limit,
                expiration: request.expiration,
                created_at: self.clock.now(),
                persistent: request.persistent,
            })
            .await?;

        metrics::record_created();
        info!(
            action_id = id,
            name = %request.name,
            limit = request.limit,
            expiration = request.expiration,
            persistent = request.persistent,
            "Secure action created"
        );

        Ok(token::encode(id, &secret))
    }

    /// Present a token and, if it is genuine and still invocable, run its
    /// handler.
    ///
    /// Accepts both the raw and the base64-wrapped token. The counter only
    /// advances when the handler returns a truthy value.
    pub async fn execute_action(&self, presented: &str) -> ActionResult<Value> {
        let span = spans::execute();
        async move {
            let mut timer = ExecutionTimer::new();
            let result = self.execute_inner(presented).await;
            timer.finish(match &result {
                Ok(value) if value.is_truthy() => "success",
                Ok(_) => "declined",
                Err(e) => e.error_code(),
            });
            result
        }
        .instrument(span)
        .await
    }

    async fn execute_inner(&self, presented: &str) -> ActionResult<Value> {
        let token = token::decode_any(presented)?;
        tracing::Span::current().record("action_id", token.id);

        // Policy checks always see the stored record, never a cached copy.
        let record = self.db.actions().find_by_id(token.id).await?;

        if !self.credentials.verify_secret(&token.secret, &record.password_hash) {
            debug!(action_id = record.id, "Rejected secret");
            return Err(ActionError::InvalidKey);
        }

        match policy::verdict(&record, self.clock.now()) {
            Verdict::Active => {}
            Verdict::Expired => {
                self.evict_spent(&record, "expired").await?;
                return Err(ActionError::Expired);
            }
            Verdict::Exhausted => {
                self.evict_spent(&record, "exhausted").await?;
                return Err(ActionError::LimitExceeded);
            }
        }

        let handler = self
            .registry
            .get(&record.callback.handler)
            .ok_or_else(|| ActionError::UnknownHandler(record.callback.handler.clone()))?;

        let value = handler
            .invoke(&record.callback.args, &record)
            .await
            .map_err(|e| ActionError::Callback(e.0))?;

        if !value.is_truthy() {
            debug!(action_id = record.id, "Handler declined, counter unchanged");
            return Ok(value);
        }

        match self
            .db
            .actions()
            .increment_count(record.id, self.strict_limits)
            .await?
        {
            IncrementOutcome::Incremented(count) => {
                self.invalidate(record.id);
                debug!(action_id = record.id, count = count, "Secure action executed");
                Ok(value)
            }
            IncrementOutcome::LimitReached => {
                warn!(
                    action_id = record.id,
                    "Limit reached by a concurrent execution after the handler ran"
                );
                self.evict_spent(&record, "exhausted").await?;
                Err(ActionError::LimitExceeded)
            }
            IncrementOutcome::Missing => {
                warn!(
                    action_id = record.id,
                    "Secure action deleted while its handler ran"
                );
                self.invalidate(record.id);
                // Strict mode only reports success for a counted invocation.
                if self.strict_limits {
                    Err(ActionError::NotFound(format!("id {}", record.id)))
                } else {
                    Ok(value)
                }
            }
        }
    }

    /// Explicitly delete an action, bypassing expiry and limit policy.
    ///
    /// Returns `Ok(false)` when the may-delete predicate (default
    /// `!persistent`) refuses. Deleting an absent action is `NotFound`.
    pub async fn delete_action<'a>(&self, target: impl Into<ActionRef<'a>>) -> ActionResult<bool> {
        let loaded;
        let record = match target.into() {
            ActionRef::Record(record) => record,
            ActionRef::Id(id) => {
                loaded = self.load(id).await?;
                &loaded
            }
        };

        if !policy::may_delete(record, self.may_delete.as_ref()) {
            debug!(action_id = record.id, "Deletion refused by predicate");
            return Ok(false);
        }

        let removed = self.db.actions().delete(record.id).await?;
        self.invalidate(record.id);
        if !removed {
            return Err(ActionError::NotFound(format!("id {}", record.id)));
        }

        metrics::record_deleted("explicit");
        info!(action_id = record.id, name = %record.name, "Secure action deleted");
        Ok(true)
    }

    /// Load an action by id.
    pub async fn get_action(&self, id: i64) -> ActionResult<ActionRecord> {
        self.load(id).await
    }

    /// Load an action by its unique name.
    pub async fn get_action_by_name(&self, name: &str) -> ActionResult<ActionRecord> {
        let ticket = self.cache.as_ref().map(ActionCache::ticket);
        let record = self.db.actions().find_by(ActionColumn::Name, name).await?;
        if let (Some(cache), Some(ticket)) = (&self.cache, ticket) {
            cache.fill(&record, ticket);
        }
        Ok(record)
    }

    /// Re-mint an action's secret and return the new token.
    ///
    /// Only the hash changes; id, name, counters and policy are untouched.
    /// The previous secret stops verifying immediately.
    pub async fn replace_password<'a>(
        &self,
        target: impl Into<ActionRef<'a>>,
        secret: Option<&str>,
    ) -> ActionResult<String> {
        let id = target.into().id();

        let secret = match secret {
            Some(s) if s.is_empty() || s.contains(token::SEPARATOR) => {
                return Err(ActionError::InvalidRequest(
                    "secret must be non-empty and must not contain ':'".into(),
                ));
            }
            Some(s) => Zeroizing::new(s.to_string()),
            None => self.credentials.generate_secret(),
        };
        let password_hash = self
            .credentials
            .hash_secret(&secret)
            .map_err(|e| ActionError::Credential(e.to_string()))?;

        let update = ActionUpdate {
            password_hash: Some(password_hash),
            ..Default::default()
        };
        let result = self.db.actions().update(id, &update).await;
        self.invalidate(id);
        result?;

        info!(action_id = id, "Secure action secret replaced");
        Ok(token::encode(id, &secret))
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn load(&self, id: i64) -> ActionResult<ActionRecord> {
        if let Some(cache) = &self.cache
            && let Some(record) = cache.get(id)
        {
            return Ok(record);
        }

        let ticket = self.cache.as_ref().map(ActionCache::ticket);
        let record = self.db.actions().find_by_id(id).await?;
        if let (Some(cache), Some(ticket)) = (&self.cache, ticket) {
            cache.fill(&record, ticket);
        }
        Ok(record)
    }

    pub(crate) fn invalidate(&self, id: i64) {
        if let Some(cache) = &self.cache {
            cache.invalidate(id);
        }
    }

    /// Remove a genuine but spent record unless it is persistent.
    async fn evict_spent(&self, record: &ActionRecord, reason: &'static str) -> ActionResult<()> {
        if record.persistent {
            self.invalidate(record.id);
            return Ok(());
        }

        let removed = self.db.actions().delete_evictable(record.id).await?;
        self.invalidate(record.id);
        if removed {
            metrics::record_deleted(reason);
            info!(action_id = record.id, reason = reason, "Spent secure action evicted");
        }
        Ok(())
    }
}

impl std::fmt::Debug for SecureActions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureActions")
            .field("registry", &self.registry)
            .field("credentials", &self.credentials)
            .field("strict_limits", &self.strict_limits)
            .field("sweep_interval", &self.sweep_interval)
            .field("cache", &self.cache.is_some())
            .field("cleanup", &self.cleanup.is_some())
            .field("may_delete", &self.may_delete.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::HandlerError;
    use std::sync::atomic::{AtomicI64, Ordering};

    async fn engine() -> SecureActions {
        engine_with("").await.0
    }

    /// Engine with `extra` TOML appended, plus the call count of its
    /// `count` handler.
    async fn engine_with(extra: &str) -> (SecureActions, Arc<AtomicI64>) {
        let config: Config = format!(
            r#"
[database]
path = ":memory:"

[credentials]
memory_cost = 1024
time_cost = 1

{}
"#,
            extra
        )
        .parse()
        .unwrap();

        let calls = Arc::new(AtomicI64::new(0));
        let registry = Arc::new(CallbackRegistry::new());
        registry.register_fn("ok", |_, _| Ok(Value::Bool(true)));
        registry.register_fn("no", |_, _| Ok(Value::Bool(false)));
        registry.register_fn("fail", |_, _| Err(HandlerError::new("mailbox full")));
        {
            let calls = Arc::clone(&calls);
            registry.register_fn("count", move |_, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Bool(true))
            });
        }

        (SecureActions::connect(&config, registry).await.unwrap(), calls)
    }

    #[test]
    fn test_request_validation() {
        assert!(NewActionRequest::new("a", "ok").validate().is_ok());
        assert!(NewActionRequest::new("", "ok").validate().is_err());
        assert!(NewActionRequest::new("a", "ok").limit(-2).validate().is_err());
        assert!(NewActionRequest::new("a", "ok").expires_in(-5).validate().is_err());
        assert!(NewActionRequest::new("a", "ok").secret("").validate().is_err());
        assert!(NewActionRequest::new("a", "ok").secret("a:b").validate().is_err());
    }

    #[test]
    fn test_request_debug_redacts_secret() {
        let request = NewActionRequest::new("a", "ok").secret("hunter2hunter2hunter2");
        let rendered = format!("{:?}", request);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[tokio::test]
    async fn test_unknown_handler_rejected_at_creation() {
        let engine = engine().await;
        let err = engine
            .add_action(NewActionRequest::new("orphan", "missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::UnknownHandler(ref h) if h == "missing"));
        assert_eq!(engine.database().actions().len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_declined_and_failed_handlers_do_not_count() {
        let engine = engine().await;

        let declined = engine
            .add_action(NewActionRequest::new("declined", "no").limit(1))
            .await
            .unwrap();
        assert_eq!(engine.execute_action(&declined).await.unwrap(), Value::Bool(false));

        let failed = engine
            .add_action(NewActionRequest::new("failed", "fail").limit(1))
            .await
            .unwrap();
        let err = engine.execute_action(&failed).await.unwrap_err();
        assert!(matches!(err, ActionError::Callback(ref m) if m == "mailbox full"));

        for name in ["declined", "failed"] {
            assert_eq!(engine.get_action_by_name(name).await.unwrap().count, 0);
        }
    }

    #[tokio::test]
    async fn test_handler_unregistered_after_creation() {
        let engine = engine().await;
        let token = engine
            .add_action(NewActionRequest::new("later", "ok"))
            .await
            .unwrap();
        engine.registry().unregister("ok");

        let err = engine.execute_action(&token).await.unwrap_err();
        assert!(matches!(err, ActionError::UnknownHandler(_)));
    }

    #[tokio::test]
    async fn test_caller_supplied_secret() {
        let engine = engine().await;
        let token = engine
            .add_action(NewActionRequest::new("chosen", "ok").secret("correct-horse-battery-staple"))
            .await
            .unwrap();
        assert!(token.ends_with(":correct-horse-battery-staple"));
        assert!(engine.execute_action(&token).await.is_ok());
    }

    #[tokio::test]
    async fn test_stale_cached_record_cannot_lift_the_limit() {
        let (engine, calls) = engine_with("[cache]\nenabled = true\n").await;
        let raw = engine
            .add_action(NewActionRequest::new("pinned", "count").limit(1).persistent(true))
            .await
            .unwrap();
        let id = token::decode(&raw).unwrap().id;

        let stale = engine.get_action(id).await.unwrap();
        assert_eq!(stale.count, 0);
        engine.execute_action(&raw).await.unwrap();

        // A fill that lost the race with the increment's invalidation.
        let cache = engine.cache.as_ref().unwrap();
        assert!(cache.fill(&stale, cache.ticket()));

        for _ in 0..3 {
            let err = engine.execute_action(&raw).await.unwrap_err();
            assert!(matches!(err, ActionError::LimitExceeded), "got {:?}", err);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.database().actions().find_by_id(id).await.unwrap().count, 1);
        // The refusal dropped the stale entry even though the record is kept.
        assert!(cache.get(id).is_none());
        assert_eq!(engine.get_action(id).await.unwrap().count, 1);
    }
}
