//! Integration test common infrastructure.
//!
//! Builds engines over private in-memory databases with cheap hashing, a
//! manual clock and a handful of instrumented handlers.

#![allow(dead_code)]

use secure_actions::{
    CallbackRegistry, Config, HandlerError, ManualClock, SecureActions, Value,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Start of time for every test clock.
pub const EPOCH: i64 = 1_700_000_000;

/// Handler ids registered on every test engine.
pub const COUNT: &str = "test.count";
pub const ECHO: &str = "test.echo";
pub const DECLINE: &str = "test.decline";
pub const FAIL: &str = "test.fail";

/// An engine plus the knobs tests turn.
pub struct TestEngine {
    pub actions: Arc<SecureActions>,
    pub clock: Arc<ManualClock>,
    /// Invocations of the `COUNT` handler.
    pub calls: Arc<AtomicI64>,
}

impl TestEngine {
    /// In-memory engine with default execution settings.
    pub async fn spawn() -> anyhow::Result<Self> {
        Self::build(":memory:", "", |engine| engine).await
    }

    /// Engine over `db_path` with `extra` TOML appended to the base config
    /// and `customize` applied before it is shared.
    pub async fn build(
        db_path: &str,
        extra: &str,
        customize: impl FnOnce(SecureActions) -> SecureActions,
    ) -> anyhow::Result<Self> {
        secure_actions::telemetry::init_tracing("warn");
        secure_actions::metrics::init();

        let config: Config = format!(
            r#"
[database]
path = "{}"

[credentials]
memory_cost = 1024
time_cost = 1

{}
"#,
            db_path, extra
        )
        .parse()?;

        let calls = Arc::new(AtomicI64::new(0));
        let registry = Arc::new(CallbackRegistry::new());
        {
            let calls = Arc::clone(&calls);
            registry.register_fn(COUNT, move |_, _| {
                Ok(Value::Int(calls.fetch_add(1, Ordering::SeqCst) + 1))
            });
        }
        registry.register_fn(ECHO, |args, action| {
            let mut out = args.to_vec();
            out.push(Value::Int(action.id));
            Ok(Value::List(out))
        });
        registry.register_fn(DECLINE, |_, _| Ok(Value::Bool(false)));
        registry.register_fn(FAIL, |_, _| Err(HandlerError::new("downstream unavailable")));

        let clock = Arc::new(ManualClock::new(EPOCH));
        let engine = SecureActions::connect(&config, registry)
            .await?
            .with_clock(clock.clone());

        Ok(Self {
            actions: Arc::new(customize(engine)),
            clock,
            calls,
        })
    }

    pub fn calls(&self) -> i64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Id encoded in a raw token.
    pub fn id_of(token: &str) -> i64 {
        secure_actions::token::decode(token)
            .expect("test token decodes")
            .id
    }

    /// Whether a record with this id is still stored.
    pub async fn exists(&self, id: i64) -> bool {
        self.actions
            .database()
            .actions()
            .exists(id)
            .await
            .expect("exists query")
    }
}
