//! secure-actions - single-use and limited-use bearer tokens bound to
//! server-side actions.
//!
//! A host registers handlers in a [`CallbackRegistry`], mints an action with
//! [`SecureActions::add_action`] and hands the returned `"<id>:<secret>"`
//! token (usually base64-wrapped with [`token::wrap`]) to a user. Presenting
//! the token to [`SecureActions::execute_action`] runs the bound handler,
//! subject to the action's invocation limit and expiration.
//!
//! ```no_run
//! use secure_actions::{CallbackRegistry, Config, NewActionRequest, SecureActions, Value, token};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(CallbackRegistry::new());
//! registry.register_fn("newsletter.confirm", |args, _action| {
//!     Ok(Value::Bool(!args.is_empty()))
//! });
//!
//! let config = Config::load("secure_actions.toml")?;
//! let actions = SecureActions::connect(&config, registry).await?;
//!
//! let raw = actions
//!     .add_action(
//!         NewActionRequest::new("confirm:alice@example.com", "newsletter.confirm")
//!             .args(vec![Value::from("alice@example.com")])
//!             .limit(1)
//!             .expires_in(86_400),
//!     )
//!     .await?;
//! let link = format!("https://example.com/confirm/{}", token::wrap(&raw));
//! # let _ = link;
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod cache;
pub mod clock;
pub mod config;
pub mod credential;
pub mod db;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod policy;
pub mod registry;
pub mod sweeper;
pub mod telemetry;
pub mod token;

pub use action::{ActionRecord, ActionRef, CallbackRef, NEVER_EXPIRES, UNLIMITED, Value};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use db::Database;
pub use engine::{NewActionRequest, SecureActions};
pub use error::{ActionError, ActionResult};
pub use registry::{ActionHandler, CallbackRegistry, HandlerError, HandlerResult};
pub use sweeper::{SweepReport, spawn_sweep_task};
