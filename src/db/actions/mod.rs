//! Action repository for secure action records.
//!
//! Handles creation, lookup, partial updates, counter advancement and
//! streaming enumeration of the `secure_actions` table.

pub mod models;
pub mod queries;

pub use models::{ActionColumn, ActionRow, ActionUpdate, IncrementOutcome, NewAction};
pub use queries::ActionRepository;
