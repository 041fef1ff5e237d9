//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

/// Returns `true` (for serde defaults).
pub fn default_true() -> bool {
    true
}

// =============================================================================
// Database Defaults
// =============================================================================

pub fn default_database_path() -> String {
    "secure_actions.db".to_string()
}

// =============================================================================
// Credential Defaults
// =============================================================================

pub fn default_secret_length() -> usize {
    20
}

/// Argon2 memory cost in KiB (matches `argon2::Params::DEFAULT_M_COST`).
pub fn default_memory_cost() -> u32 {
    19_456
}

pub fn default_time_cost() -> u32 {
    2
}

pub fn default_parallelism() -> u32 {
    1
}

// =============================================================================
// Sweeper Defaults
// =============================================================================

/// Once a day.
pub fn default_sweep_interval() -> u64 {
    86_400
}

pub fn default_sweep_batch() -> usize {
    500
}

// =============================================================================
// Logging Defaults
// =============================================================================

pub fn default_log_filter() -> String {
    "info".to_string()
}
