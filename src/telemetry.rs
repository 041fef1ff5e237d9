//! Telemetry utilities: execution timing, standard spans, subscriber setup.

use crate::config::{LogFormat, LoggingConfig};
use std::time::Instant;
use tracing::Subscriber;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

/// Guard for timing an execution and recording metrics.
///
/// Records the outcome and latency when dropped. The outcome defaults to
/// `"aborted"` until [`finish`](Self::finish) sets it.
pub struct ExecutionTimer {
    outcome: &'static str,
    start: Instant,
}

impl ExecutionTimer {
    /// Start timing an execution.
    pub fn new() -> Self {
        Self {
            outcome: "aborted",
            start: Instant::now(),
        }
    }

    /// Set the outcome label recorded on drop.
    pub fn finish(&mut self, outcome: &'static str) {
        self.outcome = outcome;
    }
}

impl Default for ExecutionTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ExecutionTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_execution(self.outcome, duration);
    }
}

/// Install a global text subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter` (e.g. `"info"`).
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(default_filter: &str) -> bool {
    init_logging(&LoggingConfig {
        filter: default_filter.to_string(),
        format: LogFormat::Text,
    })
}

/// Install a global subscriber from the `[logging]` config section.
///
/// `RUST_LOG` still overrides the configured filter.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));
    tracing::subscriber::set_global_default(subscriber(config.format, filter, std::io::stdout))
        .is_ok()
}

fn subscriber<W>(
    format: LogFormat,
    filter: EnvFilter,
    writer: W,
) -> Box<dyn Subscriber + Send + Sync>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(writer);
    match format {
        LogFormat::Text => Box::new(builder.finish()),
        LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
    }
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, info_span};

    /// Span for one `execute_action` call. The id is recorded once decoded.
    pub fn execute() -> Span {
        info_span!("action.execute", action_id = tracing::field::Empty)
    }

    /// Span for one sweep.
    pub fn sweep() -> Span {
        info_span!("action.sweep")
    }
}
