//! Shared tracing configuration utilities for the Prism workspace.
//!
//! The helpers in this crate centralise how executables, integration tests,
//! and supporting tools install `tracing` subscribers. By routing setup
//! through a single crate we avoid copy-pasting builder logic and keep the
//! logging surface consistent across binaries.

pub mod performance;

#[macro_use]
pub mod macros;

use std::env;

pub use tracing::{debug, error, info, trace, warn};

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Output format for the formatter layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracingOutput {
    /// Human-readable, multi-line output for local development.
    Pretty,
    /// Single-line output for terminals with limited space.
    Compact,
    /// Machine-readable JSON for CI and log collection.
    Json,
}

/// Configuration describing how the shared tracing subscriber should behave.
#[derive(Clone, Debug)]
pub struct TracingConfig {
    /// Optional tracing directives (e.g. `prism_backends=debug,info`). When
    /// absent the crate falls back to `RUST_LOG` and finally to
    /// [`TracingConfig::default_directive`].
    pub directives: Option<String>,
    /// Fallback directive used when neither `directives` nor `RUST_LOG`
    /// resolve to a valid filter.
    pub default_directive: String,
    /// Controls whether event targets (module paths) appear in output.
    pub include_targets: bool,
    /// Controls ANSI formatting. Disable for CI logs that strip colour codes.
    pub ansi: bool,
    /// Span lifecycle events to emit. Defaults to [`FmtSpan::NONE`].
    pub span_events: FmtSpan,
    /// Output format for the formatter layer.
    pub output: TracingOutput,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::for_local()
    }
}

impl TracingConfig {
    /// Returns a configuration tuned for local development (pretty, ANSI-enabled output).
    pub fn for_local() -> Self {
        Self {
            directives: None,
            default_directive: "info".to_string(),
            include_targets: true,
            ansi: true,
            span_events: FmtSpan::NONE,
            output: TracingOutput::Pretty,
        }
    }

    /// Returns a configuration tuned for CI or log collection environments (JSON, no ANSI).
    pub fn for_ci() -> Self {
        Self {
            directives: None,
            default_directive: "info".to_string(),
            include_targets: true,
            ansi: false,
            span_events: FmtSpan::NONE,
            output: TracingOutput::Json,
        }
    }

    /// Returns a configuration suitable for unit and integration tests
    /// (compact output, `warn` fallback so passing runs stay quiet).
    pub fn for_tests() -> Self {
        Self {
            directives: None,
            default_directive: "warn".to_string(),
            include_targets: false,
            ansi: false,
            span_events: FmtSpan::NONE,
            output: TracingOutput::Compact,
        }
    }

    fn env_filter(&self) -> EnvFilter {
        if let Some(directives) = &self.directives {
            if let Ok(filter) = EnvFilter::try_new(directives) {
                return filter;
            }
        }
        if let Ok(raw) = env::var(EnvFilter::DEFAULT_ENV) {
            if let Ok(filter) = EnvFilter::try_new(raw) {
                return filter;
            }
        }
        EnvFilter::new(&self.default_directive)
    }
}

/// Install the global tracing subscriber described by `config`.
///
/// # Panics
///
/// Panics if a global subscriber is already installed. Prefer
/// [`try_init_tracing`] in tests, where multiple harness processes may race
/// to install one.
pub fn init_tracing(config: TracingConfig) {
    try_init_tracing(config).expect("global tracing subscriber already installed");
}

/// Install the global tracing subscriber, returning an error instead of
/// panicking when one is already present.
pub fn try_init_tracing(config: TracingConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = config.env_filter();
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.include_targets)
        .with_ansi(config.ansi)
        .with_span_events(config.span_events.clone());

    match config.output {
        TracingOutput::Pretty => builder.pretty().finish().try_init(),
        TracingOutput::Compact => builder.compact().finish().try_init(),
        TracingOutput::Json => builder.json().finish().try_init(),
    }
}
