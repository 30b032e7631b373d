//! Performance-focused tracing utilities
//!
//! Provides RAII timing guards with optional threshold filtering so that hot
//! paths can be instrumented without flooding the log on fast iterations.

use std::time::Instant;
use tracing::Level;

/// RAII guard that measures span duration and conditionally logs based on threshold.
///
/// The span is automatically timed when created and logged when dropped, but only
/// if the duration exceeds the optional threshold.
///
/// # Example
///
/// ```rust
/// use prism_tracing::performance::PerformanceSpan;
///
/// {
///     let _span = PerformanceSpan::new("expensive_operation", Some(1000));
///     // ... operation code ...
/// } // Span logged only if duration > 1000μs
/// ```
pub struct PerformanceSpan {
    _span_name: String,
    threshold_us: Option<u64>,
    start_time: Instant,
    span: tracing::Span,
}

impl PerformanceSpan {
    /// Create a new performance span with optional threshold filtering.
    ///
    /// # Arguments
    ///
    /// * `span_name` - Name of the operation being measured
    /// * `threshold_us` - Minimum duration in microseconds to log (None = always log)
    pub fn new(span_name: impl Into<String>, threshold_us: Option<u64>) -> Self {
        let span_name = span_name.into();
        let span = tracing::debug_span!("perf", name = %span_name);
        let start_time = Instant::now();

        Self {
            _span_name: span_name,
            threshold_us,
            start_time,
            span,
        }
    }

    /// Create a new performance span at the specified tracing level.
    pub fn with_level(level: Level, span_name: impl Into<String>, threshold_us: Option<u64>) -> Self {
        let span_name = span_name.into();
        let span = match level {
            Level::TRACE => tracing::trace_span!("perf", name = %span_name),
            Level::DEBUG => tracing::debug_span!("perf", name = %span_name),
            Level::INFO => tracing::info_span!("perf", name = %span_name),
            Level::WARN => tracing::warn_span!("perf", name = %span_name),
            Level::ERROR => tracing::error_span!("perf", name = %span_name),
        };
        let start_time = Instant::now();

        Self {
            _span_name: span_name,
            threshold_us,
            start_time,
            span,
        }
    }

    /// Get the elapsed time since span creation.
    pub fn elapsed_us(&self) -> u64 {
        self.start_time.elapsed().as_micros() as u64
    }

    /// Enter this span's context.
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for PerformanceSpan {
    fn drop(&mut self) {
        let elapsed_us = self.elapsed_us();

        // Only log if threshold is None or duration exceeds threshold
        if self.threshold_us.is_none_or(|t| elapsed_us >= t) {
            let _entered = self.span.enter();
            tracing::debug!(
                duration_us = elapsed_us,
                duration_ms = elapsed_us as f64 / 1000.0,
                "performance_span_complete"
            );
        }
    }
}

/// Record a host↔device transfer event with standard fields.
///
/// # Arguments
///
/// * `bytes` - Number of bytes transferred
/// * `direction` - `"H2D"` or `"D2H"`
/// * `duration_us` - Transfer duration in microseconds
pub fn record_transfer(bytes: usize, direction: &str, duration_us: u64) {
    let bandwidth_mbps = if duration_us > 0 {
        (bytes as f64 / duration_us as f64) * 1_000_000.0 / (1024.0 * 1024.0)
    } else {
        0.0
    };

    tracing::debug!(
        bytes = bytes,
        kb = bytes as f64 / 1024.0,
        direction = direction,
        duration_us = duration_us,
        bandwidth_mbps = bandwidth_mbps,
        "transfer_complete"
    );
}
