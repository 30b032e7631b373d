//! Convenience macros for performance tracing
//!
//! Ergonomic wrappers over [`crate::performance::PerformanceSpan`] with
//! automatic field capture and span management.

/// Create a performance span with automatic field capture.
///
/// Returns a guard that logs timing when dropped.
///
/// # Syntax
///
/// ```text
/// perf_span!("name")
/// perf_span!("name", field1 = value1)
/// perf_span!("name", field1 = value1, field2 = value2, ...)
/// ```
///
/// # Example
///
/// ```rust
/// use prism_tracing::perf_span;
///
/// {
///     let _span = perf_span!("kernel_dispatch", groups = 16, items = 1024);
///     // ... operation code ...
/// } // Automatically logs duration with fields
/// ```
#[macro_export]
macro_rules! perf_span {
    ($name:expr) => {{
        $crate::performance::PerformanceSpan::new($name, None)
    }};
    ($name:expr, $($field:tt = $value:expr),+ $(,)?) => {{
        let _span = tracing::debug_span!(
            "perf",
            name = $name,
            $($field = $value),+
        ).entered();
        $crate::performance::PerformanceSpan::new($name, None)
    }};
}

/// Execute a block of code with automatic timing.
///
/// Returns a tuple of (result, duration_in_microseconds).
///
/// # Example
///
/// ```rust
/// use prism_tracing::timed_block;
///
/// let (sum, duration_us) = timed_block!("sum_calculation", {
///     (1..=100).sum::<i32>()
/// });
///
/// assert_eq!(sum, 5050);
/// let _ = duration_us;
/// ```
#[macro_export]
macro_rules! timed_block {
    ($name:expr, $block:block) => {{
        let start = std::time::Instant::now();
        let result = $block;
        let duration_us = start.elapsed().as_micros() as u64;
        tracing::debug!(
            operation = $name,
            duration_us = duration_us,
            duration_ms = duration_us as f64 / 1000.0,
            "timed_block_complete"
        );
        (result, duration_us)
    }};
}
