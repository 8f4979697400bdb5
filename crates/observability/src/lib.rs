//! Tracing and logging setup shared by binaries and test harnesses.

/// Initialize process-wide tracing.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Initialize tracing for a test binary (human-readable, captured by libtest).
pub fn init_for_tests() {
    tracing::init_for_tests();
}

/// Tracing configuration (filters, formatters).
pub mod tracing;
