//! Telemetry helpers for structured logging and tracing.

/// Install an env-filtered fmt subscriber as the global default.
///
/// Dispatch threads log through `tracing`; callers that own their subscriber
/// can skip this. The filter is read from `RUST_LOG`. Later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_thread_names(true)
        .try_init();
}
