use tracing_subscriber::EnvFilter;

/// Filter used when neither `RUST_LOG` nor an explicit filter is provided.
///
/// The GPU stack is very chatty at debug levels, so it is clamped to `warn`.
pub const DEFAULT_FILTER: &str = "info,wgpu_core=warn,wgpu_hal=warn,naga=warn";

/// Installs the global `tracing` subscriber.
///
/// Honors `RUST_LOG` when set, otherwise falls back to [`DEFAULT_FILTER`].
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    install(filter);
}

/// Installs the global subscriber with an explicit filter directive string.
///
/// Invalid directives fall back to [`DEFAULT_FILTER`].
pub fn init_with_filter(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|err| {
        eprintln!("invalid log filter {filter:?}: {err}; using default");
        EnvFilter::new(DEFAULT_FILTER)
    });
    install(filter);
}

fn install(filter: EnvFilter) {
    // A subscriber may already be installed (tests, embedding applications).
    if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_err() {
        tracing::debug!("global tracing subscriber already installed");
    }
}
