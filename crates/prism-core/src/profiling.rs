//! Profiling utilities based on the `puffin` crate.
//!
//! With the `profiling` feature disabled the macros expand to nothing, so call
//! sites can stay in hot paths unconditionally.

#[cfg(feature = "profiling")]
pub use puffin::{GlobalProfiler, profile_function, profile_scope};

#[cfg(feature = "profiling")]
static PROFILING_SERVER: std::sync::OnceLock<puffin_http::Server> = std::sync::OnceLock::new();

#[cfg(not(feature = "profiling"))]
pub use crate::{__noop_profile_function as profile_function, __noop_profile_scope as profile_scope};

#[doc(hidden)]
#[macro_export]
macro_rules! __noop_profile_function {
    ($($arg:tt)*) => {};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __noop_profile_scope {
    ($($arg:tt)*) => {};
}

/// Enables or disables scope collection.
#[inline]
pub fn set_enabled(enabled: bool) {
    #[cfg(feature = "profiling")]
    puffin::set_scopes_on(enabled);
    #[cfg(not(feature = "profiling"))]
    if enabled {
        tracing::warn!("profiling requested but prism-core was built without the `profiling` feature");
    }
}

/// Enables scope collection and serves it to `puffin_viewer` on `addr`.
///
/// Only the first successful server is kept; later calls just enable scopes.
pub fn start_server(addr: &str) {
    #[cfg(feature = "profiling")]
    {
        puffin::set_scopes_on(true);
        if PROFILING_SERVER.get().is_some() {
            return;
        }
        match puffin_http::Server::new(addr) {
            Ok(server) => {
                tracing::info!("Puffin profiler server started on http://{}", addr);
                let _ = PROFILING_SERVER.set(server);
            }
            Err(e) => tracing::error!("Failed to start puffin server: {}", e),
        }
    }
    #[cfg(not(feature = "profiling"))]
    tracing::warn!(addr, "profiling server requested but prism-core was built without the `profiling` feature");
}

/// Mark the start of a new frame for profiling.
///
/// Call this once per frame so scopes are grouped by frame in the viewer.
#[inline]
pub fn new_frame() {
    #[cfg(feature = "profiling")]
    puffin::GlobalProfiler::lock().new_frame();
}
