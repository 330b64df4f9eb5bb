/// Process-level configuration for the Prism renderer.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub profiling: ProfilingMode,
    /// `tracing` filter directives. `None` defers to `RUST_LOG`.
    pub log_filter: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ProfilingMode {
    /// Profiling scopes are not collected
    #[default]
    Off,
    /// Scopes are collected in-process
    On,
    /// Scopes are collected and served to `puffin_viewer` over HTTP
    Server { addr: String },
}

impl Config {
    /// Applies the logging and profiling settings.
    ///
    /// Safe to call more than once; later logger installs are ignored.
    pub fn apply(&self) {
        match &self.log_filter {
            Some(filter) => crate::logging::init_with_filter(filter),
            None => crate::logging::init(),
        }
        match &self.profiling {
            ProfilingMode::Off => crate::profiling::set_enabled(false),
            ProfilingMode::On => crate::profiling::set_enabled(true),
            ProfilingMode::Server { addr } => crate::profiling::start_server(addr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_is_repeatable() {
        let config = Config {
            log_filter: Some("warn".to_string()),
            ..Config::default()
        };
        config.apply();
        config.apply();
        assert_eq!(config.profiling, ProfilingMode::Off);
    }
}
