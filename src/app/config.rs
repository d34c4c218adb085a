//! Application configuration
//!
//! Settings of the `switchyard` binary itself, as opposed to the engine
//! configuration it loads.

/// Environment variable that overrides every other log filter source
pub const LOG_ENV_VAR: &str = "SWITCHYARD_LOG";

/// Application configuration structure
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Verbosity level for logging
    pub verbose: u8,
    /// Log filter taken from the engine configuration file
    pub configured_log_level: Option<String>,
}

impl AppConfig {
    pub fn new(verbose: u8) -> Self {
        Self {
            verbose,
            configured_log_level: None,
        }
    }

    pub fn with_configured_log_level(mut self, level: Option<String>) -> Self {
        self.configured_log_level = level;
        self
    }

    /// Log filter: `SWITCHYARD_LOG`, then `-v` flags, then the config file, then `info`
    pub fn log_level(&self) -> String {
        self.resolve_log_level(std::env::var(LOG_ENV_VAR).ok())
    }

    fn resolve_log_level(&self, from_env: Option<String>) -> String {
        if let Some(level) = from_env {
            return level;
        }

        match self.verbose {
            0 => self
                .configured_log_level
                .clone()
                .unwrap_or_else(|| "info".to_string()),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    }
}
