use super::EngineConfig;
use crate::error::ConfigurationError;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Loads and validates engine configuration files
pub struct ConfigLoader {
    path: PathBuf,
}

impl ConfigLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read, parse and validate the configuration file
    pub async fn load(&self) -> Result<EngineConfig, ConfigurationError> {
        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|source| ConfigurationError::Io {
                path: self.path.clone(),
                source,
            })?;

        let config = EngineConfig::from_toml_str(&content)?;
        config.validate()?;

        debug!(
            path = %self.path.display(),
            pools = config.pools.len(),
            routes = config.routes.len(),
            multicast = config.multicast.len(),
            "Loaded engine configuration"
        );
        Ok(config)
    }
}
