//! Engine configuration
//!
//! Everything the engine needs is supplied as data at construction time:
//! worker pools, route tables, multicast groups and aggregation settings.
//! Configuration is usually loaded from a TOML file through [`ConfigLoader`].

use crate::error::ConfigurationError;
use crate::routing::TapPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

pub mod loader;
pub mod predicate;

pub use loader::ConfigLoader;
pub use predicate::PredicateSpec;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub pools: Vec<PoolConfig>,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    #[serde(default)]
    pub multicast: Vec<MulticastConfig>,
    #[serde(default)]
    pub aggregation: AggregationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub name: String,
    pub size: usize,
}

/// Content-based route bound to an inbound channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    pub channel: String,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
    pub default: Option<String>,
    /// Secondary destination that receives a copy of every message
    pub wire_tap: Option<String>,
    #[serde(default)]
    pub tap_policy: TapPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    pub when: PredicateSpec,
    pub to: String,
}

/// Multicast group bound to an inbound channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MulticastConfig {
    pub channel: String,
    pub pool: String,
    pub destinations: Vec<String>,
    /// Messages rejected by the filter are not dispatched
    pub filter: Option<PredicateSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionSpec {
    #[default]
    SplitSize,
    Fixed(usize),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    #[serde(default = "default_aggregation_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default)]
    pub completion: CompletionSpec,
    /// Body delimiter used by the splitter
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Body separator used when joining parts back together
    #[serde(default = "default_delimiter")]
    pub separator: String,
    /// Pool that runs part processing; defaults to the first configured pool
    pub pool: Option<String>,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            timeout: default_aggregation_timeout(),
            completion: CompletionSpec::default(),
            delimiter: default_delimiter(),
            separator: default_delimiter(),
            pool: None,
        }
    }
}

fn default_aggregation_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_delimiter() -> String {
    ",".to_string()
}

impl EngineConfig {
    /// Parse a configuration document. Parsing never consults the environment.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigurationError> {
        Ok(toml::from_str(content)?)
    }

    /// Structural checks that do not require building anything.
    ///
    /// Predicates and pools are checked again when the engine is built.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let mut pool_names = HashSet::new();
        for pool in &self.pools {
            if pool.size == 0 {
                return Err(ConfigurationError::InvalidPoolSize {
                    pool: pool.name.clone(),
                });
            }
            if !pool_names.insert(pool.name.as_str()) {
                return Err(ConfigurationError::DuplicatePool {
                    pool: pool.name.clone(),
                });
            }
        }

        let mut channels = HashSet::new();
        for route in &self.routes {
            if route.default.is_none() {
                return Err(ConfigurationError::MissingDefaultRoute {
                    route: route.channel.clone(),
                });
            }
            if !channels.insert(route.channel.as_str()) {
                return Err(ConfigurationError::DuplicateChannel {
                    channel: route.channel.clone(),
                });
            }
            for rule in &route.rules {
                rule.when.compile()?;
            }
        }

        for group in &self.multicast {
            if group.destinations.is_empty() {
                return Err(ConfigurationError::EmptyMulticastGroup {
                    group: group.channel.clone(),
                });
            }
            if !pool_names.contains(group.pool.as_str()) {
                return Err(ConfigurationError::UnknownPool {
                    owner: group.channel.clone(),
                    pool: group.pool.clone(),
                });
            }
            if !channels.insert(group.channel.as_str()) {
                return Err(ConfigurationError::DuplicateChannel {
                    channel: group.channel.clone(),
                });
            }
            if let Some(filter) = &group.filter {
                filter.compile()?;
            }
        }

        if let CompletionSpec::Fixed(0) = self.aggregation.completion {
            return Err(ConfigurationError::InvalidCompletionSize);
        }
        if let Some(pool) = &self.aggregation.pool {
            if !pool_names.contains(pool.as_str()) {
                return Err(ConfigurationError::UnknownPool {
                    owner: "aggregation".to_string(),
                    pool: pool.clone(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
