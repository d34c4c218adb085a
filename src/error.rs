//! Error types for the routing engine
//!
//! Failures are split by how far they travel: configuration problems abort
//! construction, handler and tap failures stay local to the branch that hit
//! them, and pool shutdown aborts the dispatch that observed it.

use crate::message::DestinationId;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Problems detected while building routes, pools, groups or aggregators.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Route '{route}' has no default destination")]
    MissingDefaultRoute { route: String },

    #[error("Multicast group '{group}' has no destinations")]
    EmptyMulticastGroup { group: String },

    #[error("Worker pool '{pool}' must have a capacity of at least 1")]
    InvalidPoolSize { pool: String },

    #[error("Worker pool '{pool}' is defined more than once")]
    DuplicatePool { pool: String },

    #[error("'{owner}' references unknown worker pool '{pool}'")]
    UnknownPool { owner: String, pool: String },

    #[error("Channel '{channel}' is configured more than once")]
    DuplicateChannel { channel: String },

    #[error("Invalid pattern '{pattern}' for header '{header}'")]
    InvalidPattern {
        header: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Aggregation completion size must be at least 1")]
    InvalidCompletionSize,

    #[error("Failed to read configuration from {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// The outbound transport could not deliver a message.
#[derive(Debug, Clone, Error)]
#[error("Delivery to '{destination}' failed: {reason}")]
pub struct DeliveryError {
    pub destination: DestinationId,
    pub reason: String,
}

impl DeliveryError {
    pub fn new(destination: DestinationId, reason: impl Into<String>) -> Self {
        Self {
            destination,
            reason: reason.into(),
        }
    }
}

/// Failure of a single unit of work (a multicast branch or a split part).
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error("Handler failed: {reason}")]
    Failed { reason: String },

    #[error("Handler for '{destination}' panicked")]
    Panicked { destination: DestinationId },

    #[error("Handler for '{destination}' was aborted")]
    Aborted { destination: DestinationId },
}

/// Errors that abort a dispatch as a whole.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The pool stopped accepting work while submissions were pending.
    #[error("Worker pool '{pool}' is shut down")]
    PoolShutdown { pool: String },
}

/// A correlation id did not complete within its window.
#[derive(Debug, Clone, Error)]
#[error(
    "Aggregation {correlation_id} timed out after {waited:?} with {parts_received} of {} parts",
    .total_parts.map_or_else(|| "?".to_string(), |n| n.to_string())
)]
pub struct AggregationTimeoutError {
    pub correlation_id: String,
    pub parts_received: usize,
    pub total_parts: Option<usize>,
    pub waited: Duration,
}

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error(transparent)]
    Timeout(#[from] AggregationTimeoutError),

    #[error("Aggregation {correlation_id} is already closed")]
    Closed { correlation_id: String },

    #[error("Part {index} of aggregation {correlation_id} was already received")]
    DuplicatePart { correlation_id: String, index: usize },

    #[error("Invalid split part: {reason}")]
    InvalidPart { reason: String },
}

/// Umbrella error for engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    #[error("No route or multicast group is bound to channel '{0}'")]
    UnknownChannel(String),

    #[error("Splitting message {correlation_id} produced no parts")]
    EmptySplit { correlation_id: String },

    #[error("Aggregation {correlation_id} ended without an aggregate")]
    Incomplete { correlation_id: String },
}

pub type Result<T> = std::result::Result<T, EngineError>;
