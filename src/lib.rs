//! # Switchyard
//!
//! An in-process message routing and fan-out engine: content-based routing
//! with a wire tap, bounded-parallel multicast, and split/aggregate
//! recombination. Transports plug in through the [`transport::Transport`]
//! trait; the engine only decides where messages go and how parts are put
//! back together.
//!
//! ## Modules
//!
//! - `message` - Immutable message values and destination ids
//! - `routing` - Predicates, the content-based router and the wire tap
//! - `dispatch` - Bounded worker pool and parallel multicast dispatcher
//! - `split` - Splitters that break a message into indexed parts
//! - `aggregate` - Aggregation strategies, completion policies and the aggregator
//! - `engine` - Assembly from configuration and the inbound entry point
//! - `transport` - Outbound delivery boundary and an in-memory implementation
//! - `config` - TOML configuration and validation
//! - `app` - Logging and error reporting for the binary
pub mod aggregate;
pub mod app;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod message;
pub mod routing;
pub mod split;
pub mod transport;

pub use engine::{Engine, Receipt};
pub use error::{EngineError, Result};
pub use message::{DestinationId, Message};
