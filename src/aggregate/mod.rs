//! Recombination of split parts
//!
//! - `strategy` - How two partial results are combined
//! - `completion` - When an aggregation is done
//! - `aggregator` - Per-correlation state machine with ordering and expiry

pub mod aggregator;
pub mod completion;
pub mod strategy;

pub use aggregator::Aggregator;
pub use completion::{CompletionFunction, CompletionPolicy};
pub use strategy::{AggregationStrategy, CombineFunction};
