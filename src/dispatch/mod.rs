//! Bounded-parallel multicast
//!
//! - `pool` - Fixed-capacity worker pool shared by multicast groups
//! - `multicast` - Group definition and the dispatcher that fans a message out

pub mod multicast;
pub mod pool;

pub use multicast::{MulticastGroup, Outcome, ParallelMulticastDispatcher};
pub use pool::{PoolMetrics, WorkerPermit, WorkerPool};
