//! Content-based routing and wire tapping

pub mod predicate;
pub mod router;
pub mod tap;

pub use predicate::Predicate;
pub use router::{Router, RouterBuilder, Rule};
pub use tap::{TapPolicy, WireTap};
