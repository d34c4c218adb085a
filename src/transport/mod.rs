//! Outbound transport boundary
//!
//! The engine never talks to a broker directly. Everything it emits goes
//! through a [`Transport`], which the hosting application implements on top
//! of its broker client.

pub mod memory;

pub use memory::{DeliveryBehavior, InMemoryTransport};

use crate::error::DeliveryError;
use crate::message::{DestinationId, Message};
use async_trait::async_trait;

/// Delivery capability provided by the external transport
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver `message` to `destination`
    async fn send(&self, destination: &DestinationId, message: Message)
        -> Result<(), DeliveryError>;
}
