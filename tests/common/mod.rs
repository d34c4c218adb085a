//! Common test utilities and helpers

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use switchyard::error::DeliveryError;
use switchyard::transport::Transport;
use switchyard::{DestinationId, Message};
use tokio::sync::Mutex;

/// Path of the bundled order routing configuration
pub fn orders_config_path() -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config/orders.toml")
}

pub fn order(file_name: &str, body: &str) -> Message {
    Message::new(body.to_string()).with_header("CamelFileName", file_name)
}

/// Transport that sleeps in every send and records how many sends overlap
#[derive(Default)]
pub struct InstrumentedTransport {
    pub delay: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
    finished: Mutex<Vec<DestinationId>>,
}

impl InstrumentedTransport {
    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Destinations in the order their sends completed
    pub async fn finished(&self) -> Vec<DestinationId> {
        self.finished.lock().await.clone()
    }
}

#[async_trait]
impl Transport for InstrumentedTransport {
    async fn send(&self, destination: &DestinationId, _message: Message) -> Result<(), DeliveryError> {
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now_active, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.finished.lock().await.push(destination.clone());
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}
