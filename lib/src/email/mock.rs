//! In-memory gateway used for tests and dry runs against real data.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fnv::FnvHashMap;
use tokio::sync::Mutex;

use crate::{ErrorKind, Result};

use super::{Envelope, Gateway};

/// Gateway that records every envelope it accepts.
///
/// Failures can be scripted per recipient address, and sends to selected
/// addresses can be made to stall.
#[derive(Clone, Default)]
pub struct MockGateway {
    sent: Arc<Mutex<Vec<Envelope>>>,
    failures: Arc<Mutex<FnvHashMap<String, String>>>,
    stalls: Arc<Mutex<FnvHashMap<String, Duration>>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every send to `recipient` fail with `message`.
    pub async fn fail_for(&self, recipient: impl Into<String>, message: impl Into<String>) {
        self.failures
            .lock()
            .await
            .insert(recipient.into(), message.into());
    }

    /// Makes every send to `recipient` take `delay` before succeeding.
    pub async fn stall_for(&self, recipient: impl Into<String>, delay: Duration) {
        self.stalls.lock().await.insert(recipient.into(), delay);
    }

    pub async fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    pub async fn was_sent_to(&self, recipient: &str) -> bool {
        self.sent
            .lock()
            .await
            .iter()
            .any(|e| e.recipient == recipient)
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn send(&self, envelope: &Envelope) -> Result<()> {
        let stall = self.stalls.lock().await.get(&envelope.recipient).copied();
        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = self.failures.lock().await.get(&envelope.recipient) {
            return Err(ErrorKind::GatewaySend(message.clone()).into());
        }

        self.sent.lock().await.push(envelope.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
