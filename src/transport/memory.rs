use super::EmailTransport;
use crate::error::Result;
use crate::message::EmailMessage;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Transport that keeps sent messages in memory
///
/// Never fails. Clones share the same storage, so a test can hand one clone
/// to the sink and inspect another.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTransport {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
    releases: Arc<AtomicUsize>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages sent so far, oldest first
    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Number of times [`EmailTransport::release`] has been called
    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::Acquire)
    }
}

#[async_trait]
impl EmailTransport for InMemoryTransport {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        self.sent.lock().await.push(message.clone());
        Ok(())
    }

    async fn release(&self) -> Result<()> {
        self.releases.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}
