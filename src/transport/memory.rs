//! In-memory mail transport for development and testing
//!
//! Records session establishment and every delivered message instead of
//! talking to a server. Connect and send failures can be switched on to
//! exercise error propagation.

use super::MailTransport;
use crate::config::NotifyConfig;
use crate::error::{NotifyError, Result};
use crate::types::OutgoingMail;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Recording mail transport
#[derive(Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    sent: RwLock<Vec<OutgoingMail>>,
    connected: AtomicBool,
    connects: AtomicUsize,
    connect_attempts: AtomicUsize,
    fail_connect: AtomicBool,
    fail_send: AtomicBool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent connection attempts fail
    pub fn set_fail_connect(&self, fail: bool) {
        self.inner.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent sends fail
    pub fn set_fail_send(&self, fail: bool) {
        self.inner.fail_send.store(fail, Ordering::SeqCst);
    }

    /// Messages delivered so far, oldest first
    pub async fn sent(&self) -> Vec<OutgoingMail> {
        self.inner.sent.read().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.inner.sent.read().await.len()
    }

    /// Number of sessions established
    pub fn connect_count(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    /// Number of times a session was attempted, successful or not
    pub fn connect_attempts(&self) -> usize {
        self.inner.connect_attempts.load(Ordering::SeqCst)
    }

    /// Drop recorded mail and the session
    pub async fn reset(&self) {
        self.inner.sent.write().await.clear();
        self.inner.connected.store(false, Ordering::SeqCst);
        self.inner.connects.store(0, Ordering::SeqCst);
        self.inner.connect_attempts.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl MailTransport for MemoryTransport {
    async fn ensure_connected(&self, config: &NotifyConfig) -> Result<()> {
        if self.inner.connected.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.inner.connect_attempts.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_connect.load(Ordering::SeqCst) {
            return Err(NotifyError::Connection(format!(
                "{}:{}: connection refused",
                config.server, config.port
            )));
        }

        self.inner.connected.store(true, Ordering::SeqCst);
        self.inner.connects.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(server = %config.server, port = config.port, "Memory session opened");
        Ok(())
    }

    async fn send(&self, config: &NotifyConfig, mail: &OutgoingMail) -> Result<()> {
        self.ensure_connected(config).await?;

        if self.inner.fail_send.load(Ordering::SeqCst) {
            return Err(NotifyError::Delivery(format!("{} rejected", mail.id)));
        }
        if mail.to.is_empty() {
            return Err(NotifyError::Delivery(format!("{} has no recipients", mail.id)));
        }

        self.inner.sent.write().await.push(mail.clone());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
