//! Mail transport trait — the seam between the notifier and SMTP
//!
//! A transport owns at most one mail session. The session is created lazily
//! by `ensure_connected` and reused for every subsequent `send`.

use crate::config::NotifyConfig;
use crate::error::Result;
use crate::types::OutgoingMail;
use async_trait::async_trait;

pub mod memory;
pub mod smtp;

/// Core trait for mail backends
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Open the session if none exists yet
    ///
    /// On failure the session stays uninitialized and the next call
    /// tries again.
    async fn ensure_connected(&self, config: &NotifyConfig) -> Result<()>;

    /// Deliver a message, connecting first if needed
    async fn send(&self, config: &NotifyConfig, mail: &OutgoingMail) -> Result<()>;

    /// Whether a session has been established
    fn is_connected(&self) -> bool;

    /// Transport name (e.g., "smtp", "memory")
    fn name(&self) -> &str;
}
