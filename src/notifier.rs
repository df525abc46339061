//! Notifier: render the template for an event and hand it to a transport

use crate::config::NotifyConfig;
use crate::error::{NotifyError, Result};
use crate::template;
use crate::transport::MailTransport;
use crate::types::{LifecycleEvent, Observed, OutgoingMail};
use chrono::{DateTime, Local};
use std::sync::Arc;

/// Formats notifications and sends them through a mail transport
#[derive(Clone)]
pub struct Notifier {
    transport: Arc<dyn MailTransport>,
}

impl Notifier {
    /// Create a notifier owning a transport
    pub fn new(transport: impl MailTransport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    /// Create a notifier over a transport shared with the caller
    pub fn from_shared(transport: Arc<dyn MailTransport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &dyn MailTransport {
        self.transport.as_ref()
    }

    /// Build the message for an event without sending it
    pub fn compose(
        &self,
        config: &NotifyConfig,
        event: LifecycleEvent,
        observed: Observed<'_>,
        now: DateTime<Local>,
    ) -> Result<OutgoingMail> {
        if observed.kind() != event.kind {
            return Err(NotifyError::Config(format!(
                "{} event raised for a {}",
                event,
                observed.kind()
            )));
        }

        let rendered = template::render(template::lookup(event), observed, now)?;
        Ok(OutgoingMail::new(
            config.from.clone(),
            config.to.to_vec(),
            rendered.subject,
            rendered.body,
        ))
    }

    /// Render and send one notification
    pub async fn notify(
        &self,
        config: &NotifyConfig,
        event: LifecycleEvent,
        observed: Observed<'_>,
        now: DateTime<Local>,
    ) -> Result<OutgoingMail> {
        let mail = self.compose(config, event, observed, now)?;

        tracing::debug!(
            event = %event,
            mail_id = %mail.id,
            transport = self.transport.name(),
            "Notifying {}",
            event
        );

        self.transport.send(config, &mail).await?;
        Ok(mail)
    }
}
