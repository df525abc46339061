//! SMTP transport backed by lettre

use super::MailTransport;
use crate::config::NotifyConfig;
use crate::error::{NotifyError, Result};
use crate::types::OutgoingMail;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, Message};
use lettre::transport::smtp::authentication::{Credentials, DEFAULT_MECHANISMS};
use lettre::transport::smtp::client::{AsyncSmtpConnection, TlsParameters};
use lettre::transport::smtp::extension::ClientId;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// Same as lettre's transport default
const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// SMTP mail transport
///
/// Holds a single lazily-opened connection that every send reuses.
/// `ssl` selects implicit TLS, otherwise the connection is plain.
/// Credentials are only sent when a username is configured.
#[derive(Default)]
pub struct SmtpTransport {
    session: Mutex<Option<AsyncSmtpConnection>>,
    connected: AtomicBool,
}

impl SmtpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn open_slot(&self, slot: &mut Option<AsyncSmtpConnection>, conn: AsyncSmtpConnection) {
        *slot = Some(conn);
        self.connected.store(true, Ordering::SeqCst);
    }

    fn close_slot(&self, slot: &mut Option<AsyncSmtpConnection>) {
        *slot = None;
        self.connected.store(false, Ordering::SeqCst);
    }
}

fn connection_error(target: &str, e: impl Display) -> NotifyError {
    NotifyError::Connection(format!("{}: {}", target, e))
}

async fn connect(config: &NotifyConfig) -> Result<AsyncSmtpConnection> {
    let target = format!("{}:{}", config.server, config.port);

    let tls = if config.ssl {
        Some(TlsParameters::new(config.server.clone()).map_err(|e| connection_error(&target, e))?)
    } else {
        None
    };

    let mut conn = AsyncSmtpConnection::connect_tokio1(
        (config.server.as_str(), config.port),
        Some(CONNECT_TIMEOUT),
        &ClientId::default(),
        tls,
        None,
    )
    .await
    .map_err(|e| connection_error(&target, e))?;

    if !config.username.is_empty() {
        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        conn.auth(DEFAULT_MECHANISMS, &credentials)
            .await
            .map_err(|e| connection_error(&target, e))?;
    }

    tracing::info!(
        server = %config.server,
        port = config.port,
        ssl = config.ssl,
        authenticated = !config.username.is_empty(),
        "Connected to SMTP server"
    );

    Ok(conn)
}

fn mailbox(addr: &str) -> Result<Mailbox> {
    addr.parse()
        .map_err(|e| NotifyError::Delivery(format!("Invalid address '{}': {}", addr, e)))
}

fn build_message(mail: &OutgoingMail) -> Result<Message> {
    let mut builder = Message::builder()
        .from(mailbox(&mail.from)?)
        .subject(mail.subject.as_str())
        .header(ContentType::TEXT_PLAIN);

    for addr in &mail.to {
        builder = builder.to(mailbox(addr)?);
    }

    builder
        .body(mail.body.clone())
        .map_err(|e| NotifyError::Delivery(format!("Failed to build message {}: {}", mail.id, e)))
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn ensure_connected(&self, config: &NotifyConfig) -> Result<()> {
        let mut slot = self.session.lock().await;
        if slot.is_none() {
            let conn = connect(config).await?;
            self.open_slot(&mut slot, conn);
        }
        Ok(())
    }

    async fn send(&self, config: &NotifyConfig, mail: &OutgoingMail) -> Result<()> {
        let message = build_message(mail)?;

        let mut slot = self.session.lock().await;
        if slot.is_none() {
            let conn = connect(config).await?;
            self.open_slot(&mut slot, conn);
        }
        let Some(conn) = slot.as_mut() else {
            return Err(NotifyError::Connection("SMTP session unavailable".to_string()));
        };

        let result = conn.send(message.envelope(), &message.formatted()).await;
        let broken = conn.has_broken();

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                // a dead connection is reopened by the next send
                if broken {
                    self.close_slot(&mut slot);
                }
                return Err(NotifyError::Delivery(format!(
                    "SMTP send of {} failed: {}",
                    mail.id, e
                )));
            }
        };

        tracing::debug!(
            mail_id = %mail.id,
            recipients = mail.to.len(),
            code = %response.code(),
            "Mail delivered"
        );

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "smtp"
    }
}
