//! Lifecycle hooks exposed to the host pipeline runner
//!
//! Each hook checks the `when` policy for its category and, when the
//! status code is listed, renders and sends exactly one notification.
//! Errors are returned to the host untouched.

use crate::config::{self, NotifyConfig};
use crate::error::Result;
use crate::notifier::Notifier;
use crate::transport::smtp::SmtpTransport;
use crate::transport::MailTransport;
use crate::types::{
    EntityKind, JobInfo, LifecycleEvent, Observed, OutgoingMail, PipelineInfo, ProcessInfo,
    Status,
};
use chrono::{DateTime, Local};
use serde_json::{Map, Value};
use std::sync::Arc;

type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

/// Email notification plugin
///
/// Owns the notifier (and through it the mail session). The host passes
/// the merged configuration attached to the observed object on every hook.
pub struct NotifyPlugin {
    notifier: Notifier,
    clock: Clock,
}

impl NotifyPlugin {
    /// Create a plugin sending through the given transport
    pub fn new(transport: impl MailTransport + 'static) -> Self {
        Self::from_notifier(Notifier::new(transport))
    }

    /// Create a plugin around an existing notifier
    pub fn from_notifier(notifier: Notifier) -> Self {
        Self {
            notifier,
            clock: Arc::new(Local::now),
        }
    }

    /// Create a plugin delivering over SMTP
    pub fn smtp() -> Self {
        Self::new(SmtpTransport::new())
    }

    /// Replace the clock used for the `{{ now }}` field
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Local> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Merge the host's notify configuration with defaults and store it back
    pub fn setup(&self, host_config: &mut Map<String, Value>) -> Result<NotifyConfig> {
        config::setup(host_config)
    }

    /// Send a notification for `event` if the policy allows it
    ///
    /// Returns the message that was sent, or `None` when filtered out.
    pub async fn dispatch(
        &self,
        config: &NotifyConfig,
        event: LifecycleEvent,
        observed: Observed<'_>,
    ) -> Result<Option<OutgoingMail>> {
        if !config.should_notify(event.kind, event.status) {
            tracing::trace!(event = %event, "Notification skipped by policy");
            return Ok(None);
        }

        let now = (self.clock)();
        self.notifier
            .notify(config, event, observed, now)
            .await
            .map(Some)
    }

    async fn fire(
        &self,
        config: &NotifyConfig,
        kind: EntityKind,
        status: Status,
        observed: Observed<'_>,
    ) -> Result<()> {
        self.dispatch(config, LifecycleEvent::new(kind, status), observed)
            .await
            .map(|_| ())
    }

    /// Pipeline starts
    pub async fn pipeline_pre_run(&self, config: &NotifyConfig, ppl: &PipelineInfo) -> Result<()> {
        self.fire(config, EntityKind::Pipeline, Status::Begin, Observed::Pipeline(ppl))
            .await
    }

    /// Pipeline ends
    pub async fn pipeline_post_run(&self, config: &NotifyConfig, ppl: &PipelineInfo) -> Result<()> {
        self.fire(config, EntityKind::Pipeline, Status::End, Observed::Pipeline(ppl))
            .await
    }

    /// Process starts
    pub async fn proc_pre_run(&self, config: &NotifyConfig, proc: &ProcessInfo) -> Result<()> {
        self.fire(config, EntityKind::Process, Status::Begin, Observed::Process(proc))
            .await
    }

    /// Process finished
    pub async fn proc_post_run(&self, config: &NotifyConfig, proc: &ProcessInfo) -> Result<()> {
        self.fire(config, EntityKind::Process, Status::End, Observed::Process(proc))
            .await
    }

    /// Process failed
    pub async fn proc_fail(&self, config: &NotifyConfig, proc: &ProcessInfo) -> Result<()> {
        self.fire(config, EntityKind::Process, Status::Abort, Observed::Process(proc))
            .await
    }

    /// Job starts
    pub async fn job_pre_run(&self, config: &NotifyConfig, job: &JobInfo) -> Result<()> {
        self.fire(config, EntityKind::Job, Status::Begin, Observed::Job(job))
            .await
    }

    /// Job finished
    pub async fn job_post_run(&self, config: &NotifyConfig, job: &JobInfo) -> Result<()> {
        self.fire(config, EntityKind::Job, Status::End, Observed::Job(job))
            .await
    }

    /// Job failed
    pub async fn job_fail(&self, config: &NotifyConfig, job: &JobInfo) -> Result<()> {
        self.fire(config, EntityKind::Job, Status::Abort, Observed::Job(job))
            .await
    }
}
