//! # pipeline-notify
//!
//! Templated email notifications for pipeline lifecycle events.
//!
//! ## Overview
//!
//! The host pipeline runner reports lifecycle events (pipeline, process and
//! job × begin, end, abort). For each event whose status code is listed in
//! the configured `when` policy, `pipeline-notify` renders a static template
//! and mails it to the configured recipients.
//!
//! ## Quick Start
//!
//! ```rust
//! use pipeline_notify::{MemoryTransport, NotifyPlugin, PipelineInfo};
//!
//! # async fn example() -> pipeline_notify::Result<()> {
//! let transport = MemoryTransport::new();
//! let plugin = NotifyPlugin::new(transport.clone());
//!
//! // Merge the host's `_notify` entry with defaults
//! let mut host_config = serde_json::json!({
//!     "_notify": {"to": ["ops@example.com"], "when": {"pipeline": "be"}}
//! });
//! let config = plugin.setup(host_config.as_object_mut().unwrap())?;
//!
//! let ppl = PipelineInfo {
//!     starts: vec!["pFetch".into()],
//!     procs: vec!["pFetch".into(), "pAlign".into()],
//! };
//! plugin.pipeline_pre_run(&config, &ppl).await?;
//!
//! assert_eq!(transport.sent().await[0].subject, "Pipeline started");
//! # Ok(())
//! # }
//! ```
//!
//! ## Transports
//!
//! - **smtp** — lettre-backed SMTP with a single lazily opened session
//! - **memory** — records messages in memory for testing and dry runs
//!
//! ## Architecture
//!
//! - **config** — defaults merger and the `_notify` setup entry point
//! - **template** — static templates keyed by (kind, status), subject extraction
//! - **MailTransport** trait — the mail session seam
//! - **Notifier** — renders a template and sends it
//! - **NotifyPlugin** — policy filter and the lifecycle hooks

pub mod config;
pub mod error;
pub mod notifier;
pub mod plugin;
pub mod template;
pub mod transport;
pub mod types;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export core types
pub use config::{merge, setup, NotifyConfig, PolicyScope, Recipients, WhenPolicy, NOTIFY_KEY};
pub use error::{NotifyError, Result};
pub use notifier::Notifier;
pub use plugin::NotifyPlugin;
pub use template::{lookup, lookup_by_name, RenderedMessage, Template};
pub use transport::MailTransport;
pub use types::{
    EntityKind, JobInfo, LifecycleEvent, Observed, OutgoingMail, PipelineInfo, ProcessInfo,
    Status,
};

// Re-export transports for convenience
pub use transport::memory::MemoryTransport;
pub use transport::smtp::SmtpTransport;
