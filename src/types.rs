//! Core types: lifecycle events, observed-object fields, outgoing mail

use crate::error::{NotifyError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Level of the host's execution hierarchy an event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Pipeline,
    Process,
    Job,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Pipeline, EntityKind::Process, EntityKind::Job];

    /// Short name used to key templates (`ppl`, `proc`, `job`)
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Pipeline => "ppl",
            EntityKind::Process => "proc",
            EntityKind::Job => "job",
        }
    }

    /// Key of the `when` policy that governs this kind
    pub fn policy_key(&self) -> &'static str {
        match self {
            EntityKind::Pipeline => "pipeline",
            EntityKind::Process => "proc",
            EntityKind::Job => "job",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Pipeline => "pipeline",
            EntityKind::Process => "process",
            EntityKind::Job => "job",
        };
        f.write_str(name)
    }
}

impl FromStr for EntityKind {
    type Err = NotifyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ppl" | "pipeline" => Ok(EntityKind::Pipeline),
            "proc" | "process" => Ok(EntityKind::Process),
            "job" => Ok(EntityKind::Job),
            other => Err(NotifyError::Config(format!("Unknown entity kind: {}", other))),
        }
    }
}

/// Lifecycle phase of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Begin,
    End,
    Abort,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Begin, Status::End, Status::Abort];

    /// Single-character code matched against a `when` policy string
    pub fn code(&self) -> char {
        match self {
            Status::Begin => 'b',
            Status::End => 'e',
            Status::Abort => 'a',
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Begin => "begin",
            Status::End => "end",
            Status::Abort => "abort",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = NotifyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "begin" => Ok(Status::Begin),
            "end" => Ok(Status::End),
            "abort" => Ok(Status::Abort),
            other => Err(NotifyError::Config(format!("Unknown status: {}", other))),
        }
    }
}

/// A single lifecycle occurrence reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LifecycleEvent {
    pub kind: EntityKind,
    pub status: Status,
}

impl LifecycleEvent {
    pub fn new(kind: EntityKind, status: Status) -> Self {
        Self { kind, status }
    }

    /// Every (kind, status) combination
    pub fn all() -> impl Iterator<Item = LifecycleEvent> {
        EntityKind::ALL
            .into_iter()
            .flat_map(|kind| Status::ALL.into_iter().map(move |status| Self::new(kind, status)))
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.status)
    }
}

/// Pipeline fields available to templates
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineInfo {
    /// Identifiers of the start processes
    pub starts: Vec<String>,

    /// Identifiers of all processes in the pipeline
    #[serde(default)]
    pub procs: Vec<String>,
}

/// Process fields available to templates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInfo {
    pub id: String,

    /// Number of jobs
    pub size: usize,

    /// Pipeline directory
    pub ppldir: PathBuf,

    /// Process working directory
    pub workdir: PathBuf,
}

/// Job fields available to templates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    /// Id of the process this job belongs to
    pub proc_id: String,

    /// Job index within the process
    pub index: usize,

    /// Job directory
    pub dir: PathBuf,
}

/// The host object an event was raised for
#[derive(Debug, Clone, Copy)]
pub enum Observed<'a> {
    Pipeline(&'a PipelineInfo),
    Process(&'a ProcessInfo),
    Job(&'a JobInfo),
}

impl Observed<'_> {
    pub fn kind(&self) -> EntityKind {
        match self {
            Observed::Pipeline(_) => EntityKind::Pipeline,
            Observed::Process(_) => EntityKind::Process,
            Observed::Job(_) => EntityKind::Job,
        }
    }

    /// Named template fields exposed by this object
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            Observed::Pipeline(ppl) => vec![
                ("starts", format!("[{}]", ppl.starts.join(", "))),
                ("procs", ppl.procs.join("\n")),
            ],
            Observed::Process(proc) => vec![
                ("id", proc.id.clone()),
                ("size", proc.size.to_string()),
                ("ppldir", proc.ppldir.display().to_string()),
                ("workdir", proc.workdir.display().to_string()),
            ],
            Observed::Job(job) => vec![
                ("proc_id", job.proc_id.clone()),
                ("index", job.index.to_string()),
                ("dir", job.dir.display().to_string()),
            ],
        }
    }
}

/// A composed plain-text message ready for a transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMail {
    /// Unique message identifier (mail-<uuid>)
    pub id: String,

    pub from: String,

    pub to: Vec<String>,

    pub subject: String,

    pub body: String,
}

impl OutgoingMail {
    /// Create a new message with an auto-generated id
    pub fn new(
        from: impl Into<String>,
        to: Vec<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: format!("mail-{}", uuid::Uuid::new_v4()),
            from: from.into(),
            to,
            subject: subject.into(),
            body: body.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Status::Begin.code(), 'b');
        assert_eq!(Status::End.code(), 'e');
        assert_eq!(Status::Abort.code(), 'a');
    }

    #[test]
    fn test_kind_policy_keys() {
        assert_eq!(EntityKind::Pipeline.policy_key(), "pipeline");
        assert_eq!(EntityKind::Process.policy_key(), "proc");
        assert_eq!(EntityKind::Job.policy_key(), "job");
    }

    #[test]
    fn test_parse_kind_and_status() {
        assert_eq!("ppl".parse::<EntityKind>().unwrap(), EntityKind::Pipeline);
        assert_eq!("process".parse::<EntityKind>().unwrap(), EntityKind::Process);
        assert_eq!("abort".parse::<Status>().unwrap(), Status::Abort);

        let err = "task".parse::<EntityKind>().unwrap_err();
        assert!(matches!(err, NotifyError::Config(_)));
        assert!("fail".parse::<Status>().is_err());
    }

    #[test]
    fn test_all_events() {
        let events: Vec<_> = LifecycleEvent::all().collect();
        assert_eq!(events.len(), 9);
        assert_eq!(events[0], LifecycleEvent::new(EntityKind::Pipeline, Status::Begin));
        assert_eq!(events[8].to_string(), "job abort");
    }

    #[test]
    fn test_pipeline_fields() {
        let ppl = PipelineInfo {
            starts: vec!["pA".into(), "pB".into()],
            procs: vec!["pA".into(), "pB".into(), "pC".into()],
        };
        let fields = Observed::Pipeline(&ppl).fields();
        assert_eq!(fields[0], ("starts", "[pA, pB]".to_string()));
        assert_eq!(fields[1], ("procs", "pA\npB\npC".to_string()));
    }

    #[test]
    fn test_outgoing_mail_id() {
        let mail = OutgoingMail::new("a@x.com", vec!["b@x.com".into()], "Hi", "Body");
        assert!(mail.id.starts_with("mail-"));
        assert_eq!(mail.to, vec!["b@x.com"]);
    }
}
