//! Template store and rendering
//!
//! One static template per (kind, status) pair. The first rendered line is
//! the mail subject, an optional `Subject:` prefix is stripped from it, and
//! everything after the first line break is the body.

use crate::error::{NotifyError, Result};
use crate::types::{EntityKind, LifecycleEvent, Observed, Status};
use chrono::{DateTime, Local};
use minijinja::{Environment, UndefinedBehavior};
use std::collections::BTreeMap;

/// Timestamp format substituted for `{{ now }}`
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SUBJECT_PREFIX: &str = "subject:";

/// A static notification template
#[derive(Debug, PartialEq, Eq)]
pub struct Template {
    /// Template name, e.g. `proc_abort`
    pub name: &'static str,

    /// Template source with `{{ field }}` placeholders
    pub text: &'static str,
}

static PPL_BEGIN: Template = Template {
    name: "ppl_begin",
    text: "Pipeline started

Time: {{ now }}
Start processes: {{ starts }}
",
};

static PPL_END: Template = Template {
    name: "ppl_end",
    text: "Pipeline finished

Time: {{ now }}
Start processes: {{ starts }}
Processes:
{{ procs }}
",
};

static PPL_ABORT: Template = Template {
    name: "ppl_abort",
    text: "Pipeline failed

Time: {{ now }}
Start processes: {{ starts }}
Processes:
{{ procs }}
",
};

static PROC_BEGIN: Template = Template {
    name: "proc_begin",
    text: "Process {{ id }} started

Time: {{ now }}
Size: {{ size }}
Pipeline directory: {{ ppldir }}
Process workdir: {{ workdir }}
",
};

static PROC_END: Template = Template {
    name: "proc_end",
    text: "Process {{ id }} finished

Time: {{ now }}
Size: {{ size }}
Pipeline directory: {{ ppldir }}
Process workdir: {{ workdir }}
",
};

static PROC_ABORT: Template = Template {
    name: "proc_abort",
    text: "Process {{ id }} failed

Time: {{ now }}
Size: {{ size }}
Pipeline directory: {{ ppldir }}
Process workdir: {{ workdir }}
",
};

static JOB_BEGIN: Template = Template {
    name: "job_begin",
    text: "Process {{ proc_id }} #{{ index }} started

Time: {{ now }}
Job directory: {{ dir }}
",
};

static JOB_END: Template = Template {
    name: "job_end",
    text: "Process {{ proc_id }} #{{ index }} finished

Time: {{ now }}
Job directory: {{ dir }}
",
};

static JOB_ABORT: Template = Template {
    name: "job_abort",
    text: "Process {{ proc_id }} #{{ index }} failed

Time: {{ now }}
Job directory: {{ dir }}
",
};

/// Template for an event
pub fn lookup(event: LifecycleEvent) -> &'static Template {
    match (event.kind, event.status) {
        (EntityKind::Pipeline, Status::Begin) => &PPL_BEGIN,
        (EntityKind::Pipeline, Status::End) => &PPL_END,
        (EntityKind::Pipeline, Status::Abort) => &PPL_ABORT,
        (EntityKind::Process, Status::Begin) => &PROC_BEGIN,
        (EntityKind::Process, Status::End) => &PROC_END,
        (EntityKind::Process, Status::Abort) => &PROC_ABORT,
        (EntityKind::Job, Status::Begin) => &JOB_BEGIN,
        (EntityKind::Job, Status::End) => &JOB_END,
        (EntityKind::Job, Status::Abort) => &JOB_ABORT,
    }
}

/// Template for a kind/status given by name (`"proc"`, `"abort"`)
pub fn lookup_by_name(kind: &str, status: &str) -> Result<&'static Template> {
    let event = LifecycleEvent::new(kind.parse()?, status.parse()?);
    Ok(lookup(event))
}

/// Subject and body produced from a rendered template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
}

/// Render a template against an observed object at `now`
pub fn render(
    template: &Template,
    observed: Observed<'_>,
    now: DateTime<Local>,
) -> Result<RenderedMessage> {
    let mut fields = vec![("now", now.format(TIME_FORMAT).to_string())];
    fields.extend(observed.fields());

    let text = substitute(template, &fields)?;
    Ok(split_message(&text))
}

/// Render the template text with minijinja
///
/// Undefined fields are an error rather than empty output.
pub fn substitute(template: &Template, fields: &[(&str, String)]) -> Result<String> {
    let err = |e: minijinja::Error| NotifyError::Template {
        template: template.name.to_string(),
        reason: e.to_string(),
    };

    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_keep_trailing_newline(true);
    env.add_template(template.name, template.text).map_err(err)?;

    let context: BTreeMap<&str, &str> = fields
        .iter()
        .map(|(key, value)| (*key, value.as_str()))
        .collect();

    env.get_template(template.name)
        .and_then(|tmpl| tmpl.render(&context))
        .map_err(err)
}

/// Split rendered text into subject line and body
pub fn split_message(text: &str) -> RenderedMessage {
    let (first, body) = text.split_once('\n').unwrap_or((text, ""));
    RenderedMessage {
        subject: strip_subject_prefix(first).to_string(),
        body: body.to_string(),
    }
}

/// Drop a leading `Subject:` (any case) and the whitespace after it
pub fn strip_subject_prefix(line: &str) -> &str {
    match line.get(..SUBJECT_PREFIX.len()) {
        Some(head) if head.eq_ignore_ascii_case(SUBJECT_PREFIX) => {
            line[SUBJECT_PREFIX.len()..].trim_start()
        }
        _ => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{JobInfo, PipelineInfo, ProcessInfo};
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    fn sample_pipeline() -> PipelineInfo {
        PipelineInfo {
            starts: vec!["pFetch".into()],
            procs: vec!["pFetch".into(), "pAlign".into()],
        }
    }

    fn sample_process() -> ProcessInfo {
        ProcessInfo {
            id: "pAlign".into(),
            size: 12,
            ppldir: "/work/ppl".into(),
            workdir: "/work/ppl/pAlign".into(),
        }
    }

    fn sample_job() -> JobInfo {
        JobInfo {
            proc_id: "pAlign".into(),
            index: 3,
            dir: "/work/ppl/pAlign/3".into(),
        }
    }

    #[test]
    fn test_every_event_renders_subject_and_body() {
        let ppl = sample_pipeline();
        let proc = sample_process();
        let job = sample_job();

        for event in LifecycleEvent::all() {
            let observed = match event.kind {
                EntityKind::Pipeline => Observed::Pipeline(&ppl),
                EntityKind::Process => Observed::Process(&proc),
                EntityKind::Job => Observed::Job(&job),
            };
            let template = lookup(event);
            assert!(!template.text.is_empty());
            assert!(template.name.starts_with(event.kind.as_str()));

            let msg = render(template, observed, fixed_now()).unwrap();
            assert!(!msg.subject.is_empty(), "{}", template.name);
            assert!(!msg.subject.contains('\n'));
            assert!(msg.body.contains("2024-03-09 14:05:07"), "{}", template.name);
        }
    }

    #[test]
    fn test_pipeline_begin_render() {
        let ppl = sample_pipeline();
        let msg = render(
            lookup(LifecycleEvent::new(EntityKind::Pipeline, Status::Begin)),
            Observed::Pipeline(&ppl),
            fixed_now(),
        )
        .unwrap();
        assert_eq!(msg.subject, "Pipeline started");
        assert_eq!(msg.body, "\nTime: 2024-03-09 14:05:07\nStart processes: [pFetch]\n");
    }

    #[test]
    fn test_job_abort_render() {
        let job = sample_job();
        let msg = render(
            lookup(LifecycleEvent::new(EntityKind::Job, Status::Abort)),
            Observed::Job(&job),
            fixed_now(),
        )
        .unwrap();
        assert_eq!(msg.subject, "Process pAlign #3 failed");
        assert!(msg.body.contains("Job directory: /work/ppl/pAlign/3"));
    }

    #[test]
    fn test_lookup_by_name() {
        assert_eq!(lookup_by_name("proc", "end").unwrap().name, "proc_end");
        assert_eq!(lookup_by_name("ppl", "begin").unwrap(), &PPL_BEGIN);

        let err = lookup_by_name("stage", "begin").unwrap_err();
        assert!(matches!(err, NotifyError::Config(_)));
        assert!(lookup_by_name("job", "paused").is_err());
    }

    #[test]
    fn test_missing_field_is_template_error() {
        // process template rendered against a job
        let job = sample_job();
        let err = render(
            lookup(LifecycleEvent::new(EntityKind::Process, Status::Begin)),
            Observed::Job(&job),
            fixed_now(),
        )
        .unwrap_err();
        match err {
            NotifyError::Template { template, reason } => {
                assert_eq!(template, "proc_begin");
                assert!(!reason.is_empty());
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_substitute_strict_fields() {
        let template = Template {
            name: "t",
            text: "{{ x }} and {{ y }}\n",
        };
        let fields = [("x", "1".to_string()), ("y", "2".to_string())];
        assert_eq!(substitute(&template, &fields).unwrap(), "1 and 2\n");

        let err = substitute(&template, &fields[..1]).unwrap_err();
        assert!(matches!(err, NotifyError::Template { .. }));
    }

    #[test]
    fn test_substitute_syntax_error() {
        let bad = Template {
            name: "bad",
            text: "open {{ x",
        };
        let err = substitute(&bad, &[("x", "1".to_string())]).unwrap_err();
        match err {
            NotifyError::Template { template, .. } => assert_eq!(template, "bad"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_field_values_not_interpreted() {
        let template = Template {
            name: "t",
            text: "Job directory: {{ dir }}",
        };
        let out = substitute(&template, &[("dir", "/w/{{ x }}/<a&b>".to_string())]).unwrap();
        assert_eq!(out, "Job directory: /w/{{ x }}/<a&b>");
    }

    #[test]
    fn test_subject_prefix_stripped() {
        assert_eq!(split_message("Subject: Foo\nbody").subject, "Foo");
        assert_eq!(split_message("SUBJECT:Foo\nbody").subject, "Foo");
        assert_eq!(split_message("subject:   Foo\nbody").subject, "Foo");
        assert_eq!(split_message("Foo\nbody").subject, "Foo");
        assert_eq!(split_message("Subjects matter\nbody").subject, "Subjects matter");
    }

    #[test]
    fn test_split_message_body() {
        let msg = split_message("Subject: Foo\nline 1\nline 2\n");
        assert_eq!(msg.body, "line 1\nline 2\n");

        let msg = split_message("only subject");
        assert_eq!(msg.subject, "only subject");
        assert_eq!(msg.body, "");
    }

    #[test]
    fn test_strip_prefix_multibyte() {
        assert_eq!(strip_subject_prefix("Süjet: x"), "Süjet: x");
        assert_eq!(strip_subject_prefix("短"), "短");
    }
}
