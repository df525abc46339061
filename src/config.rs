//! Notification configuration and the defaults merger
//!
//! The host hands over a partial configuration map. `merge` fills every
//! missing key from the defaults (recursively for `when`) without touching
//! explicit values, and `setup` writes the merged map back into the host's
//! config store under [`NOTIFY_KEY`].

use crate::error::{NotifyError, Result};
use crate::types::{EntityKind, Status};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Key the merged configuration is stored under in the host config
pub const NOTIFY_KEY: &str = "_notify";

/// Status codes a `when` policy may contain
const POLICY_CODES: [char; 3] = ['b', 'e', 'a'];

/// Effective notification configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Sender address
    pub from: String,

    /// Recipient address(es)
    pub to: Recipients,

    /// Which statuses trigger a notification, per category
    pub when: WhenPolicy,

    /// SMTP server host
    pub server: String,

    /// Connect with implicit TLS
    pub ssl: bool,

    /// SMTP server port
    #[serde(deserialize_with = "deserialize_port")]
    pub port: u16,

    /// SMTP username; authentication is skipped when empty
    pub username: String,

    pub password: String,

    /// Which `when` key filters process and job events
    pub policy_scope: PolicyScope,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            from: "pipeline-notify@no-reply.info".to_string(),
            to: Recipients::default(),
            when: WhenPolicy::default(),
            server: "localhost".to_string(),
            ssl: false,
            port: 25,
            username: String::new(),
            password: String::new(),
            policy_scope: PolicyScope::default(),
        }
    }
}

impl NotifyConfig {
    /// Build a configuration from a partial map, filling defaults
    pub fn from_partial(user: Map<String, Value>) -> Result<Self> {
        Self::from_merged(merge(user))
    }

    /// Convert an already merged map into the typed record
    pub fn from_merged(merged: Map<String, Value>) -> Result<Self> {
        serde_json::from_value(Value::Object(merged))
            .map_err(|e| NotifyError::Config(format!("Invalid notify configuration: {}", e)))
    }

    /// Whether an event of this kind and status should be sent
    pub fn should_notify(&self, kind: EntityKind, status: Status) -> bool {
        let key = match self.policy_scope {
            PolicyScope::Category => kind,
            PolicyScope::Pipeline => EntityKind::Pipeline,
        };
        self.when.allows(key, status)
    }
}

/// Recipient list; a single address is accepted and normalized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recipients {
    One(String),
    Many(Vec<String>),
}

impl Default for Recipients {
    fn default() -> Self {
        Recipients::Many(Vec::new())
    }
}

impl Recipients {
    /// Flatten into a list of addresses
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Recipients::One(addr) => vec![addr.clone()],
            Recipients::Many(addrs) => addrs.clone(),
        }
    }
}

/// Per-category policy strings built from `b`, `e` and `a`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhenPolicy {
    pub pipeline: String,
    pub proc: String,
    pub job: String,
}

impl Default for WhenPolicy {
    fn default() -> Self {
        Self {
            pipeline: "abe".to_string(),
            proc: "abe".to_string(),
            job: String::new(),
        }
    }
}

impl WhenPolicy {
    /// Policy string for a category
    pub fn for_kind(&self, kind: EntityKind) -> &str {
        match kind {
            EntityKind::Pipeline => &self.pipeline,
            EntityKind::Process => &self.proc,
            EntityKind::Job => &self.job,
        }
    }

    pub fn allows(&self, kind: EntityKind, status: Status) -> bool {
        self.for_kind(kind).contains(status.code())
    }

    /// Characters that no status maps to, per category
    pub fn unknown_codes(&self) -> Vec<(EntityKind, char)> {
        EntityKind::ALL
            .into_iter()
            .flat_map(|kind| {
                self.for_kind(kind)
                    .chars()
                    .filter(|c| !POLICY_CODES.contains(c))
                    .map(move |c| (kind, c))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

/// Selects the policy key used for process and job events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyScope {
    /// Each category is filtered by its own key
    #[default]
    Category,
    /// Every category is filtered by `when.pipeline`
    Pipeline,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortRepr {
    Number(u16),
    Text(String),
}

fn deserialize_port<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    match PortRepr::deserialize(deserializer)? {
        PortRepr::Number(port) => Ok(port),
        PortRepr::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("invalid port: {:?}", text))),
    }
}

/// The default configuration as a JSON map
pub fn defaults() -> Map<String, Value> {
    match serde_json::to_value(NotifyConfig::default()) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// Fill keys missing from `user` with defaults
///
/// A key holding `null` counts as missing. Nested maps (`when`) are
/// filled per sub-key; explicit values are never overwritten.
pub fn merge(user: Map<String, Value>) -> Map<String, Value> {
    let mut merged = user;

    for (key, default) in defaults() {
        if merged.get(&key).map_or(true, Value::is_null) {
            merged.insert(key, default);
            continue;
        }

        if let (Some(Value::Object(nested)), Value::Object(nested_defaults)) =
            (merged.get_mut(&key), default)
        {
            for (sub_key, sub_default) in nested_defaults {
                if nested.get(&sub_key).map_or(true, Value::is_null) {
                    nested.insert(sub_key, sub_default);
                }
            }
        }
    }

    merged
}

/// Merge the host's `_notify` entry with defaults and store it back
///
/// Returns the typed configuration. Fails only when the stored entry is
/// not a map or a merged value has the wrong type.
pub fn setup(host_config: &mut Map<String, Value>) -> Result<NotifyConfig> {
    let user = match host_config.get(NOTIFY_KEY) {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(other) => {
            return Err(NotifyError::Config(format!(
                "'{}' must be a map, got {}",
                NOTIFY_KEY, other
            )))
        }
    };

    let merged = merge(user);
    host_config.insert(NOTIFY_KEY.to_string(), Value::Object(merged.clone()));

    let config = NotifyConfig::from_merged(merged)?;
    for (kind, code) in config.when.unknown_codes() {
        tracing::warn!(
            category = kind.policy_key(),
            code = %code,
            "Ignoring unknown notify policy code"
        );
    }

    tracing::debug!(
        server = %config.server,
        port = config.port,
        ssl = config.ssl,
        recipients = config.to.to_vec().len(),
        "Notify configuration merged"
    );

    Ok(config)
}
