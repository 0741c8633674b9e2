use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::warn;

const ACTIVITY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Snapshot of remote connectivity read by the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusRecord {
    pub desktop_connected: bool,
    pub current_directory: String,
    #[serde(serialize_with = "serialize_activity")]
    pub last_activity: Option<NaiveDateTime>,
    pub llm_connected: bool,
    pub busy: bool,
}

impl StatusRecord {
    pub fn apply_desktop(&mut self, status: &DesktopStatus) {
        self.desktop_connected = status.connected;
        self.current_directory = status.current_directory.clone();
        self.last_activity = status.last_activity;
    }

    pub fn apply_llm(&mut self, reachable: bool) {
        self.llm_connected = reachable;
    }

    pub fn summary_line(&self) -> String {
        let desktop = if self.desktop_connected {
            "Connected"
        } else {
            "Disconnected"
        };
        let llm = if self.llm_connected { "Ready" } else { "Offline" };
        let directory = if self.current_directory.is_empty() {
            "Not specified"
        } else {
            self.current_directory.as_str()
        };
        let mut line = format!("QGIS {desktop} | LLM {llm} | Directory: {directory}");
        if let Some(activity) = self.last_activity {
            line.push_str(&format!(" | Last action: {}", activity.format(ACTIVITY_FORMAT)));
        }
        if self.busy {
            line.push_str(" | Processing...");
        }
        line
    }
}

/// Payload of the desktop bridge status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DesktopStatus {
    #[serde(
        rename = "qgis_connected",
        alias = "connected",
        default,
        deserialize_with = "deserialize_connected"
    )]
    pub connected: bool,
    #[serde(default, deserialize_with = "deserialize_directory")]
    pub current_directory: String,
    #[serde(default, deserialize_with = "deserialize_activity")]
    pub last_activity: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Each successful source writes the fields it owns.
    #[default]
    PerSource,
    /// Nothing is written unless both sources succeed in the same cycle.
    JointOnly,
}

/// The two independent result slots of one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollObservation {
    pub desktop: Option<DesktopStatus>,
    pub llm: Option<bool>,
}

impl PollObservation {
    pub fn is_complete(&self) -> bool {
        self.desktop.is_some() && self.llm.is_some()
    }

    /// Slots that may be written under `policy`.
    pub fn admitted(self, policy: MergePolicy) -> PollObservation {
        match policy {
            MergePolicy::PerSource => self,
            MergePolicy::JointOnly if self.is_complete() => self,
            MergePolicy::JointOnly => PollObservation::default(),
        }
    }
}

/// Outcome of the most recent command submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CommandResult {
    Success(Value),
    Failure(CommandFailure),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandFailure {
    pub message: String,
}

impl CommandResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(CommandFailure {
            message: message.into(),
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn render(&self) -> String {
        match self {
            Self::Success(payload) => {
                serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string())
            }
            Self::Failure(failure) => format!("Error: {}", failure.message),
        }
    }
}

pub fn parse_activity(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(trimmed, ACTIVITY_FORMAT)
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|dt| dt.with_timezone(&Local).naive_local())
        })
        .or_else(|| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f").ok())
}

fn deserialize_activity<'de, D>(deserializer: D) -> std::result::Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| {
        let parsed = parse_activity(&value);
        if parsed.is_none() && !value.trim().is_empty() {
            warn!(value = %value, "unrecognized last_activity timestamp");
        }
        parsed
    }))
}

fn deserialize_connected<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

fn deserialize_directory<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn serialize_activity<S>(
    value: &Option<NaiveDateTime>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(ts) => serializer.serialize_str(&ts.format(ACTIVITY_FORMAT).to_string()),
        None => serializer.serialize_none(),
    }
}
