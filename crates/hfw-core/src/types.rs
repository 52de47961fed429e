//! Core types shared by the stats store, the publisher and the logger session

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Whether a script is an onboarding step or a funnel-tracked unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptCategory {
    /// Onboarding/configuration step
    Setup,
    /// Demonstrable task whose completion is tracked in the funnel
    Task,
}

impl ScriptCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Task => "task",
        }
    }
}

impl fmt::Display for ScriptCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScriptCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "setup" => Ok(Self::Setup),
            "task" => Ok(Self::Task),
            other => Err(Error::InvalidCategory(other.to_string())),
        }
    }
}

/// Validated script identifier, used as the key of its persisted stats
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScriptId(String);

impl ScriptId {
    /// Minimum accepted identifier length
    pub const MIN_LEN: usize = 2;

    /// Validate and wrap an identifier
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let valid = id.len() >= Self::MIN_LEN
            && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(Error::InvalidScriptId(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ScriptId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Cross-run statistics for one script identifier.
///
/// `first_*` timestamps are `None` until the event first happens (they stand
/// for +infinity and only ever decrease), `last_*` timestamps start at `0` and
/// only ever increase. Counters never decrease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptStats {
    pub script_category: ScriptCategory,

    #[serde(default)]
    pub first_start: Option<u64>,
    #[serde(default)]
    pub last_start: u64,
    #[serde(default)]
    pub count_start: u64,

    #[serde(default)]
    pub first_complete: Option<u64>,
    #[serde(default)]
    pub last_complete: u64,
    #[serde(default)]
    pub count_complete: u64,

    #[serde(default)]
    pub first_error: Option<u64>,
    #[serde(default)]
    pub last_error: u64,
    #[serde(default)]
    pub count_error: u64,
    #[serde(default)]
    pub count_error_before_first_complete: u64,
    #[serde(default)]
    pub count_error_after_first_complete: u64,
}

impl ScriptStats {
    /// Fresh stats with nothing recorded yet
    pub fn new(script_category: ScriptCategory) -> Self {
        Self {
            script_category,
            first_start: None,
            last_start: 0,
            count_start: 0,
            first_complete: None,
            last_complete: 0,
            count_complete: 0,
            first_error: None,
            last_error: 0,
            count_error: 0,
            count_error_before_first_complete: 0,
            count_error_after_first_complete: 0,
        }
    }

    /// Record a start event at `now` (epoch ms)
    pub fn record_start(&mut self, now: u64) {
        self.first_start = Some(min_time(self.first_start, now));
        self.last_start = self.last_start.max(now);
        self.count_start += 1;
    }

    /// Record a completion at `now` (epoch ms)
    pub fn record_complete(&mut self, now: u64) {
        self.first_complete = Some(min_time(self.first_complete, now));
        self.last_complete = self.last_complete.max(now);
        self.count_complete += 1;
    }

    /// Record an error at `now` (epoch ms), attributing it to before or after
    /// the first completion
    pub fn record_error(&mut self, now: u64) {
        self.first_error = Some(min_time(self.first_error, now));
        self.last_error = self.last_error.max(now);
        self.count_error += 1;
        if self.has_completed() {
            self.count_error_after_first_complete += 1;
        } else {
            self.count_error_before_first_complete += 1;
        }
    }

    pub fn has_completed(&self) -> bool {
        self.count_complete > 0
    }
}

fn min_time(current: Option<u64>, now: u64) -> u64 {
    current.map_or(now, |t| t.min(now))
}

/// Lifecycle category of a metrics event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Start,
    Complete,
    Error,
    Summary,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Error => "error",
            Self::Summary => "summary",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single telemetry event, serialized compactly as one topic message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsEvent {
    /// Anonymous installation identifier
    pub id: String,

    /// Version stamp of the tooling that produced the event
    pub v: String,

    /// Lifecycle category
    pub cat: EventCategory,

    /// Script identifier
    pub action: String,

    /// Free text or structured payload
    pub detail: serde_json::Value,

    /// Epoch milliseconds
    pub time: u64,
}

impl MetricsEvent {
    /// Create a new event stamped with the current time
    pub fn new(
        id: impl Into<String>,
        version: impl Into<String>,
        cat: EventCategory,
        action: impl Into<String>,
        detail: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            id: id.into(),
            v: version.into(),
            cat,
            action: action.into(),
            detail: detail.into(),
            time: now_millis(),
        }
    }

    /// Override the event time
    pub fn at(mut self, time: u64) -> Self {
        self.time = time;
        self
    }

    /// Check that all required fields are present and well formed
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::validation("event id is empty"));
        }
        if self.v.is_empty() {
            return Err(Error::validation("event version is empty"));
        }
        if self.action.is_empty() {
            return Err(Error::validation("event action is empty"));
        }
        match &self.detail {
            serde_json::Value::String(_) | serde_json::Value::Object(_) => {}
            other => {
                return Err(Error::validation(format!(
                    "event detail must be a string or an object, got {}",
                    other
                )))
            }
        }
        if self.time == 0 {
            return Err(Error::validation("event time must be a positive integer"));
        }
        Ok(())
    }

    /// Compact JSON representation submitted to the topic
    pub fn to_message(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
