//! Publisher configuration
//!
//! The `config` block of the stats store is read as a [`ConfigLayer`] (every
//! field optional, unknown keys kept) and resolved into a fully typed
//! [`PublisherConfig`] with the precedence file value > environment value >
//! built-in default.

use hfw_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default memo of the telemetry topic
pub const DEFAULT_TOPIC_MEMO: &str = "HFW-METRICS";

/// Default topic gateway endpoint
pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:5600";

pub const ENV_METRICS_ID: &str = "HFW_METRICS_ID";
pub const ENV_ACCOUNT_ID: &str = "HFW_METRICS_ACCOUNT_ID";
pub const ENV_ACCOUNT_KEY: &str = "HFW_METRICS_ACCOUNT_KEY";
pub const ENV_TOPIC_ID: &str = "HFW_METRICS_TOPIC_ID";
pub const ENV_TOPIC_MEMO: &str = "HFW_METRICS_TOPIC_MEMO";
pub const ENV_METRICS_DISABLED: &str = "HFW_METRICS_DISABLED";
pub const ENV_ANSI_DISABLED: &str = "HFW_ANSI_DISABLED";
pub const ENV_GATEWAY_URL: &str = "HFW_METRICS_GATEWAY_URL";

/// The `config` object exactly as persisted in the stats store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigLayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_account_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_account_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_hcs_topic_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_hcs_topic_memo: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_hcs_disabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ansi_disabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_gateway_url: Option<String>,

    /// Keys this version does not know about, written back untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Fully resolved publisher configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherConfig {
    /// Anonymous installation identifier
    pub metrics_id: String,
    pub metrics_account_id: Option<String>,
    pub metrics_account_key: Option<String>,
    pub metrics_hcs_topic_id: Option<String>,
    pub metrics_hcs_topic_memo: String,
    /// Telemetry opt-out
    pub metrics_hcs_disabled: bool,
    /// Plain-text console output
    pub ansi_disabled: bool,
    pub metrics_gateway_url: String,
}

/// Credentials of the account that pays for and signs topic messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountCredentials {
    pub account_id: String,
    pub account_key: String,
    pub gateway_url: String,
}

/// Everything needed to publish to the telemetry topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsCredentials {
    pub account: AccountCredentials,
    pub topic_id: String,
    pub topic_memo: String,
}

impl PublisherConfig {
    /// Account credentials, or the name of the first missing field
    pub fn account_credentials(&self) -> Result<AccountCredentials> {
        Ok(AccountCredentials {
            account_id: require(&self.metrics_account_id, "metricsAccountId")?,
            account_key: require(&self.metrics_account_key, "metricsAccountKey")?,
            gateway_url: self.metrics_gateway_url.clone(),
        })
    }

    /// Full publishing credentials, or the name of the first missing field
    pub fn credentials(&self) -> Result<MetricsCredentials> {
        Ok(MetricsCredentials {
            account: self.account_credentials()?,
            topic_id: require(&self.metrics_hcs_topic_id, "metricsHcsTopicId")?,
            topic_memo: self.metrics_hcs_topic_memo.clone(),
        })
    }
}

fn require(value: &Option<String>, field: &'static str) -> Result<String> {
    value.clone().ok_or_else(|| Error::missing_config(field))
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resolves a [`ConfigLayer`] against the environment and built-in defaults
pub struct ConfigResolver {
    env: EnvLookup,
}

impl ConfigResolver {
    /// Resolver reading the process environment
    pub fn from_env() -> Self {
        Self::with_env(|key| std::env::var(key).ok())
    }

    /// Resolver with a custom environment lookup
    pub fn with_env<F>(env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self { env: Box::new(env) }
    }

    /// Resolve the file layer into a typed config.
    ///
    /// If no metrics id exists in either the file or the environment, a new
    /// one is generated and stored in `file` so that the next write persists it.
    pub fn resolve(&self, file: &mut ConfigLayer) -> Result<PublisherConfig> {
        let metrics_id = match self.string(&file.metrics_id, ENV_METRICS_ID) {
            Some(id) => id,
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                debug!(metrics_id = %id, "Generated new metrics id");
                file.metrics_id = Some(id.clone());
                id
            }
        };

        Ok(PublisherConfig {
            metrics_id,
            metrics_account_id: self.string(&file.metrics_account_id, ENV_ACCOUNT_ID),
            metrics_account_key: self.string(&file.metrics_account_key, ENV_ACCOUNT_KEY),
            metrics_hcs_topic_id: self.string(&file.metrics_hcs_topic_id, ENV_TOPIC_ID),
            metrics_hcs_topic_memo: self
                .string(&file.metrics_hcs_topic_memo, ENV_TOPIC_MEMO)
                .unwrap_or_else(|| DEFAULT_TOPIC_MEMO.to_string()),
            metrics_hcs_disabled: self
                .flag(file.metrics_hcs_disabled, ENV_METRICS_DISABLED)
                .unwrap_or(false),
            ansi_disabled: self
                .flag(file.ansi_disabled, ENV_ANSI_DISABLED)
                .unwrap_or(false),
            metrics_gateway_url: self
                .string(&file.metrics_gateway_url, ENV_GATEWAY_URL)
                .unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string()),
        })
    }

    fn string(&self, file: &Option<String>, key: &str) -> Option<String> {
        non_empty(file.clone()).or_else(|| non_empty((self.env)(key)))
    }

    /// An unparsable environment flag falls back to the default
    fn flag(&self, file: Option<bool>, key: &str) -> Option<bool> {
        if file.is_some() {
            return file;
        }
        let raw = non_empty((self.env)(key))?;
        let parsed = parse_flag(&raw);
        if parsed.is_none() {
            warn!("Ignoring {}={:?}, expected a boolean", key, raw);
        }
        parsed
    }
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::from_env()
    }
}

// The sample config ships with empty strings for unset values.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
