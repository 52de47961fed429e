//! Durable stats store
//!
//! A single JSON file holding a `config` object plus one [`ScriptStats`] entry
//! per script identifier. Reads fail soft; writes re-read the file and
//! overwrite only the active script's key and `config`, so every other key is
//! preserved.

use crate::config::ConfigLayer;
use hfw_core::{Result, ScriptId, ScriptStats};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Store file name, relative to the working directory
pub const DEFAULT_STORE_FILE: &str = "logger.json";

/// Environment variable overriding the store location
pub const ENV_STORE_FILE: &str = "HFW_LOGGER_FILE";

/// Key of the shared config object
pub const CONFIG_KEY: &str = "config";

/// Parsed store file contents
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreContents {
    entries: Map<String, Value>,
}

impl StoreContents {
    pub fn from_map(entries: Map<String, Value>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The persisted config object, or an empty layer if absent or malformed
    pub fn config_layer(&self) -> ConfigLayer {
        match self.entries.get(CONFIG_KEY) {
            Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|e| {
                warn!("Ignoring malformed logger config: {}", e);
                ConfigLayer::default()
            }),
            None => ConfigLayer::default(),
        }
    }

    /// Stats for one script, if present and well formed
    pub fn script_stats(&self, script_id: &str) -> Option<ScriptStats> {
        if script_id == CONFIG_KEY {
            return None;
        }
        let value = self.entries.get(script_id)?;
        match serde_json::from_value(value.clone()) {
            Ok(stats) => Some(stats),
            Err(e) => {
                debug!(script_id, "Ignoring malformed stats entry: {}", e);
                None
            }
        }
    }

    /// Every well-formed stats entry, keyed by script identifier
    pub fn all_script_stats(&self) -> BTreeMap<String, ScriptStats> {
        self.entries
            .keys()
            .filter_map(|key| self.script_stats(key).map(|stats| (key.clone(), stats)))
            .collect()
    }

    /// Raw entry access, including keys this version does not understand
    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }
}

/// File-backed store of script stats and the shared publisher config
#[derive(Debug, Clone)]
pub struct StatsStore {
    path: PathBuf,
}

impl StatsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `HFW_LOGGER_FILE`, falling back to `./logger.json`
    pub fn from_env() -> Self {
        let path = std::env::var(ENV_STORE_FILE)
            .ok()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_STORE_FILE.to_string());
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the store; a missing or unparsable file yields empty contents
    pub async fn read(&self) -> StoreContents {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) => {
                debug!("Stats store {:?} not readable: {}", self.path, e);
                return StoreContents::default();
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(entries)) => StoreContents::from_map(entries),
            Ok(_) => {
                warn!("Stats store {:?} is not a JSON object, ignoring it", self.path);
                StoreContents::default()
            }
            Err(e) => {
                warn!("Stats store {:?} is corrupt, ignoring it: {}", self.path, e);
                StoreContents::default()
            }
        }
    }

    /// Merge one script's stats and the config into the file
    pub async fn write(
        &self,
        script_id: &ScriptId,
        stats: &ScriptStats,
        config: &ConfigLayer,
    ) -> Result<()> {
        let mut contents = self.read().await;
        contents
            .entries
            .insert(script_id.as_str().to_string(), serde_json::to_value(stats)?);
        contents
            .entries
            .insert(CONFIG_KEY.to_string(), serde_json::to_value(config)?);
        self.persist(&contents).await
    }

    /// Merge only the config into the file
    pub async fn write_config(&self, config: &ConfigLayer) -> Result<()> {
        let mut contents = self.read().await;
        contents
            .entries
            .insert(CONFIG_KEY.to_string(), serde_json::to_value(config)?);
        self.persist(&contents).await
    }

    async fn persist(&self, contents: &StoreContents) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_string_pretty(&contents.entries)?;
        tokio::fs::write(&self.path, json).await?;
        debug!("Wrote stats store {:?}", self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hfw_core::ScriptCategory;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> StatsStore {
        StatsStore::new(dir.path().join("logger.json"))
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);

        let contents = store.read().await;
        assert!(contents.is_empty());
        assert_eq!(contents.config_layer(), ConfigLayer::default());
    }

    #[tokio::test]
    async fn test_corrupt_file_reads_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        std::fs::write(store.path(), "{ not json").unwrap();

        assert!(store.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_stats_round_trip_is_lossless() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        let id = ScriptId::new("hcsTopic").unwrap();

        let mut stats = ScriptStats::new(ScriptCategory::Task);
        stats.record_start(1_717_171_717_171);
        stats.record_error(1_717_171_718_000);
        stats.record_complete(1_717_171_719_999);

        store.write(&id, &stats, &ConfigLayer::default()).await.unwrap();

        let read_back = store.read().await.script_stats("hcsTopic").unwrap();
        assert_eq!(read_back, stats);
    }

    #[tokio::test]
    async fn test_write_preserves_other_keys() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        std::fs::write(
            store.path(),
            r#"{
                "otherScript": { "scriptCategory": "setup", "countStart": 7 },
                "futureKey": { "anything": [1, 2, 3] }
            }"#,
        )
        .unwrap();

        let id = ScriptId::new("hcsTopic").unwrap();
        let stats = ScriptStats::new(ScriptCategory::Task);
        store.write(&id, &stats, &ConfigLayer::default()).await.unwrap();

        let contents = store.read().await;
        assert_eq!(contents.script_stats("otherScript").unwrap().count_start, 7);
        assert_eq!(
            contents.raw("futureKey").unwrap(),
            &serde_json::json!({ "anything": [1, 2, 3] })
        );
        assert!(contents.raw(CONFIG_KEY).is_some());
        assert_eq!(contents.all_script_stats().len(), 2);
    }

    #[tokio::test]
    async fn test_write_config_leaves_stats_alone() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        let id = ScriptId::new("initApp").unwrap();
        let mut stats = ScriptStats::new(ScriptCategory::Setup);
        stats.record_start(10);
        store.write(&id, &stats, &ConfigLayer::default()).await.unwrap();

        let config = ConfigLayer {
            metrics_hcs_disabled: Some(true),
            ..Default::default()
        };
        store.write_config(&config).await.unwrap();

        let contents = store.read().await;
        assert_eq!(contents.script_stats("initApp").unwrap(), stats);
        assert_eq!(contents.config_layer().metrics_hcs_disabled, Some(true));
    }
}
