//! Subcommand implementations, run against an already created session

use hfw_logger::{LoggerSession, SummaryReport, HELLIP};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;

/// Script identifier of the stats command's own session
pub const STATS_SCRIPT_ID: &str = "metricsStats";

/// Script identifier of the topic setup session
pub const INIT_TOPIC_SCRIPT_ID: &str = "initMetricsTopic";

/// Show the funnel and, if agreed, publish it as a summary event.
///
/// `share` skips the question when the decision was already made.
pub async fn run_stats(
    logger: &mut LoggerSession,
    share: Option<bool>,
) -> anyhow::Result<SummaryReport> {
    logger.log_start("Metrics summary").await?;
    let report = logger.metrics_summary().await;

    let share = match share {
        Some(share) => share,
        None => {
            logger
                .confirm("Share this summary anonymously to help improve the tutorials?")
                .await?
        }
    };

    if share {
        logger.set_metrics_disabled(false);
        logger.save_config().await;
        logger.log_summary(&report).await?;
        logger.log("Summary shared, thank you!");
    } else {
        logger.log("Summary not shared");
    }

    logger.log_complete("Metrics summary done").await?;
    Ok(report)
}

/// Sample config next to the store, with credentials blanked
pub fn sample_path(store_path: &Path) -> PathBuf {
    store_path.with_extension("json.sample")
}

/// Contents of `logger.json.sample`: only the `config` object
pub fn sample_config(topic_id: &str, memo: &str, gateway_url: &str) -> serde_json::Value {
    json!({
        "config": {
            "ansiDisabled": false,
            "metricsId": "",
            "metricsHcsTopicId": topic_id,
            "metricsHcsTopicMemo": memo,
            "metricsAccountId": "",
            "metricsAccountKey": "",
            "metricsHcsDisabled": false,
            "metricsGatewayUrl": gateway_url,
        }
    })
}

/// Create the telemetry topic, store it in the config and write the sample
pub async fn run_init_topic(logger: &mut LoggerSession, memo: &str) -> anyhow::Result<String> {
    logger
        .log_start(&format!("Creating metrics topic{}", HELLIP))
        .await?;

    let topic_id = match logger.create_metrics_topic(memo).await {
        Ok(topic_id) => topic_id,
        Err(e) => {
            let message = format!("Could not create metrics topic: {}", e);
            logger.log_error(&message).await;
            anyhow::bail!(message);
        }
    };
    logger.log(&format!("Metrics topic created: {}", topic_id));

    let store_path = logger.context().store().path().to_path_buf();
    let sample = sample_config(&topic_id, memo, &logger.config().metrics_gateway_url);
    let path = sample_path(&store_path);
    if let Err(e) = write_sample(&path, &sample).await {
        let message = format!("Could not write {}: {}", path.display(), e);
        logger.log_error(&message).await;
        anyhow::bail!(message);
    }
    info!(path = %path.display(), "Wrote sample logger config");
    logger.log(&format!("Sample config written to {}", path.display()));

    logger.log_complete("Metrics topic ready").await?;
    Ok(topic_id)
}

async fn write_sample(path: &Path, sample: &serde_json::Value) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(sample)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hfw_logger::{LoggerOptions, OperatorInput};
    use hfw_telemetry::{ConfigResolver, InMemoryTopicClient, SharedClientFactory, StatsStore};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn resolver() -> ConfigResolver {
        ConfigResolver::with_env(|key| match key {
            "HFW_METRICS_ACCOUNT_ID" => Some("0.0.1001".to_string()),
            "HFW_METRICS_ACCOUNT_KEY" => Some("key".to_string()),
            _ => None,
        })
    }

    async fn session(
        dir: &TempDir,
        client: &Arc<InMemoryTopicClient>,
        id: &str,
        input: &'static [u8],
    ) -> LoggerSession {
        let options = LoggerOptions::new(id, "setup")
            .with_store_path(dir.path().join("logger.json"))
            .with_close_grace(Duration::ZERO)
            .skip_topic_validation();
        let factory = Arc::new(SharedClientFactory::new(client.clone()));
        LoggerSession::create(options, resolver(), factory)
            .await
            .unwrap()
            .with_output(Box::new(std::io::sink()))
            .with_input(OperatorInput::with_reader(input))
    }

    #[test]
    fn test_sample_path() {
        assert_eq!(
            sample_path(Path::new("/work/logger.json")),
            PathBuf::from("/work/logger.json.sample")
        );
    }

    #[tokio::test]
    async fn test_init_topic_writes_sample() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(InMemoryTopicClient::new());
        let mut logger = session(&dir, &client, INIT_TOPIC_SCRIPT_ID, b"").await;

        let topic_id = run_init_topic(&mut logger, "HFW-METRICS").await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("logger.json.sample")).unwrap();
        let sample: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(sample["config"]["metricsHcsTopicId"], topic_id.as_str());
        assert_eq!(sample["config"]["metricsAccountKey"], "");
        assert_eq!(sample.as_object().unwrap().len(), 1);

        let stored = StatsStore::new(dir.path().join("logger.json")).read().await;
        assert_eq!(
            stored.config_layer().metrics_hcs_topic_id.as_deref(),
            Some(topic_id.as_str())
        );
        assert_eq!(stored.script_stats(INIT_TOPIC_SCRIPT_ID).unwrap().count_complete, 1);
    }

    #[tokio::test]
    async fn test_stats_shares_on_yes() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(InMemoryTopicClient::new());

        let mut init = session(&dir, &client, INIT_TOPIC_SCRIPT_ID, b"").await;
        let topic_id = run_init_topic(&mut init, "HFW-METRICS").await.unwrap();
        let published_before = client.messages(&topic_id).len();

        let mut logger = session(&dir, &client, STATS_SCRIPT_ID, b"y\n").await;
        let report = run_stats(&mut logger, None).await.unwrap();

        assert_eq!(report.completed_task_count, 0);
        let summaries = client
            .messages(&topic_id)
            .iter()
            .skip(published_before)
            .filter(|m| m.contains(r#""cat":"summary""#))
            .count();
        assert_eq!(summaries, 1);
    }

    #[tokio::test]
    async fn test_stats_declined_publishes_no_summary() {
        let dir = TempDir::new().unwrap();
        let client = Arc::new(InMemoryTopicClient::new());

        let mut init = session(&dir, &client, INIT_TOPIC_SCRIPT_ID, b"").await;
        let topic_id = run_init_topic(&mut init, "HFW-METRICS").await.unwrap();

        let mut logger = session(&dir, &client, STATS_SCRIPT_ID, b"").await;
        run_stats(&mut logger, None).await.unwrap();

        assert!(!client
            .messages(&topic_id)
            .iter()
            .any(|m| m.contains(r#""cat":"summary""#)));
    }
}
