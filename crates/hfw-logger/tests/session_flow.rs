//! End-to-end logger session flows against a temporary stats store

use hfw_core::{EventCategory, MetricsEvent};
use hfw_logger::{compute_summary, LoggerOptions, LoggerSession};
use hfw_telemetry::{ConfigResolver, InMemoryTopicClient, SharedClientFactory, StatsStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const TOPIC: &str = "0.0.4242";

struct Harness {
    _dir: TempDir,
    path: PathBuf,
    client: Arc<InMemoryTopicClient>,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logger.json");
        Self {
            _dir: dir,
            path,
            client: Arc::new(InMemoryTopicClient::new().with_topic(TOPIC, "HFW-METRICS")),
        }
    }

    fn configured() -> Self {
        let harness = Self::new();
        harness.write_config();
        harness
    }

    fn write_config(&self) {
        let mut contents = match std::fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str::<serde_json::Value>(&raw).unwrap(),
            Err(_) => serde_json::json!({}),
        };
        contents["config"] = serde_json::json!({
            "metricsId": "install-1",
            "metricsAccountId": "0.0.1001",
            "metricsAccountKey": "key",
            "metricsHcsTopicId": TOPIC,
            "metricsHcsTopicMemo": "HFW-METRICS"
        });
        std::fs::write(&self.path, serde_json::to_string(&contents).unwrap()).unwrap();
    }

    async fn session(&self, id: &str, category: &str) -> LoggerSession {
        let options = LoggerOptions::new(id, category)
            .with_store_path(&self.path)
            .with_close_grace(Duration::ZERO);
        let factory = Arc::new(SharedClientFactory::new(self.client.clone()));
        LoggerSession::create(options, ConfigResolver::with_env(|_| None), factory)
            .await
            .unwrap()
            .with_output(Box::new(std::io::sink()))
    }

    fn published(&self) -> Vec<MetricsEvent> {
        self.client
            .messages(TOPIC)
            .iter()
            .map(|m| serde_json::from_str(m).unwrap())
            .collect()
    }
}

#[tokio::test]
async fn test_single_task_without_setup() {
    let harness = Harness::new();
    let mut logger = harness.session("demoTask", "task").await;

    logger.log_start("begin").await.unwrap();
    logger.log_complete("done").await.unwrap();

    let stats = logger.stats();
    assert_eq!(stats.count_start, 1);
    assert_eq!(stats.count_complete, 1);
    assert_eq!(stats.count_error, 0);

    let persisted = StatsStore::new(&harness.path).read().await;
    assert_eq!(persisted.script_stats("demoTask").as_ref(), Some(stats));

    let report = compute_summary(&persisted.all_script_stats());
    assert!(!report.has_completed_first_task);
    assert!(report.time_to_first_task_completion.is_none());
    assert_eq!(report.completed_task_count, 1);
}

#[tokio::test]
async fn test_setup_then_task_funnel() {
    let harness = Harness::new();

    let mut setup = harness.session("initAccount", "setup").await;
    setup.log_start("begin").await.unwrap();
    setup.log_complete("done").await.unwrap();

    let mut task = harness.session("demoTask", "task").await;
    task.log_start("begin").await.unwrap();
    let report = {
        task.log_complete_without_close("done").await.unwrap();
        task.metrics_summary().await
    };
    task.close().await;

    assert_eq!(report.reference_setup_script.as_deref(), Some("initAccount"));
    assert_eq!(report.first_task_script.as_deref(), Some("demoTask"));
    assert!(report.has_completed_first_task);
    assert!(report.time_to_first_task_completion.is_some());
}

#[tokio::test]
async fn test_other_scripts_survive_writes() {
    let harness = Harness::new();
    std::fs::write(
        &harness.path,
        r#"{"someFutureKey":{"x":1},"initAccount":{"scriptCategory":"setup","countStart":7}}"#,
    )
    .unwrap();

    let mut logger = harness.session("demoTask", "task").await;
    logger.log_start("begin").await.unwrap();
    logger.close().await;

    let persisted = StatsStore::new(&harness.path).read().await;
    assert_eq!(persisted.raw("someFutureKey"), Some(&serde_json::json!({ "x": 1 })));
    assert_eq!(persisted.script_stats("initAccount").unwrap().count_start, 7);
    assert_eq!(persisted.script_stats("demoTask").unwrap().count_start, 1);
}

#[tokio::test]
async fn test_error_fingerprint_is_stable_across_runs() {
    let harness = Harness::configured();

    for _ in 0..2 {
        let mut logger = harness.session("demoTask", "task").await;
        logger.log("connecting to the network");
        logger.log_error("connection refused").await;
    }
    let mut logger = harness.session("demoTask", "task").await;
    logger.log("connecting to the network");
    logger.log("retrying");
    logger.log_error("connection refused").await;

    let details: Vec<String> = harness
        .published()
        .into_iter()
        .filter(|e| e.cat == EventCategory::Error)
        .map(|e| e.detail.as_str().unwrap().to_string())
        .collect();

    assert_eq!(details.len(), 3);
    assert_eq!(details[0], details[1]);
    assert_ne!(details[0], details[2]);
    assert!(details[0].ends_with("-1"));
    assert!(!details.iter().any(|d| d.contains("refused")));

    let stats = logger.stats();
    assert_eq!(stats.count_error, 3);
    assert_eq!(stats.count_error_before_first_complete, 3);
}

#[tokio::test]
async fn test_events_queue_until_credentials_appear() {
    let harness = Harness::new();
    let mut logger = harness.session("demoTask", "task").await;

    logger.log_start("begin").await.unwrap();
    assert!(harness.published().is_empty());
    assert_eq!(logger.context().publisher().pending(), 1);

    harness.write_config();
    logger.log_complete("done").await.unwrap();

    let events = harness.published();
    let categories: Vec<EventCategory> = events.iter().map(|e| e.cat).collect();
    assert_eq!(categories, vec![EventCategory::Start, EventCategory::Complete]);
    assert!(events.iter().all(|e| e.action == "demoTask"));
    assert_eq!(logger.context().publisher().pending(), 0);

    // the edited credentials were not overwritten by the session's own writes
    let persisted = StatsStore::new(&harness.path).read().await.config_layer();
    assert_eq!(persisted.metrics_hcs_topic_id.as_deref(), Some(TOPIC));
}

#[tokio::test]
async fn test_summary_sharing_is_opt_in() {
    let harness = Harness::configured();
    let mut logger = harness.session("metricsStats", "setup").await;

    logger.set_metrics_disabled(true);
    logger
        .log_summary(&serde_json::json!({ "completedTasks": 0 }))
        .await
        .unwrap();
    assert!(harness.published().is_empty());

    logger.set_metrics_disabled(false);
    logger.save_config().await;
    logger
        .log_summary(&serde_json::json!({ "completedTasks": 0 }))
        .await
        .unwrap();
    logger.close().await;

    let events = harness.published();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].cat, EventCategory::Summary);
    assert_eq!(events[0].detail["completedTasks"], 0);
    assert_eq!(events[0].id, "install-1");
}

#[tokio::test]
async fn test_unreachable_topic_service_keeps_events_queued() {
    let harness = Harness::configured();
    harness.client.fail_after(0);
    harness.client.fail_on_close(true);
    let mut logger = harness.session("demoTask", "task").await;

    logger.log_start("begin").await.unwrap();
    logger.log_complete("done").await.unwrap();

    let pending: Vec<EventCategory> = logger
        .context()
        .publisher()
        .pending_events()
        .iter()
        .map(|e| e.cat)
        .collect();
    assert_eq!(pending, vec![EventCategory::Start, EventCategory::Complete]);
    assert_eq!(logger.stats().count_complete, 1);

    logger.log_error("connection refused").await;

    let pending = logger.context().publisher().pending_events();
    assert_eq!(pending.len(), 3);
    assert_eq!(pending[2].cat, EventCategory::Error);
    assert!(harness.published().is_empty());

    let persisted = StatsStore::new(&harness.path).read().await;
    assert_eq!(persisted.script_stats("demoTask").unwrap().count_error, 1);
}

#[tokio::test]
async fn test_opt_out_holds_for_the_rest_of_the_session() {
    let harness = Harness::configured();
    let mut logger = harness.session("demoTask", "task").await;

    logger.set_metrics_disabled(true);
    logger.log_start("begin").await.unwrap();
    logger.log_complete_without_close("done").await.unwrap();
    logger.log_error("late failure").await;

    assert!(harness.published().is_empty());
    assert!(logger.context().publisher().is_disabled());
    assert!(logger.context().config().metrics_hcs_disabled);

    let persisted = StatsStore::new(&harness.path).read().await.config_layer();
    assert_eq!(persisted.metrics_hcs_disabled, Some(true));
}
