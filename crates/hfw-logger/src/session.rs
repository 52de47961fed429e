//! Logger session
//!
//! One session per script run. Lifecycle calls update the script's stats,
//! persist them, queue a metrics event and print a banner:
//!
//! `created -> started -> (section)* -> completed | errored`
//!
//! Stats and config write failures are logged and never returned to the
//! calling script. The same holds for publishing.

use crate::console::{Console, Highlight, Style};
use crate::prompt::OperatorInput;
use crate::summary::{compute_summary, render_summary, SummaryReport};
use crate::VERSION;
use hfw_core::{
    now_millis, EventCategory, MetricsEvent, Result, ScriptCategory, ScriptId, ScriptStats,
};
use hfw_telemetry::{
    error_fingerprint, ConfigResolver, ContextOptions, HttpTopicClientFactory, PublisherConfig,
    PublisherContext, StatsStore, TopicClientFactory,
};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Options for creating a [`LoggerSession`]
#[derive(Debug, Clone)]
pub struct LoggerOptions {
    pub script_id: String,

    /// `setup` or `task`
    pub script_category: String,

    /// Publish without checking the topic memo
    pub skip_topic_validation: bool,

    /// Stats store location; `HFW_LOGGER_FILE` or `logger.json` otherwise
    pub store_path: Option<PathBuf>,

    /// Wait before the publishing client is closed
    pub close_grace: Duration,
}

impl LoggerOptions {
    pub fn new(script_id: impl Into<String>, script_category: impl Into<String>) -> Self {
        Self {
            script_id: script_id.into(),
            script_category: script_category.into(),
            skip_topic_validation: false,
            store_path: None,
            close_grace: ContextOptions::default().close_grace,
        }
    }

    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    pub fn skip_topic_validation(mut self) -> Self {
        self.skip_topic_validation = true;
        self
    }

    pub fn with_close_grace(mut self, grace: Duration) -> Self {
        self.close_grace = grace;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Started,
    Completed,
    Errored,
}

/// Per-run logging facade
pub struct LoggerSession {
    script_id: ScriptId,
    category: ScriptCategory,
    stats: ScriptStats,
    context: PublisherContext,
    console: Console,
    input: OperatorInput,
    step: u64,
    last_message: String,
    state: SessionState,
}

/// Create a session that publishes through the HTTP gateway, with config
/// from the store file and the process environment
pub async fn create_logger(options: LoggerOptions) -> Result<LoggerSession> {
    LoggerSession::create(
        options,
        ConfigResolver::from_env(),
        Arc::new(HttpTopicClientFactory),
    )
    .await
}

impl LoggerSession {
    /// Validate the identity, load prior stats and config, connect if configured.
    ///
    /// An invalid identifier or category fails before anything is read.
    pub async fn create(
        options: LoggerOptions,
        resolver: ConfigResolver,
        factory: Arc<dyn TopicClientFactory>,
    ) -> Result<Self> {
        let script_id = ScriptId::new(options.script_id)?;
        let category: ScriptCategory = options.script_category.parse()?;

        let store = match options.store_path {
            Some(path) => StatsStore::new(path),
            None => StatsStore::from_env(),
        };
        let mut stats = store
            .read()
            .await
            .script_stats(script_id.as_str())
            .unwrap_or_else(|| ScriptStats::new(category));
        stats.script_category = category;

        let context_options = ContextOptions {
            skip_topic_validation: options.skip_topic_validation,
            close_grace: options.close_grace,
        };
        let context = PublisherContext::load(store, resolver, factory, context_options).await?;
        let console = Console::stdout(Style::new(!context.config().ansi_disabled));

        info!(
            script_id = %script_id,
            category = %category,
            version = VERSION,
            "Logger session created"
        );

        Ok(Self {
            script_id,
            category,
            stats,
            context,
            console,
            input: OperatorInput::stdin(),
            step: 0,
            last_message: String::new(),
            state: SessionState::Created,
        })
    }

    /// Send console output somewhere other than stdout
    pub fn with_output(mut self, out: Box<dyn Write + Send>) -> Self {
        self.console = Console::with_writer(self.console.style(), out);
        self
    }

    /// Read operator answers from somewhere other than stdin
    pub fn with_input(mut self, input: OperatorInput) -> Self {
        self.input = input;
        self
    }

    pub fn script_id(&self) -> &ScriptId {
        &self.script_id
    }

    pub fn category(&self) -> ScriptCategory {
        self.category
    }

    /// Build or revision stamp sent with every event
    pub fn version(&self) -> &'static str {
        VERSION
    }

    pub fn stats(&self) -> &ScriptStats {
        &self.stats
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &PublisherConfig {
        self.context.config()
    }

    pub fn context(&self) -> &PublisherContext {
        &self.context
    }

    /// Style `text` according to the ANSI setting
    pub fn apply_ansi(&self, kind: Highlight, text: &str) -> String {
        self.console.style().apply(kind, text)
    }

    fn advance(&mut self, message: &str) {
        self.step += 1;
        self.last_message = message.to_string();
    }

    fn event(
        &self,
        cat: EventCategory,
        detail: impl Into<serde_json::Value>,
        time: u64,
    ) -> MetricsEvent {
        MetricsEvent::new(
            self.context.config().metrics_id.as_str(),
            VERSION,
            cat,
            self.script_id.as_str(),
            detail,
        )
        .at(time)
    }

    async fn persist(&mut self) {
        if let Err(e) = self.context.persist_stats(&self.script_id, &self.stats).await {
            error!(
                script_id = %self.script_id,
                path = %self.context.store().path().display(),
                "Failed to persist script stats: {}",
                e
            );
        }
    }

    /// Plain log line
    pub fn log(&mut self, message: &str) {
        self.advance(message);
        self.console.line(message);
    }

    pub fn log_section(&mut self, message: &str) {
        self.advance(message);
        self.console.banner(Highlight::Section, message);
    }

    /// Section banner, then block until the operator presses enter
    pub async fn log_section_with_wait_prompt(&mut self, message: &str) -> Result<()> {
        self.log_section(message);
        let prompt = self.apply_ansi(
            Highlight::Info,
            "(Hit the \"return\" key when ready to proceed)",
        );
        self.console.line(&prompt);
        self.input.read_line().await?;
        Ok(())
    }

    /// Ask a yes/no question and wait for the answer; no is the default
    pub async fn confirm(&mut self, question: &str) -> Result<bool> {
        self.advance(question);
        self.console.line(&format!("{} (y/N)", question));
        self.input.confirm().await
    }

    /// Start banner and start event. Publishing runs in the background.
    pub async fn log_start(&mut self, message: &str) -> Result<()> {
        self.advance(message);
        self.state = SessionState::Started;
        self.console.banner(Highlight::Start, message);

        let now = now_millis();
        self.stats.record_start(now);
        self.persist().await;

        let event = self.event(EventCategory::Start, message, now);
        self.context.enqueue_detached(event).await?;
        debug!(script_id = %self.script_id, step = self.step, "Logged start");
        Ok(())
    }

    /// Complete banner and event, funnel summary for tasks, then close the client
    pub async fn log_complete(&mut self, message: &str) -> Result<()> {
        let result = self.log_complete_without_close(message).await;
        self.close().await;
        result
    }

    /// As [`LoggerSession::log_complete`], keeping the client open
    pub async fn log_complete_without_close(&mut self, message: &str) -> Result<()> {
        self.advance(message);
        self.state = SessionState::Completed;
        self.console.banner(Highlight::Complete, message);

        let now = now_millis();
        self.stats.record_complete(now);
        self.persist().await;

        let event = self.event(EventCategory::Complete, message, now);
        let outcome = self.context.enqueue_and_flush(event).await?;
        debug!(
            script_id = %self.script_id,
            published = outcome.published,
            remaining = outcome.remaining,
            "Logged complete"
        );

        if self.category == ScriptCategory::Task {
            self.metrics_summary().await;
        }
        Ok(())
    }

    /// Report a failure.
    ///
    /// Only a fingerprint of the previous message and step is published;
    /// the full message is printed locally. Closes the client and never
    /// fails: the calling script is expected to exit right after.
    pub async fn log_error(&mut self, message: &str) {
        let fingerprint = error_fingerprint(&self.last_message, self.step);
        self.advance(message);
        self.state = SessionState::Errored;

        let now = now_millis();
        self.stats.record_error(now);
        self.persist().await;

        let event = self.event(EventCategory::Error, fingerprint.as_str(), now);
        if let Err(e) = self.context.enqueue_and_flush(event).await {
            error!(script_id = %self.script_id, "Failed to queue error event: {}", e);
        }
        self.close().await;

        self.console
            .banner(Highlight::Error, &format!("Error ({})", fingerprint));
        self.console.line(message);
    }

    /// Publish an arbitrary payload as a summary event.
    ///
    /// Does nothing while telemetry is disabled.
    pub async fn log_summary<T: Serialize>(&mut self, payload: &T) -> Result<()> {
        self.step += 1;
        if self.context.config().metrics_hcs_disabled {
            debug!(script_id = %self.script_id, "Telemetry disabled, summary not shared");
            return Ok(());
        }

        let detail = serde_json::to_value(payload)?;
        let event = self.event(EventCategory::Summary, detail, now_millis());
        let outcome = self.context.enqueue_and_flush(event).await?;
        debug!(published = outcome.published, "Logged summary");
        Ok(())
    }

    /// Compute the funnel over every persisted script and print it
    pub async fn metrics_summary(&mut self) -> SummaryReport {
        let mut all_stats = self.context.store().read().await.all_script_stats();
        // the store may be unwritable; this run's stats still count
        all_stats.insert(self.script_id.to_string(), self.stats.clone());

        let report = compute_summary(&all_stats);

        let config = self.context.config();
        let topic_id = if config.metrics_hcs_disabled {
            None
        } else {
            config.metrics_hcs_topic_id.clone()
        };
        let lines = render_summary(&report, self.console.style(), topic_id.as_deref());

        self.console.banner(Highlight::Summary, "Metrics summary");
        for line in lines {
            self.console.line(&line);
        }
        self.console.blank();
        report
    }

    /// Wait for background publishing, then release the client. Never fails.
    pub async fn close(&mut self) {
        self.context.close().await;
    }

    /// Opt in to or out of telemetry for the rest of the session.
    ///
    /// Written to the store with the next stats write, or right away by
    /// [`LoggerSession::save_config`].
    pub fn set_metrics_disabled(&mut self, disabled: bool) {
        self.context.set_metrics_disabled(disabled);
    }

    /// Persist the config alone
    pub async fn save_config(&self) {
        if let Err(e) = self.context.save_config().await {
            error!(
                path = %self.context.store().path().display(),
                "Failed to save logger config: {}",
                e
            );
        }
    }

    /// Create a telemetry topic and make it the configured destination
    pub async fn create_metrics_topic(&mut self, memo: &str) -> Result<String> {
        self.context.create_metrics_topic(memo).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hfw_core::Error;
    use hfw_telemetry::{InMemoryTopicClient, SharedClientFactory};
    use tempfile::TempDir;

    fn factory() -> Arc<dyn TopicClientFactory> {
        Arc::new(SharedClientFactory::new(Arc::new(InMemoryTopicClient::new())))
    }

    async fn session(temp_dir: &TempDir, id: &str, category: &str) -> Result<LoggerSession> {
        let options = LoggerOptions::new(id, category)
            .with_store_path(temp_dir.path().join("logger.json"))
            .with_close_grace(Duration::ZERO);
        let session =
            LoggerSession::create(options, ConfigResolver::with_env(|_| None), factory()).await?;
        Ok(session.with_output(Box::new(std::io::sink())))
    }

    #[tokio::test]
    async fn test_invalid_identity_fails_construction() {
        let temp_dir = TempDir::new().unwrap();

        let result = session(&temp_dir, "x", "task").await;
        assert!(matches!(result, Err(Error::InvalidScriptId(_))));

        let result = session(&temp_dir, "hcsTopic", "demo").await;
        assert!(matches!(result, Err(Error::InvalidCategory(_))));

        assert!(!temp_dir.path().join("logger.json").exists());
    }

    #[tokio::test]
    async fn test_every_call_advances_step() {
        let temp_dir = TempDir::new().unwrap();
        let mut logger = session(&temp_dir, "hcsTopic", "task").await.unwrap();

        assert_eq!(logger.state(), SessionState::Created);
        logger.log_start("begin").await.unwrap();
        logger.log("one");
        logger.log_section("two");
        logger.log_summary(&serde_json::json!({ "ok": true })).await.unwrap();

        assert_eq!(logger.step(), 4);
        assert_eq!(logger.state(), SessionState::Started);
        logger.close().await;
    }

    #[tokio::test]
    async fn test_wait_prompt_consumes_one_line() {
        let temp_dir = TempDir::new().unwrap();
        let mut logger = session(&temp_dir, "hcsTopic", "task")
            .await
            .unwrap()
            .with_input(OperatorInput::with_reader(&b"\nleft over\n"[..]));

        logger.log_section_with_wait_prompt("Step 1").await.unwrap();

        assert_eq!(logger.step(), 1);
        assert_eq!(
            logger.input.read_line().await.unwrap().as_deref(),
            Some("left over")
        );
    }

    #[tokio::test]
    async fn test_error_after_complete_counts_after() {
        let temp_dir = TempDir::new().unwrap();
        let mut logger = session(&temp_dir, "initAccount", "setup").await.unwrap();

        logger.log_start("begin").await.unwrap();
        logger.log_complete_without_close("done").await.unwrap();
        logger.log_error("late failure").await;

        let stats = logger.stats();
        assert_eq!(stats.count_error, 1);
        assert_eq!(stats.count_error_after_first_complete, 1);
        assert_eq!(stats.count_error_before_first_complete, 0);
        assert_eq!(logger.state(), SessionState::Errored);
    }

    #[tokio::test]
    async fn test_prior_stats_loaded() {
        let temp_dir = TempDir::new().unwrap();

        let mut first = session(&temp_dir, "hcsTopic", "task").await.unwrap();
        first.log_start("begin").await.unwrap();
        first.close().await;

        let second = session(&temp_dir, "hcsTopic", "task").await.unwrap();
        assert_eq!(second.stats().count_start, 1);
        assert!(second.stats().first_start.is_some());
    }

    #[tokio::test]
    async fn test_apply_ansi_follows_config() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("logger.json"),
            r#"{"config":{"ansiDisabled":true}}"#,
        )
        .unwrap();
        let logger = session(&temp_dir, "hcsTopic", "task").await.unwrap();

        assert_eq!(logger.apply_ansi(Highlight::Url, "https://x"), "https://x");
        assert!(!logger.version().is_empty());
    }
}
