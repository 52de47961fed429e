//! Publisher context
//!
//! Owns everything a logger session needs for telemetry: the stats store,
//! the file and resolved configs, the publisher and its client factory.
//! When no client is attached the config is re-read from the store before
//! publishing, so filling in credentials mid-session enables telemetry.

use crate::config::{ConfigLayer, ConfigResolver, PublisherConfig};
use crate::publisher::{FlushOutcome, MetricsPublisher, DEFAULT_CLOSE_GRACE};
use crate::store::StatsStore;
use crate::topic::TopicClientFactory;
use hfw_core::{MetricsEvent, Result, ScriptId, ScriptStats};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Options for [`PublisherContext::load`]
#[derive(Debug, Clone)]
pub struct ContextOptions {
    /// Attach the client without checking the topic memo
    pub skip_topic_validation: bool,

    /// Grace period before the client is closed
    pub close_grace: Duration,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            skip_topic_validation: false,
            close_grace: DEFAULT_CLOSE_GRACE,
        }
    }
}

pub struct PublisherContext {
    store: StatsStore,
    resolver: ConfigResolver,
    factory: Arc<dyn TopicClientFactory>,
    file_config: ConfigLayer,
    config: PublisherConfig,
    publisher: Arc<MetricsPublisher>,
    detached: Vec<JoinHandle<FlushOutcome>>,
    skip_topic_validation: bool,
    warned: bool,

    /// Opt-in/opt-out made during this session, kept across reloads
    disabled_override: Option<bool>,
}

impl PublisherContext {
    /// Read the config from the store, resolve it and try to connect
    pub async fn load(
        store: StatsStore,
        resolver: ConfigResolver,
        factory: Arc<dyn TopicClientFactory>,
        options: ContextOptions,
    ) -> Result<Self> {
        let mut file_config = store.read().await.config_layer();
        let config = resolver.resolve(&mut file_config)?;

        let publisher = MetricsPublisher::new().with_close_grace(options.close_grace);
        publisher.set_disabled(config.metrics_hcs_disabled);

        let mut context = Self {
            store,
            resolver,
            factory,
            file_config,
            config,
            publisher: Arc::new(publisher),
            detached: Vec::new(),
            skip_topic_validation: options.skip_topic_validation,
            warned: false,
            disabled_override: None,
        };
        context.connect().await;
        Ok(context)
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// The config as it will be persisted
    pub fn file_config(&self) -> &ConfigLayer {
        &self.file_config
    }

    pub fn store(&self) -> &StatsStore {
        &self.store
    }

    pub fn publisher(&self) -> &Arc<MetricsPublisher> {
        &self.publisher
    }

    /// Re-read the config from the store and reconnect if needed
    pub async fn reload(&mut self) -> Result<bool> {
        let mut file_config = self.store.read().await.config_layer();
        if file_config.metrics_id.is_none() {
            file_config.metrics_id = self.file_config.metrics_id.clone();
        }
        let mut config = self.resolver.resolve(&mut file_config)?;
        if let Some(disabled) = self.disabled_override {
            file_config.metrics_hcs_disabled = Some(disabled);
            config.metrics_hcs_disabled = disabled;
        }

        self.publisher.set_disabled(config.metrics_hcs_disabled);
        self.file_config = file_config;
        self.config = config;
        Ok(self.connect().await)
    }

    /// Make sure a client is attached, reloading the config if none is.
    ///
    /// Returns whether events can be published now.
    pub async fn ensure_client(&mut self) -> bool {
        if self.publisher.has_client().await {
            return !self.config.metrics_hcs_disabled;
        }
        match self.reload().await {
            Ok(connected) => connected,
            Err(e) => {
                self.warn_once(format_args!("Could not reload metrics config: {}", e));
                false
            }
        }
    }

    async fn connect(&mut self) -> bool {
        if self.config.metrics_hcs_disabled {
            debug!("Metrics publishing disabled");
            return false;
        }
        if self.publisher.has_client().await {
            return true;
        }
        let credentials = match self.config.credentials() {
            Ok(credentials) => credentials,
            Err(e) => {
                debug!("Metrics publishing not configured: {}", e);
                return false;
            }
        };
        let client = match self.factory.connect(&credentials.account) {
            Ok(client) => client,
            Err(e) => {
                self.warn_once(format_args!("Could not connect metrics client: {}", e));
                return false;
            }
        };

        if !self.skip_topic_validation {
            match client.topic_info(&credentials.topic_id).await {
                Ok(info) if info.memo == credentials.topic_memo => {}
                Ok(info) => {
                    self.warn_once(format_args!(
                        "Metrics topic {} has memo {:?}, expected {:?}; not publishing",
                        credentials.topic_id, info.memo, credentials.topic_memo
                    ));
                    let _ = client.close().await;
                    return false;
                }
                Err(e) => {
                    self.warn_once(format_args!(
                        "Could not validate metrics topic {}: {}",
                        credentials.topic_id, e
                    ));
                    let _ = client.close().await;
                    return false;
                }
            }
        }

        self.publisher.attach(client, &credentials).await;
        true
    }

    fn warn_once(&mut self, message: std::fmt::Arguments<'_>) {
        if self.warned {
            debug!("{}", message);
        } else {
            warn!("{}", message);
            self.warned = true;
        }
    }

    /// Queue an event and publish in a background task.
    ///
    /// Validation happens before returning; publishing does not block the
    /// caller. Outstanding tasks are awaited by [`PublisherContext::close`].
    pub async fn enqueue_detached(&mut self, event: MetricsEvent) -> Result<()> {
        self.publisher.enqueue(event)?;
        self.ensure_client().await;

        self.detached.retain(|handle| !handle.is_finished());
        let publisher = self.publisher.clone();
        self.detached
            .push(tokio::spawn(async move { publisher.flush().await }));
        Ok(())
    }

    /// Queue an event and publish everything queued before returning
    pub async fn enqueue_and_flush(&mut self, event: MetricsEvent) -> Result<FlushOutcome> {
        self.publisher.enqueue(event)?;
        Ok(self.flush().await)
    }

    /// Publish whatever is queued, connecting first if possible
    pub async fn flush(&mut self) -> FlushOutcome {
        self.ensure_client().await;
        self.publisher.flush().await
    }

    /// Wait for background publishes, then release the client
    pub async fn close(&mut self) {
        for handle in self.detached.drain(..) {
            if let Err(e) = handle.await {
                debug!("Background metrics flush did not finish: {}", e);
            }
        }
        self.publisher.close().await;
    }

    /// Merge one script's stats and the config into the store.
    ///
    /// Without a client the config is re-read first, so edits made to the
    /// file during the session are kept rather than overwritten.
    pub async fn persist_stats(
        &mut self,
        script_id: &ScriptId,
        stats: &ScriptStats,
    ) -> Result<()> {
        self.ensure_client().await;
        self.store.write(script_id, stats, &self.file_config).await
    }

    /// Persist the config only
    pub async fn save_config(&self) -> Result<()> {
        self.store.write_config(&self.file_config).await
    }

    /// Opt in to or out of telemetry for this and future sessions
    pub fn set_metrics_disabled(&mut self, disabled: bool) {
        self.disabled_override = Some(disabled);
        self.file_config.metrics_hcs_disabled = Some(disabled);
        self.config.metrics_hcs_disabled = disabled;
        self.publisher.set_disabled(disabled);
    }

    /// Create a new telemetry topic and make it the configured destination
    pub async fn create_metrics_topic(&mut self, memo: &str) -> Result<String> {
        let account = self.config.account_credentials()?;
        let client = self.factory.connect(&account)?;
        let topic_id = client.create_topic(memo).await?;
        if let Err(e) = client.close().await {
            debug!("Ignoring error while closing topic client: {}", e);
        }
        info!(topic_id = %topic_id, memo, "Created metrics topic");

        self.file_config.metrics_hcs_topic_id = Some(topic_id.clone());
        self.file_config.metrics_hcs_topic_memo = Some(memo.to_string());
        self.config.metrics_hcs_topic_id = Some(topic_id.clone());
        self.config.metrics_hcs_topic_memo = memo.to_string();
        self.save_config().await?;

        // publish to the new topic from now on
        self.publisher.close().await;
        self.connect().await;
        Ok(topic_id)
    }
}
