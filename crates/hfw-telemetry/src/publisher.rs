//! Best-effort metrics publisher
//!
//! Provides:
//! - Synchronous, validated enqueue into an in-process FIFO queue
//! - FIFO flush to the telemetry topic once a client is attached
//! - Failure suppression: a failed flush leaves the remainder queued
//! - Graceful client close that never fails

use crate::config::MetricsCredentials;
use crate::metrics::{PublishCounters, PublishSnapshot};
use crate::topic::{MessageSigner, TopicClient, TopicReceipt};
use hfw_core::{MetricsEvent, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Wait before releasing the client connection on close
pub const DEFAULT_CLOSE_GRACE: Duration = Duration::from_millis(500);

/// Where flushed events go
struct Sink {
    client: Arc<dyn TopicClient>,
    signer: MessageSigner,
    topic_id: String,
}

/// Result of a flush attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushOutcome {
    /// Events acknowledged during this flush
    pub published: usize,

    /// Events still queued afterwards
    pub remaining: usize,

    /// No client attached, or telemetry disabled
    pub skipped: bool,
}

/// Queue of metrics events and the client that drains it.
///
/// The queue lives for the process only; events not published before exit
/// are lost.
pub struct MetricsPublisher {
    queue: Mutex<VecDeque<MetricsEvent>>,

    /// Held for the whole flush, so concurrent flushes publish in order
    sink: tokio::sync::Mutex<Option<Sink>>,

    disabled: AtomicBool,
    counters: PublishCounters,
    close_grace: Duration,
}

impl MetricsPublisher {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            sink: tokio::sync::Mutex::new(None),
            disabled: AtomicBool::new(false),
            counters: PublishCounters::new(),
            close_grace: DEFAULT_CLOSE_GRACE,
        }
    }

    /// Override the grace period waited before closing the client
    pub fn with_close_grace(mut self, grace: Duration) -> Self {
        self.close_grace = grace;
        self
    }

    /// Attach a connected client; queued events publish on the next flush
    pub async fn attach(&self, client: Arc<dyn TopicClient>, credentials: &MetricsCredentials) {
        info!(
            client = client.name(),
            topic_id = %credentials.topic_id,
            "Metrics publisher attached"
        );
        *self.sink.lock().await = Some(Sink {
            client,
            signer: MessageSigner::new(&credentials.account),
            topic_id: credentials.topic_id.clone(),
        });
    }

    pub async fn has_client(&self) -> bool {
        self.sink.lock().await.is_some()
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::Relaxed);
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Relaxed)
    }

    /// Validate and queue an event
    pub fn enqueue(&self, event: MetricsEvent) -> Result<()> {
        event.validate()?;
        self.queue.lock().push_back(event);
        self.counters.record_enqueued();
        Ok(())
    }

    /// Number of queued events
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Copy of the queued events, oldest first
    pub fn pending_events(&self) -> Vec<MetricsEvent> {
        self.queue.lock().iter().cloned().collect()
    }

    pub fn counters(&self) -> PublishSnapshot {
        self.counters.snapshot()
    }

    /// Publish queued events in FIFO order.
    ///
    /// Never fails: errors are logged, and the event that failed stays at the
    /// head of the queue together with everything behind it.
    pub async fn flush(&self) -> FlushOutcome {
        let guard = self.sink.lock().await;
        let sink = match guard.as_ref() {
            Some(sink) if !self.is_disabled() => sink,
            _ => {
                let remaining = self.pending();
                debug!(remaining, "Metrics flush skipped, publishing not available");
                return FlushOutcome {
                    published: 0,
                    remaining,
                    skipped: true,
                };
            }
        };

        let mut published = 0;
        loop {
            let Some(event) = self.queue.lock().front().cloned() else {
                break;
            };

            match publish_one(sink, &event).await {
                Ok(receipt) => {
                    self.queue.lock().pop_front();
                    self.counters.record_published();
                    published += 1;
                    debug!(
                        cat = %event.cat,
                        action = %event.action,
                        sequence = receipt.topic_sequence_number,
                        "Published metrics event"
                    );
                }
                Err(e) => {
                    self.counters.record_failed();
                    warn!(
                        "Failed to publish metrics event, {} left queued: {}",
                        self.pending(),
                        e
                    );
                    break;
                }
            }
        }

        FlushOutcome {
            published,
            remaining: self.pending(),
            skipped: false,
        }
    }

    /// Release the client after a short grace period. Errors are ignored.
    pub async fn close(&self) {
        let sink = self.sink.lock().await.take();
        if let Some(sink) = sink {
            tokio::time::sleep(self.close_grace).await;
            if let Err(e) = sink.client.close().await {
                debug!("Ignoring error while closing metrics client: {}", e);
            }
            debug!(client = sink.client.name(), "Metrics client closed");
        }
    }
}

impl Default for MetricsPublisher {
    fn default() -> Self {
        Self::new()
    }
}

async fn publish_one(sink: &Sink, event: &MetricsEvent) -> Result<TopicReceipt> {
    let contents = event.to_message()?;
    let message = sink.signer.sign(&sink.topic_id, &contents)?;
    let transaction_id = sink.client.submit(message).await?;
    sink.client.receipt(&transaction_id).await
}
