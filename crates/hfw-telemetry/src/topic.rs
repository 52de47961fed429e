//! Topic client abstraction
//!
//! The telemetry sink is an append-only, topic-addressed messaging service.
//! Each publish is sign -> submit -> await receipt.

use crate::config::AccountCredentials;
use async_trait::async_trait;
use hfw_core::{Error, Result};
use hmac::{Hmac, Mac};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

/// A message ready for submission to a topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedMessage {
    pub topic_id: String,
    pub payer_account_id: String,
    pub contents: String,
    /// Hex HMAC-SHA256 over topic id and contents
    pub signature: String,
}

/// Identifier of a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub String);

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Acknowledgement of a submitted message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicReceipt {
    pub status: String,
    pub topic_sequence_number: u64,
}

/// Public metadata of a topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicInfo {
    pub topic_id: String,
    pub memo: String,
}

/// Client for the telemetry topic service
#[async_trait]
pub trait TopicClient: Send + Sync {
    /// Create a new topic, returning its id
    async fn create_topic(&self, memo: &str) -> Result<String>;

    /// Look up a topic's metadata
    async fn topic_info(&self, topic_id: &str) -> Result<TopicInfo>;

    /// Submit a signed message
    async fn submit(&self, message: SignedMessage) -> Result<TransactionId>;

    /// Wait for the receipt of a submitted message
    async fn receipt(&self, transaction_id: &TransactionId) -> Result<TopicReceipt>;

    /// Release the network connection
    async fn close(&self) -> Result<()>;

    /// Client name, for diagnostics
    fn name(&self) -> &str;
}

/// Builds connected clients from account credentials
pub trait TopicClientFactory: Send + Sync {
    fn connect(&self, credentials: &AccountCredentials) -> Result<Arc<dyn TopicClient>>;
}

/// Signs topic messages with the metrics account key
#[derive(Clone)]
pub struct MessageSigner {
    account_id: String,
    key: Vec<u8>,
}

impl MessageSigner {
    pub fn new(credentials: &AccountCredentials) -> Self {
        Self {
            account_id: credentials.account_id.clone(),
            key: credentials.account_key.as_bytes().to_vec(),
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn sign(&self, topic_id: &str, contents: &str) -> Result<SignedMessage> {
        Ok(SignedMessage {
            topic_id: topic_id.to_string(),
            payer_account_id: self.account_id.clone(),
            contents: contents.to_string(),
            signature: self.signature(&[topic_id.as_bytes(), contents.as_bytes()])?,
        })
    }

    /// Verify a message produced by [`MessageSigner::sign`]
    pub fn verify(&self, message: &SignedMessage) -> bool {
        self.signature(&[message.topic_id.as_bytes(), message.contents.as_bytes()])
            .map(|expected| expected == message.signature)
            .unwrap_or(false)
    }

    pub(crate) fn signature(&self, parts: &[&[u8]]) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| Error::internal(format!("invalid signing key: {}", e)))?;
        for part in parts {
            mac.update(part);
        }
        Ok(format!("{:x}", mac.finalize().into_bytes()))
    }
}

impl std::fmt::Debug for MessageSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageSigner")
            .field("account_id", &self.account_id)
            .finish_non_exhaustive()
    }
}

/// In-process topic service.
///
/// Keeps every topic and message in memory; can be told to fail after a
/// number of successful submissions. Closing only counts, so one instance can
/// be shared across sessions.
#[derive(Default)]
pub struct InMemoryTopicClient {
    inner: Mutex<InMemoryInner>,
}

#[derive(Default)]
struct InMemoryInner {
    topics: HashMap<String, InMemoryTopic>,
    receipts: HashMap<TransactionId, u64>,
    next_topic: u64,
    submissions: usize,
    fail_after: Option<usize>,
    fail_close: bool,
    close_count: usize,
}

struct InMemoryTopic {
    memo: String,
    messages: Vec<SignedMessage>,
}

impl InMemoryTopicClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-register a topic
    pub fn with_topic(self, topic_id: impl Into<String>, memo: impl Into<String>) -> Self {
        self.inner.lock().topics.insert(
            topic_id.into(),
            InMemoryTopic {
                memo: memo.into(),
                messages: Vec::new(),
            },
        );
        self
    }

    /// Reject every submission after `n` successful ones
    pub fn fail_after(&self, n: usize) {
        self.inner.lock().fail_after = Some(n);
    }

    /// Accept submissions again
    pub fn recover(&self) {
        self.inner.lock().fail_after = None;
    }

    /// Contents of every message on a topic, in sequence order
    pub fn messages(&self, topic_id: &str) -> Vec<String> {
        self.inner
            .lock()
            .topics
            .get(topic_id)
            .map(|topic| topic.messages.iter().map(|m| m.contents.clone()).collect())
            .unwrap_or_default()
    }

    /// Signed messages on a topic, in sequence order
    pub fn signed_messages(&self, topic_id: &str) -> Vec<SignedMessage> {
        self.inner
            .lock()
            .topics
            .get(topic_id)
            .map(|topic| topic.messages.clone())
            .unwrap_or_default()
    }

    /// Make `close` return an error (it is still counted)
    pub fn fail_on_close(&self, fail: bool) {
        self.inner.lock().fail_close = fail;
    }

    /// Number of times the client has been closed
    pub fn close_count(&self) -> usize {
        self.inner.lock().close_count
    }
}

#[async_trait]
impl TopicClient for InMemoryTopicClient {
    async fn create_topic(&self, memo: &str) -> Result<String> {
        let mut inner = self.inner.lock();
        inner.next_topic += 1;
        let topic_id = format!("0.0.{}", 9_000 + inner.next_topic);
        inner.topics.insert(
            topic_id.clone(),
            InMemoryTopic {
                memo: memo.to_string(),
                messages: Vec::new(),
            },
        );
        Ok(topic_id)
    }

    async fn topic_info(&self, topic_id: &str) -> Result<TopicInfo> {
        let inner = self.inner.lock();
        let topic = inner
            .topics
            .get(topic_id)
            .ok_or_else(|| Error::publish(format!("unknown topic {}", topic_id)))?;
        Ok(TopicInfo {
            topic_id: topic_id.to_string(),
            memo: topic.memo.clone(),
        })
    }

    async fn submit(&self, message: SignedMessage) -> Result<TransactionId> {
        let mut inner = self.inner.lock();
        if inner.fail_after.is_some_and(|n| inner.submissions >= n) {
            return Err(Error::publish("topic service unavailable"));
        }
        let submissions = inner.submissions + 1;
        let topic = inner
            .topics
            .get_mut(&message.topic_id)
            .ok_or_else(|| Error::publish(format!("unknown topic {}", message.topic_id)))?;
        topic.messages.push(message.clone());
        let sequence_number = topic.messages.len() as u64;

        let transaction_id = TransactionId(format!(
            "{}@{}.{}",
            message.payer_account_id, submissions, sequence_number
        ));
        inner.submissions = submissions;
        inner.receipts.insert(transaction_id.clone(), sequence_number);
        Ok(transaction_id)
    }

    async fn receipt(&self, transaction_id: &TransactionId) -> Result<TopicReceipt> {
        let inner = self.inner.lock();
        let sequence_number = inner
            .receipts
            .get(transaction_id)
            .copied()
            .ok_or_else(|| Error::publish(format!("no receipt for {}", transaction_id)))?;
        Ok(TopicReceipt {
            status: "SUCCESS".to_string(),
            topic_sequence_number: sequence_number,
        })
    }

    async fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.close_count += 1;
        if inner.fail_close {
            return Err(Error::publish("connection reset while closing"));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

/// Factory handing out one pre-built client, whatever the credentials
pub struct SharedClientFactory {
    client: Arc<dyn TopicClient>,
}

impl SharedClientFactory {
    pub fn new(client: Arc<dyn TopicClient>) -> Self {
        Self { client }
    }
}

impl TopicClientFactory for SharedClientFactory {
    fn connect(&self, _credentials: &AccountCredentials) -> Result<Arc<dyn TopicClient>> {
        Ok(self.client.clone())
    }
}
