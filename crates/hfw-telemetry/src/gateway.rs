//! HTTP topic gateway client
//!
//! Talks to a topic gateway exposing:
//! - `POST {base}/api/v1/topics` to create a topic
//! - `GET  {base}/api/v1/topics/{id}` for topic metadata
//! - `POST {base}/api/v1/topics/{id}/messages` to submit a signed message
//! - `GET  {base}/api/v1/transactions/{tx}/receipt` for the receipt

use crate::config::AccountCredentials;
use crate::topic::{
    MessageSigner, SignedMessage, TopicClient, TopicClientFactory, TopicInfo, TopicReceipt,
    TransactionId,
};
use async_trait::async_trait;
use hfw_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Per-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Topic client backed by an HTTP gateway
pub struct HttpTopicClient {
    http: reqwest::Client,
    base_url: String,
    signer: MessageSigner,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTopicRequest<'a> {
    memo: &'a str,
    payer_account_id: &'a str,
    signature: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTopicResponse {
    topic_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    transaction_id: String,
}

impl HttpTopicClient {
    pub fn new(credentials: &AccountCredentials) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::publish(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            http,
            base_url: credentials.gateway_url.trim_end_matches('/').to_string(),
            signer: MessageSigner::new(credentials),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, path)
    }
}

fn gateway_error(e: reqwest::Error) -> Error {
    Error::publish(format!("topic gateway request failed: {}", e))
}

#[async_trait]
impl TopicClient for HttpTopicClient {
    async fn create_topic(&self, memo: &str) -> Result<String> {
        let request = CreateTopicRequest {
            memo,
            payer_account_id: self.signer.account_id(),
            signature: self.signer.signature(&[memo.as_bytes()])?,
        };
        let response: CreateTopicResponse = self
            .http
            .post(self.url("topics"))
            .json(&request)
            .send()
            .await
            .map_err(gateway_error)?
            .error_for_status()
            .map_err(gateway_error)?
            .json()
            .await
            .map_err(gateway_error)?;

        debug!(topic_id = %response.topic_id, "Created topic");
        Ok(response.topic_id)
    }

    async fn topic_info(&self, topic_id: &str) -> Result<TopicInfo> {
        self.http
            .get(self.url(&format!("topics/{}", topic_id)))
            .send()
            .await
            .map_err(gateway_error)?
            .error_for_status()
            .map_err(gateway_error)?
            .json()
            .await
            .map_err(gateway_error)
    }

    async fn submit(&self, message: SignedMessage) -> Result<TransactionId> {
        let response: SubmitResponse = self
            .http
            .post(self.url(&format!("topics/{}/messages", message.topic_id)))
            .json(&message)
            .send()
            .await
            .map_err(gateway_error)?
            .error_for_status()
            .map_err(gateway_error)?
            .json()
            .await
            .map_err(gateway_error)?;

        Ok(TransactionId(response.transaction_id))
    }

    async fn receipt(&self, transaction_id: &TransactionId) -> Result<TopicReceipt> {
        let receipt: TopicReceipt = self
            .http
            .get(self.url(&format!("transactions/{}/receipt", transaction_id)))
            .send()
            .await
            .map_err(gateway_error)?
            .error_for_status()
            .map_err(gateway_error)?
            .json()
            .await
            .map_err(gateway_error)?;

        if receipt.status != "SUCCESS" {
            return Err(Error::publish(format!(
                "transaction {} failed with status {}",
                transaction_id, receipt.status
            )));
        }
        Ok(receipt)
    }

    async fn close(&self) -> Result<()> {
        // reqwest releases pooled connections when the last handle drops
        Ok(())
    }

    fn name(&self) -> &str {
        "http-gateway"
    }
}

/// Connects [`HttpTopicClient`]s to the configured gateway
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpTopicClientFactory;

impl TopicClientFactory for HttpTopicClientFactory {
    fn connect(&self, credentials: &AccountCredentials) -> Result<Arc<dyn TopicClient>> {
        Ok(Arc::new(HttpTopicClient::new(credentials)?))
    }
}
