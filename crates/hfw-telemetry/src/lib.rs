//! Hello Future World telemetry
//!
//! Durable stats and best-effort metrics publishing for the tutorial logger.
//!
//! Provides:
//! - A JSON stats store shared by every script run
//! - Layered publisher configuration (file > environment > defaults)
//! - Error fingerprints that keep raw messages local
//! - A queueing publisher that survives an unavailable topic service

pub mod config;
pub mod context;
pub mod fingerprint;
pub mod gateway;
pub mod metrics;
pub mod publisher;
pub mod store;
pub mod topic;

pub use config::{ConfigLayer, ConfigResolver, MetricsCredentials, PublisherConfig};
pub use context::{ContextOptions, PublisherContext};
pub use fingerprint::error_fingerprint;
pub use gateway::{HttpTopicClient, HttpTopicClientFactory};
pub use publisher::{FlushOutcome, MetricsPublisher};
pub use store::{StatsStore, StoreContents};
pub use topic::{InMemoryTopicClient, SharedClientFactory, TopicClient, TopicClientFactory};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::{ConfigResolver, PublisherConfig};
    pub use crate::context::{ContextOptions, PublisherContext};
    pub use crate::publisher::{FlushOutcome, MetricsPublisher};
    pub use crate::store::StatsStore;
    pub use crate::topic::{TopicClient, TopicClientFactory};
}
