//! Redpanda health checks.

use crate::config::RedpandaConfig;
use crate::queue::client_builder;
use tracing::{debug, error};

/// Check Redpanda connection health.
pub async fn check_connection(config: &RedpandaConfig) -> bool {
    match client_builder(config).build().await {
        Ok(client) => match client.list_topics().await {
            Ok(topics) => {
                debug!(topics = topics.len(), "Redpanda connection healthy");
                true
            }
            Err(e) => {
                error!("Failed to list Redpanda topics: {}", e);
                false
            }
        },
        Err(e) => {
            error!("Failed to connect to Redpanda: {}", e);
            false
        }
    }
}

/// Whether the configured backup result topic exists.
pub async fn topic_exists(config: &RedpandaConfig) -> bool {
    match client_builder(config).build().await {
        Ok(client) => match client.list_topics().await {
            Ok(topics) => topics.iter().any(|t| t.name == config.topic),
            Err(_) => false,
        },
        Err(_) => false,
    }
}
