use crate::errors::{GatewayError, Result};
use crate::metrics::NATS_MESSAGES_PUBLISHED;
use crate::models::EconomyEvent;
use async_nats::Client;
use async_trait::async_trait;
use tracing::{debug, info};

/// Sink for economy events
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &EconomyEvent) -> Result<()>;
}

pub struct NatsProducer {
    client: Client,
    topic_prefix: String,
}

impl NatsProducer {
    pub async fn new(url: &str, topic_prefix: &str) -> Result<Self> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| GatewayError::Nats(e.to_string()))?;

        info!("Connected to NATS at {}", url);

        Ok(NatsProducer {
            client,
            topic_prefix: topic_prefix.to_string(),
        })
    }

    pub fn subject(&self, event: &EconomyEvent) -> String {
        subject_for(&self.topic_prefix, event)
    }
}

fn subject_for(prefix: &str, event: &EconomyEvent) -> String {
    format!("{}.economy.{}", prefix, event.kind.as_str())
}

#[async_trait]
impl EventPublisher for NatsProducer {
    async fn publish(&self, event: &EconomyEvent) -> Result<()> {
        let subject = self.subject(event);
        let payload = serde_json::to_vec(event)?;

        let result = self
            .client
            .publish(subject.clone(), payload.into())
            .await
            .map_err(|e| GatewayError::Nats(format!("Failed to publish event: {}", e)));

        let status = if result.is_ok() { "ok" } else { "error" };
        NATS_MESSAGES_PUBLISHED
            .with_label_values(&[subject.as_str(), status])
            .inc();
        result?;

        debug!(event_id = %event.event_id, %subject, "Published economy event");
        Ok(())
    }
}

impl std::fmt::Debug for NatsProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsProducer")
            .field("topic_prefix", &self.topic_prefix)
            .finish_non_exhaustive()
    }
}

/// Publisher used when NATS is disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

#[async_trait]
impl EventPublisher for NoopPublisher {
    async fn publish(&self, event: &EconomyEvent) -> Result<()> {
        debug!(event_id = %event.event_id, kind = event.kind.as_str(), "Event publishing disabled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EconomyEventKind;
    use economy_core::UserId;

    #[test]
    fn test_subject_naming() {
        let event = EconomyEvent::new(
            EconomyEventKind::DailyRewardClaimed,
            UserId(3),
            serde_json::json!({}),
        );
        assert_eq!(subject_for("taru", &event), "taru.economy.daily_reward_claimed");
    }

    #[test]
    fn test_noop_publisher() {
        let event = EconomyEvent::new(EconomyEventKind::ExpAwarded, UserId(1), serde_json::json!({}));
        assert!(tokio_test::block_on(NoopPublisher.publish(&event)).is_ok());
    }
}
