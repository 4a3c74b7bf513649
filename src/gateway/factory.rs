use tracing::warn;
use crate::core::events::CIRCULATION_EVENTS;
use crate::core::repository::RepositoryStore;
use crate::gateway::ddb::publisher::DDBPublisher;
use crate::gateway::events::EventPublisher;
use crate::gateway::GatewayPublisherVia;
use crate::gateway::logs::publisher::LogPublisher;
use crate::gateway::sns::publisher::SNSPublisher;
use crate::utils::ddb::{build_db_client, build_sns_client, create_table};

pub async fn create_publisher(via: GatewayPublisherVia) -> Box<dyn EventPublisher> {
    match via {
        GatewayPublisherVia::Sns => {
            let client = build_sns_client().await;
            let mut publisher = SNSPublisher::new(client);
            for topic in CIRCULATION_EVENTS {
                if let Err(err) = publisher.create_topic(topic).await {
                    warn!("failed to create topic {}: {}", topic, err);
                }
            }
            Box::new(publisher)
        }
        GatewayPublisherVia::LocalDynamoDB => {
            let client = build_db_client(RepositoryStore::LocalDynamoDB).await;
            let _ = create_table(&client, "events", "event_id", None).await;
            Box::new(DDBPublisher::new(client, "events"))
        }
        GatewayPublisherVia::Logs => {
            Box::new(LogPublisher::new())
        }
    }
}
