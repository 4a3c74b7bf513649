use std::sync::Arc;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;
use crate::core::events::DomainEvent;
use crate::core::library::LibraryError;
use crate::gateway::events::EventPublisher;

const MAX_RETAINED: usize = 1000;

// LogPublisher writes events to the structured log and keeps the most recent ones in
// memory so they can be inspected. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct LogPublisher {
    published: Arc<Mutex<Vec<DomainEvent>>>,
}

impl LogPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn published(&self) -> Vec<DomainEvent> {
        self.published.lock().await.clone()
    }
}

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn create_topic(&mut self, topic: &str) -> Result<String, LibraryError> {
        Ok(topic.to_string())
    }

    async fn get_topics(&mut self) -> Result<Vec<String>, LibraryError> {
        Ok(vec![])
    }

    async fn publish(&self, event: &DomainEvent) -> Result<(), LibraryError> {
        info!(event = event.name.as_str(), key = event.key.as_str(), data = event.json_data.as_str(), "domain event");
        let mut published = self.published.lock().await;
        if published.len() >= MAX_RETAINED {
            published.remove(0);
        }
        published.push(event.clone());
        Ok(())
    }
}
