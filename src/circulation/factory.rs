use std::sync::Arc;
use tracing::warn;
use crate::circulation::domain::CirculationService;
use crate::circulation::domain::service::CirculationServiceImpl;
use crate::circulation::repository::CirculationStore;
use crate::circulation::repository::ddb_circulation_store::{create_circulation_tables, DDBCirculationStore};
use crate::circulation::repository::memory_circulation_store::MemoryCirculationStore;
use crate::core::domain::Configuration;
use crate::core::repository::RepositoryStore;
use crate::gateway::factory::create_publisher;
use crate::utils::ddb::build_db_client;

pub async fn create_circulation_store(store: RepositoryStore) -> Arc<dyn CirculationStore> {
    match store {
        RepositoryStore::DynamoDB => {
            let client = build_db_client(store).await;
            Arc::new(DDBCirculationStore::new(client))
        }
        RepositoryStore::LocalDynamoDB => {
            let client = build_db_client(store).await;
            if let Err(err) = create_circulation_tables(&client).await {
                warn!("could not create circulation tables: {}", err);
            }
            Arc::new(DDBCirculationStore::new(client))
        }
        RepositoryStore::Memory => {
            Arc::new(MemoryCirculationStore::new())
        }
    }
}

pub async fn create_circulation_service(config: &Configuration, store: RepositoryStore,
                                        circulation_store: Arc<dyn CirculationStore>) -> Arc<dyn CirculationService> {
    let publisher = create_publisher(store.gateway_publisher()).await;
    Arc::new(CirculationServiceImpl::new(config, circulation_store, publisher))
}
