use std::sync::Arc;
use crate::circulation::repository::CirculationStore;
use crate::core::domain::Configuration;
use crate::core::repository::RepositoryStore;
use crate::gateway::factory::create_publisher;
use crate::inventory::domain::InventoryService;
use crate::inventory::domain::service::InventoryServiceImpl;

// counters live in the circulation store so a deployment shares one backend
pub async fn create_inventory_service(config: &Configuration, store: RepositoryStore,
                                      circulation_store: Arc<dyn CirculationStore>) -> Arc<dyn InventoryService> {
    let publisher = create_publisher(store.gateway_publisher()).await;
    Arc::new(InventoryServiceImpl::new(config, circulation_store, publisher))
}
