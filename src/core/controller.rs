use std::sync::Arc;
use axum::http::StatusCode;
use crate::circulation::domain::CirculationService;
use crate::circulation::factory::{create_circulation_service, create_circulation_store};
use crate::core::command::CommandError;
use crate::core::domain::Configuration;
use crate::core::repository::RepositoryStore;
use crate::inventory::domain::InventoryService;
use crate::inventory::factory::create_inventory_service;

// AppState is shared by every handler; both services sit on the same store so the
// in-memory backend keeps its state across requests.
#[derive(Clone)]
pub struct AppState {
    pub config: Configuration,
    pub store: RepositoryStore,
    pub circulation: Arc<dyn CirculationService>,
    pub inventory: Arc<dyn InventoryService>,
}

impl AppState {
    pub async fn new(branch: &str, store: RepositoryStore) -> AppState {
        let config = Configuration::from_env(branch);
        let circulation_store = create_circulation_store(store).await;
        let circulation = create_circulation_service(&config, store, circulation_store.clone()).await;
        let inventory = create_inventory_service(&config, store, circulation_store).await;
        AppState {
            config,
            store,
            circulation,
            inventory,
        }
    }
}

pub type ServerError = (StatusCode, String);

pub fn json_to_server_error(err: serde_json::Error) -> ServerError {
    (StatusCode::BAD_REQUEST, format!("{}", err))
}

impl From<CommandError> for ServerError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::NotFound { .. } => {
                (StatusCode::NOT_FOUND, format!("{:?}", err))
            }
            CommandError::DuplicateKey { .. } |
            CommandError::InvalidState { .. } |
            CommandError::ItemUnavailable { .. } |
            CommandError::ItemCurrentlyAvailable { .. } |
            CommandError::DuplicateActiveReservation { .. } |
            CommandError::AlreadyBorrowing { .. } |
            CommandError::InsufficientStock { .. } |
            CommandError::ConcurrencyConflict { .. } => {
                (StatusCode::CONFLICT, format!("{:?}", err))
            }
            CommandError::Expired { .. } => {
                (StatusCode::GONE, format!("{:?}", err))
            }
            CommandError::InvalidDate { .. } |
            CommandError::Serialization { .. } |
            CommandError::Validation { .. } => {
                (StatusCode::BAD_REQUEST, format!("{:?}", err))
            }
            CommandError::Database { retryable: true, .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, format!("{:?}", err))
            }
            CommandError::Database { .. } |
            CommandError::Runtime { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("{:?}", err))
            }
        }
    }
}
