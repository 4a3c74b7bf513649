use std::sync::Arc;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use crate::circulation::domain::CirculationService;
use crate::core::command::{Command, CommandError, request_time};
use crate::items::dto::ItemDto;
use crate::utils::date::opt_serializer;

pub struct RegisterItemCommand {
    circulation_service: Arc<dyn CirculationService>,
}

impl RegisterItemCommand {
    pub fn new(circulation_service: Arc<dyn CirculationService>) -> Self {
        Self {
            circulation_service,
        }
    }
}

fn default_borrowable() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct RegisterItemCommandRequest {
    item_id: String,
    title: String,
    #[serde(default = "default_borrowable")]
    borrowable: bool,
    #[serde(with = "opt_serializer", default)]
    now: Option<NaiveDateTime>,
}

impl RegisterItemCommandRequest {
    pub fn new(item_id: &str, title: &str, borrowable: bool, now: Option<NaiveDateTime>) -> Self {
        Self {
            item_id: item_id.to_string(),
            title: title.to_string(),
            borrowable,
            now,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterItemCommandResponse {
    pub item: ItemDto,
}

impl RegisterItemCommandResponse {
    pub fn new(item: ItemDto) -> Self {
        Self {
            item,
        }
    }
}

#[async_trait]
impl Command<RegisterItemCommandRequest, RegisterItemCommandResponse> for RegisterItemCommand {
    async fn execute(&self, req: RegisterItemCommandRequest) -> Result<RegisterItemCommandResponse, CommandError> {
        self.circulation_service.register_item(req.item_id.as_str(), req.title.as_str(), req.borrowable, request_time(req.now))
            .await.map_err(CommandError::from).map(RegisterItemCommandResponse::new)
    }
}

#[cfg(test)]
mod tests {
    use crate::circulation::command::register_item_cmd::{RegisterItemCommand, RegisterItemCommandRequest};
    use crate::circulation::factory::{create_circulation_service, create_circulation_store};
    use crate::core::command::Command;
    use crate::core::domain::Configuration;
    use crate::core::repository::RepositoryStore;

    #[tokio::test]
    async fn test_should_run_register_item() {
        let store = create_circulation_store(RepositoryStore::Memory).await;
        let svc = create_circulation_service(&Configuration::new("test"), RepositoryStore::Memory, store).await;
        let cmd = RegisterItemCommand::new(svc);
        let res = cmd.execute(RegisterItemCommandRequest::new("42", "Dune", true, None)).await.expect("should register");
        assert!(res.item.available);
        let res = cmd.execute(RegisterItemCommandRequest::new("42", "Dune", false, None)).await.expect("should update");
        assert!(!res.item.borrowable);
        assert_eq!(1, res.item.version);
    }

    #[tokio::test]
    async fn test_should_default_borrowable() {
        let req: RegisterItemCommandRequest = serde_json::from_str(r#"{"item_id":"42","title":"Dune"}"#).expect("should parse");
        assert!(req.borrowable);
        assert_eq!(None, req.now);
    }
}
