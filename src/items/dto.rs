use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use crate::core::domain::Identifiable;
use crate::items::domain::Item;
use crate::items::domain::model::ItemEntity;
use crate::utils::date::serializer;

// ItemDto abstracts the availability of a catalog item as seen by circulation.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ItemDto {
    pub item_id: String,
    pub version: i64,
    pub title: String,
    pub borrowable: bool,
    pub available: bool,
    pub open_loan_id: Option<String>,
    pub active_reservation_id: Option<String>,
    pub held_for: Option<String>,
    #[serde(with = "serializer")]
    pub created_at: NaiveDateTime,
    #[serde(with = "serializer")]
    pub updated_at: NaiveDateTime,
}

impl Identifiable for ItemDto {
    fn id(&self) -> String {
        self.item_id.to_string()
    }

    fn version(&self) -> i64 {
        self.version
    }
}

impl From<&ItemEntity> for ItemDto {
    fn from(other: &ItemEntity) -> ItemDto {
        ItemDto {
            item_id: other.item_id.to_string(),
            version: other.version,
            title: other.title.to_string(),
            borrowable: other.borrowable,
            available: other.is_available(),
            open_loan_id: other.open_loan_id.clone(),
            active_reservation_id: other.active_reservation_id.clone(),
            held_for: other.held_for.clone(),
            created_at: other.created_at,
            updated_at: other.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use crate::items::domain::model::ItemEntity;
    use crate::items::dto::ItemDto;

    #[tokio::test]
    async fn test_should_derive_availability() {
        let now = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let mut item = ItemEntity::new("42", "Dune", true, now);
        assert!(ItemDto::from(&item).available);
        item.held_for = Some("r1".to_string());
        let dto = ItemDto::from(&item);
        assert!(!dto.available);
        assert_eq!(Some("r1".to_string()), dto.held_for);
    }
}
