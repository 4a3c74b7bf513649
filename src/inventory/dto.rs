use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use crate::core::domain::Identifiable;
use crate::inventory::domain::model::InventoryCounterEntity;
use crate::utils::date::serializer;

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct InventoryCounterDto {
    pub counter_id: String,
    pub version: i64,
    pub item_id: String,
    pub location_id: String,
    pub on_hand: i64,
    pub reserved: i64,
    pub available: i64,
    #[serde(with = "serializer")]
    pub updated_at: NaiveDateTime,
}

impl Identifiable for InventoryCounterDto {
    fn id(&self) -> String {
        self.counter_id.to_string()
    }

    fn version(&self) -> i64 {
        self.version
    }
}

impl From<&InventoryCounterEntity> for InventoryCounterDto {
    fn from(other: &InventoryCounterEntity) -> InventoryCounterDto {
        InventoryCounterDto {
            counter_id: other.counter_id.to_string(),
            version: other.version,
            item_id: other.item_id.to_string(),
            location_id: other.location_id.to_string(),
            on_hand: other.on_hand,
            reserved: other.reserved,
            available: other.available(),
            updated_at: other.updated_at,
        }
    }
}
