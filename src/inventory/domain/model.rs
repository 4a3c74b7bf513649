use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use crate::core::domain::Identifiable;
use crate::core::library::{LibraryError, LibraryResult};
use crate::utils::date::serializer;

// InventoryCounterEntity tracks copies of an item at one location
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct InventoryCounterEntity {
    pub counter_id: String,
    pub version: i64,
    pub item_id: String,
    pub location_id: String,
    pub on_hand: i64,
    pub reserved: i64,
    #[serde(with = "serializer")]
    pub created_at: NaiveDateTime,
    #[serde(with = "serializer")]
    pub updated_at: NaiveDateTime,
}

impl InventoryCounterEntity {
    pub fn new(item_id: &str, location_id: &str, now: NaiveDateTime) -> Self {
        Self {
            counter_id: counter_id(item_id, location_id),
            version: 0,
            item_id: item_id.to_string(),
            location_id: location_id.to_string(),
            on_hand: 0,
            reserved: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn available(&self) -> i64 {
        self.on_hand - self.reserved
    }
}

const ID_SEPARATOR: char = '#';

pub fn counter_id(item_id: &str, location_id: &str) -> String {
    format!("{}{}{}", item_id, ID_SEPARATOR, location_id)
}

// Builds the counter id of caller supplied ids. The separator may not appear in either
// part, otherwise two pairs could share a counter.
pub fn checked_counter_id(item_id: &str, location_id: &str) -> LibraryResult<String> {
    for (name, value) in [("item_id", item_id), ("location_id", location_id)] {
        if value.is_empty() || value.contains(ID_SEPARATOR) {
            return Err(LibraryError::validation(
                format!("{} '{}' must be non-empty and may not contain '{}'", name, value, ID_SEPARATOR).as_str(),
                Some("400".to_string())));
        }
    }
    Ok(counter_id(item_id, location_id))
}

impl Identifiable for InventoryCounterEntity {
    fn id(&self) -> String {
        self.counter_id.to_string()
    }

    fn version(&self) -> i64 {
        self.version
    }
}
