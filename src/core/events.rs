use std::collections::HashMap;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::utils::date::serializer;

pub const LOAN_ISSUED: &str = "loan_issued";
pub const LOAN_RETURNED: &str = "loan_returned";
pub const RESERVATION_PLACED: &str = "reservation_placed";
pub const RESERVATION_PROMOTED: &str = "reservation_promoted";
pub const RESERVATION_CANCELLED: &str = "reservation_cancelled";
pub const RESERVATION_EXPIRED: &str = "reservation_expired";
pub const RESERVATION_COMPLETED: &str = "reservation_completed";
pub const INVENTORY_UPDATED: &str = "inventory_updated";

// every event name published by circulation, one topic each
pub const CIRCULATION_EVENTS: [&str; 8] = [LOAN_ISSUED, LOAN_RETURNED, RESERVATION_PLACED, RESERVATION_PROMOTED,
    RESERVATION_CANCELLED, RESERVATION_EXPIRED, RESERVATION_COMPLETED, INVENTORY_UPDATED];

// DomainEventType defines type of event for domain changes
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Copy)]
pub enum DomainEventType {
    Added,
    Updated,
    Deleted,
}

// DomainEvent abstracts domain event for circulation changes, published after commit
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct DomainEvent {
    pub event_id: String,
    pub name: String,
    pub group: String,
    pub key: String,
    pub kind: DomainEventType,
    pub metadata: HashMap<String, String>,
    pub json_data: String,
    #[serde(with = "serializer")]
    pub created_at: NaiveDateTime,
}

impl DomainEvent {
    pub fn added<T: Serialize>(name: &str, group: &str, key: &str, metadata: &HashMap<String, String>,
                               data: &T, now: NaiveDateTime) -> serde_json::Result<Self> {
        let json = serde_json::to_string(&data)?;
        Ok(Self::build(name, group, key, DomainEventType::Added, metadata, json, now))
    }

    pub fn updated<T: Serialize>(name: &str, group: &str, key: &str, metadata: &HashMap<String, String>,
                                 data: &T, now: NaiveDateTime) -> serde_json::Result<Self> {
        let json = serde_json::to_string(&data)?;
        Ok(Self::build(name, group, key, DomainEventType::Updated, metadata, json, now))
    }

    pub fn deleted<T: Serialize>(name: &str, group: &str, key: &str, metadata: &HashMap<String, String>,
                                 data: &T, now: NaiveDateTime) -> serde_json::Result<Self> {
        let json = serde_json::to_string(&data)?;
        Ok(Self::build(name, group, key, DomainEventType::Deleted, metadata, json, now))
    }

    fn build(name: &str, group: &str, key: &str, kind: DomainEventType, metadata: &HashMap<String, String>,
             json: String, now: NaiveDateTime) -> DomainEvent {
        DomainEvent {
            event_id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            group: group.to_string(),
            key: key.to_string(),
            kind,
            metadata: metadata.clone(),
            json_data: json,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use chrono::NaiveDate;
    use crate::core::events::{DomainEvent, DomainEventType};

    #[tokio::test]
    async fn test_should_build_added() {
        let now = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let data = HashMap::from([("a", 1), ("b", 2)]);
        let event = DomainEvent::added("name", "group", "key", &HashMap::from([("k".to_string(), "v".to_string())]), &data, now).expect("build event");
        assert_eq!("name", event.name.as_str());
        assert_eq!("key", event.key.as_str());
        assert_eq!(DomainEventType::Added, event.kind);
        assert_eq!(now, event.created_at);
    }

    #[tokio::test]
    async fn test_should_build_updated_and_deleted() {
        let now = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let updated = DomainEvent::updated("name", "group", "key", &HashMap::new(), &"x", now).expect("build event");
        assert_eq!(DomainEventType::Updated, updated.kind);
        let deleted = DomainEvent::deleted("name", "group", "key", &HashMap::new(), &"x", now).expect("build event");
        assert_eq!(DomainEventType::Deleted, deleted.kind);
        assert_ne!(updated.event_id, deleted.event_id);
    }

    #[tokio::test]
    async fn test_should_serialize_event() {
        let now = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let event = DomainEvent::added("name", "group", "key", &HashMap::new(), &1, now).expect("build event");
        let json = serde_json::to_string(&event).expect("serialize");
        let parsed: DomainEvent = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(event, parsed);
    }
}
