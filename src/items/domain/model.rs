use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use crate::core::domain::Identifiable;
use crate::items::domain::Item;
use crate::utils::date::serializer;

// ItemEntity is the circulation state of one borrowable catalog item. Its version is the
// per-item concurrency token: every unit of work that changes a loan or reservation of
// the item rewrites this row, so two writers on the same item can never both commit.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ItemEntity {
    pub item_id: String,
    pub version: i64,
    pub title: String,
    // catalog flag; a non-borrowable item never circulates
    pub borrowable: bool,
    // the single open-loan slot
    pub open_loan_id: Option<String>,
    // the single active-reservation slot (Reserved or Wait)
    pub active_reservation_id: Option<String>,
    // reservation in Wait the item is bound to until pickup or expiry
    pub held_for: Option<String>,
    pub reservation_seq: i64,
    #[serde(with = "serializer")]
    pub created_at: NaiveDateTime,
    #[serde(with = "serializer")]
    pub updated_at: NaiveDateTime,
}

impl ItemEntity {
    pub fn new(item_id: &str, title: &str, borrowable: bool, now: NaiveDateTime) -> Self {
        Self {
            item_id: item_id.to_string(),
            version: 0,
            title: title.to_string(),
            borrowable,
            open_loan_id: None,
            active_reservation_id: None,
            held_for: None,
            reservation_seq: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn next_reservation_seq(&mut self) -> i64 {
        self.reservation_seq += 1;
        self.reservation_seq
    }
}

impl Identifiable for ItemEntity {
    fn id(&self) -> String {
        self.item_id.to_string()
    }

    fn version(&self) -> i64 {
        self.version
    }
}

impl Item for ItemEntity {
    fn is_available(&self) -> bool {
        self.borrowable && !self.is_on_loan() && !self.is_held()
    }

    fn is_on_loan(&self) -> bool {
        self.open_loan_id.is_some()
    }

    fn is_held(&self) -> bool {
        self.held_for.is_some()
    }
}
