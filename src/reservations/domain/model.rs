use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::core::domain::Identifiable;
use crate::core::library::ReservationStatus;
use crate::utils::date::{opt_serializer, serializer};

// ReservationEntity abstracts a hold placed on an item that is currently unavailable
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ReservationEntity {
    pub reservation_id: String,
    pub version: i64,
    pub branch_id: String,
    pub item_id: String,
    pub borrower_id: String,
    // per-item insertion order, breaks ties between equal request times
    pub sequence: i64,
    pub reservation_status: ReservationStatus,
    #[serde(with = "serializer")]
    pub reservation_at: NaiveDateTime,
    #[serde(with = "opt_serializer", default)]
    pub ready_at: Option<NaiveDateTime>,
    #[serde(with = "opt_serializer", default)]
    pub expires_at: Option<NaiveDateTime>,
    #[serde(with = "opt_serializer", default)]
    pub cancelled_at: Option<NaiveDateTime>,
    #[serde(with = "opt_serializer", default)]
    pub completed_at: Option<NaiveDateTime>,
    // loan that fulfilled this reservation
    pub loan_id: Option<String>,
    #[serde(with = "serializer")]
    pub created_at: NaiveDateTime,
    #[serde(with = "serializer")]
    pub updated_at: NaiveDateTime,
}

impl ReservationEntity {
    pub fn new(branch_id: &str, item_id: &str, borrower_id: &str, sequence: i64, now: NaiveDateTime) -> Self {
        Self {
            reservation_id: Uuid::new_v4().to_string(),
            version: 0,
            branch_id: branch_id.to_string(),
            item_id: item_id.to_string(),
            borrower_id: borrower_id.to_string(),
            sequence,
            reservation_status: ReservationStatus::Reserved,
            reservation_at: now,
            ready_at: None,
            expires_at: None,
            cancelled_at: None,
            completed_at: None,
            loan_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        self.expires_at.map_or(false, |expires_at| expires_at <= now)
    }

    // Reserved or Wait and still inside its expiry
    pub fn is_active(&self, now: NaiveDateTime) -> bool {
        self.reservation_status.holds_slot() && !self.is_expired(now)
    }
}

impl Identifiable for ReservationEntity {
    fn id(&self) -> String {
        self.reservation_id.to_string()
    }

    fn version(&self) -> i64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};
    use crate::core::library::ReservationStatus;
    use crate::reservations::domain::model::ReservationEntity;

    #[tokio::test]
    async fn test_should_build_reservation() {
        let now = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let mut reservation = ReservationEntity::new("main", "42", "9", 1, now);
        assert_eq!(ReservationStatus::Reserved, reservation.reservation_status);
        assert!(reservation.is_active(now));

        reservation.expires_at = Some(now + Duration::days(3));
        assert!(reservation.is_active(now + Duration::days(2)));
        assert!(!reservation.is_active(now + Duration::days(3)));

        reservation.expires_at = None;
        reservation.reservation_status = ReservationStatus::Cancelled;
        assert!(!reservation.is_active(now));
    }
}
