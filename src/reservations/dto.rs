use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use crate::core::domain::Identifiable;
use crate::core::library::ReservationStatus;
use crate::reservations::domain::model::ReservationEntity;
use crate::utils::date::{opt_serializer, serializer};

// ReservationDto abstracts a hold as returned to callers
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ReservationDto {
    pub reservation_id: String,
    pub version: i64,
    pub branch_id: String,
    pub item_id: String,
    pub borrower_id: String,
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
    pub loan_id: Option<String>,
    #[serde(with = "serializer")]
    pub created_at: NaiveDateTime,
    #[serde(with = "serializer")]
    pub updated_at: NaiveDateTime,
}

impl Identifiable for ReservationDto {
    fn id(&self) -> String {
        self.reservation_id.to_string()
    }

    fn version(&self) -> i64 {
        self.version
    }
}

impl From<&ReservationEntity> for ReservationDto {
    fn from(other: &ReservationEntity) -> ReservationDto {
        ReservationDto {
            reservation_id: other.reservation_id.to_string(),
            version: other.version,
            branch_id: other.branch_id.to_string(),
            item_id: other.item_id.to_string(),
            borrower_id: other.borrower_id.to_string(),
            sequence: other.sequence,
            reservation_status: other.reservation_status,
            reservation_at: other.reservation_at,
            ready_at: other.ready_at,
            expires_at: other.expires_at,
            cancelled_at: other.cancelled_at,
            completed_at: other.completed_at,
            loan_id: other.loan_id.clone(),
            created_at: other.created_at,
            updated_at: other.updated_at,
        }
    }
}

impl From<&ReservationDto> for ReservationEntity {
    fn from(other: &ReservationDto) -> ReservationEntity {
        ReservationEntity {
            reservation_id: other.reservation_id.to_string(),
            version: other.version,
            branch_id: other.branch_id.to_string(),
            item_id: other.item_id.to_string(),
            borrower_id: other.borrower_id.to_string(),
            sequence: other.sequence,
            reservation_status: other.reservation_status,
            reservation_at: other.reservation_at,
            ready_at: other.ready_at,
            expires_at: other.expires_at,
            cancelled_at: other.cancelled_at,
            completed_at: other.completed_at,
            loan_id: other.loan_id.clone(),
            created_at: other.created_at,
            updated_at: other.updated_at,
        }
    }
}
