use serde::{Deserialize, Serialize};
use crate::items::dto::ItemDto;
use crate::loans::dto::LoanDto;
use crate::reservations::dto::ReservationDto;

// ReturnDto is the outcome of closing a loan: the closed loan, the hold the item was
// passed to (if any) and the item as left by the return.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ReturnDto {
    pub loan: LoanDto,
    pub overdue_days: i64,
    pub promoted: Option<ReservationDto>,
    pub expired: Vec<ReservationDto>,
    pub item: ItemDto,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct CancelDto {
    pub reservation: ReservationDto,
    pub promoted: Option<ReservationDto>,
    pub item: ItemDto,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct IssueDto {
    pub loan: LoanDto,
    pub reservation: ReservationDto,
}

// SweepDto lists what one expiry sweep changed; items that could not be settled are
// reported in `failed` and picked up again by the next sweep.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct SweepDto {
    pub expired: Vec<ReservationDto>,
    pub promoted: Vec<ReservationDto>,
    pub failed: Vec<String>,
}
