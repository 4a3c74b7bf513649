pub mod core;
pub mod gateway;
pub mod utils;
pub mod items;
pub mod loans;
pub mod reservations;
pub mod inventory;
pub mod circulation;
