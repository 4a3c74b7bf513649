use crate::core::domain::Identifiable;

pub mod model;

// Item is the circulation view of a catalog entry.
pub trait Item: Identifiable {
    fn is_available(&self) -> bool;
    fn is_on_loan(&self) -> bool;
    fn is_held(&self) -> bool;
}
