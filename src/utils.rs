pub mod date;
pub mod ddb;
