pub mod domain;
pub mod command;
pub mod controller;
pub mod dto;
pub mod factory;
