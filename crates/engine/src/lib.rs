//! Domain services: message persistence and the unique-visitor counter.

pub mod message;
pub mod store;
pub mod visit;
