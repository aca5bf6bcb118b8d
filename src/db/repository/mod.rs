//! Repository layer: entity-scoped database operations.

mod doctor;
mod patient;
mod prescription;

pub use doctor::*;
pub use patient::*;
pub use prescription::*;
