pub mod doctor;
pub mod enums;
pub mod patient;
pub mod prescription;

pub use doctor::*;
pub use enums::*;
pub use patient::*;
pub use prescription::*;
