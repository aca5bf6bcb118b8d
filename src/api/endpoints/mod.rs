//! API endpoint handlers.
//!
//! Handlers stay thin: they extract the operator, hop onto the blocking
//! pool and call into the domain modules.

pub mod appointments;
pub mod drafts;
pub mod health;
pub mod patients;
pub mod prescriptions;
pub mod profile;
