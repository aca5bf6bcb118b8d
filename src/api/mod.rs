//! HTTP API.
//!
//! Exposes the prescription workflow, patient registry, doctor profile and
//! appointment desk as JSON endpoints under `/api/`. Every route except
//! the health check runs behind the operator identity middleware.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_server, ApiServer, ServerInfo};
pub use types::{ApiContext, OperatorContext};
