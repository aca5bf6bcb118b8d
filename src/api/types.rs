//! Shared types for the API layer.

use std::sync::Arc;

use crate::api::error::ApiError;
use crate::core_state::CoreState;

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }

    /// Run blocking work (SQLite, storage and relay clients, PDF rendering)
    /// off the async executor.
    pub async fn blocking<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&CoreState) -> Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        let core = self.core.clone();
        tokio::task::spawn_blocking(move || f(&core))
            .await
            .map_err(|e| ApiError::Internal(format!("blocking task failed: {e}")))?
    }
}

/// Operator identity, injected into request extensions by the operator
/// middleware from headers set by the upstream identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorContext {
    pub operator_id: String,
    pub operator_name: Option<String>,
}
