//! Explicit fetch state with a single cached value.
//!
//! Reads are not reactive: a cached value stays until the owner
//! invalidates it after a write.

use std::fmt::Display;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum QueryState<T> {
    Loading,
    Ready(T),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct CachedQuery<T> {
    state: QueryState<T>,
}

impl<T> Default for CachedQuery<T> {
    fn default() -> Self {
        Self { state: QueryState::Loading }
    }
}

impl<T: Clone> CachedQuery<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &QueryState<T> {
        &self.state
    }

    /// Cached value when ready; otherwise runs `fetch` and records the result.
    /// A failed fetch is retried on the next call.
    pub fn get_or_fetch<E, F>(&mut self, fetch: F) -> Result<T, E>
    where
        E: Display,
        F: FnOnce() -> Result<T, E>,
    {
        if let QueryState::Ready(value) = &self.state {
            return Ok(value.clone());
        }
        self.refresh(fetch)
    }

    /// Always runs `fetch`.
    pub fn refresh<E, F>(&mut self, fetch: F) -> Result<T, E>
    where
        E: Display,
        F: FnOnce() -> Result<T, E>,
    {
        match fetch() {
            Ok(value) => {
                self.state = QueryState::Ready(value.clone());
                Ok(value)
            }
            Err(e) => {
                self.state = QueryState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    pub fn invalidate(&mut self) {
        self.state = QueryState::Loading;
    }
}
