//! Application state for the API server

use crate::MarketDataHub;
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned per request; only the `Arc` is copied.
#[derive(Clone)]
pub struct AppState {
    /// The hub every handler delegates to
    pub hub: Arc<MarketDataHub>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(hub: Arc<MarketDataHub>) -> Self {
        Self { hub }
    }
}
