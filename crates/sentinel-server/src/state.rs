//! Shared application state, cloned into every axum handler via the
//! `State` extractor.

use sentinel_core::Sentinel;
use std::sync::Arc;

pub struct AppState {
    pub sentinel: Sentinel,
}

impl AppState {
    pub fn new(sentinel: Sentinel) -> Arc<Self> {
        Arc::new(AppState { sentinel })
    }
}
