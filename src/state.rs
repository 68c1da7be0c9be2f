//! Shared application state for the HTTP surface.

use crate::service::PgStore;
use std::sync::Arc;

/// Cloned into every handler; the store itself is shared.
pub struct AppState<S = PgStore> {
    pub store: Arc<S>,
}

impl<S> AppState<S> {
    pub fn new(store: Arc<S>) -> Self {
        AppState { store }
    }
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        AppState {
            store: Arc::clone(&self.store),
        }
    }
}
