use std::sync::Arc;

use crate::store::Store;

/// Shared application dependencies, injected at wiring time and cloned into
/// every endpoint closure. Nothing here is mutable after startup.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}
