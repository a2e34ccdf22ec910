use std::sync::Arc;

use crate::{backend::ImageBackend, metrics::AppMetrics};

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn ImageBackend>,
    pub metrics: Arc<AppMetrics>,
}

impl AppState {
    pub fn new(backend: Arc<dyn ImageBackend>) -> Self {
        Self {
            backend,
            metrics: Arc::new(AppMetrics::new()),
        }
    }
}
