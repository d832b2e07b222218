use std::sync::Arc;

use dpp_engine::EngineStatus;
use dpp_store::DocumentStore;
use tokio::sync::watch;

/// Shared handles for request handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    /// Live status of the background engine, when one runs in this process.
    pub engine: Option<watch::Receiver<EngineStatus>>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            engine: None,
        }
    }

    pub fn with_engine(mut self, status: watch::Receiver<EngineStatus>) -> Self {
        self.engine = Some(status);
        self
    }

    pub fn engine_status(&self) -> Option<EngineStatus> {
        self.engine.as_ref().map(|rx| rx.borrow().clone())
    }
}
