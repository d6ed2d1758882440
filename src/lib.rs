pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod utils;

pub use error::types::*;

use std::sync::Arc;
use services::{HistoryStore, PriceCollector, QueryService};

/// Shared handles for the HTTP layer. The store is injected once at startup
/// and shared with the collector.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn HistoryStore>,
    pub query_service: Arc<QueryService>,
    pub collector: Option<Arc<PriceCollector>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn HistoryStore>,
        deviation_window: usize,
        collector: Option<Arc<PriceCollector>>,
    ) -> Self {
        let query_service = Arc::new(QueryService::with_window(store.clone(), deviation_window));
        Self {
            store,
            query_service,
            collector,
        }
    }
}
