pub mod collector;
pub mod memory_store;
pub mod price_feed;
pub mod price_storage;
pub mod query_service;
pub mod stats_engine;

pub use collector::{CollectorStatus, CycleReport, OverlapPolicy, PriceCollector, SchedulerState};
pub use memory_store::InMemoryHistoryStore;
pub use price_feed::{CoinGeckoClient, QuoteMap, QuoteSource};
pub use price_storage::{HistoryStore, PriceStorageService};
pub use query_service::{CoinStatsResponse, DeviationResponse, QueryService};
pub use stats_engine::{compute_deviation, DeviationStats};
