pub mod config;
pub mod logic;
pub mod model;
pub mod store;

// Export logic types
pub use logic::{
    AssignmentService, InFlightRegistry, ListView, MutationContext, MutationCoordinator, MutationReport,
    NotificationDurations, Notifier, OptimisticTxn, RetryPolicy, SelectionStore, SharedState, StateCell,
};

// Export all model types
pub use model::*;

// Export store types
pub use store::{HttpRelationStore, LocationStore, MemoryRelationStore, RelationBoard, RelationStore, Store};

/// Initialise logging the way the binary does; safe to call more than once
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .filter_module("reqwest", log::LevelFilter::Warn)
        .filter_module("hyper", log::LevelFilter::Warn)
        .try_init();
}
