pub mod assignments;
pub mod inflight;
pub mod list_view;
pub mod notify;
pub mod optimistic;
pub mod retry;
pub mod selection;
pub mod state;

pub use assignments::*;
pub use inflight::*;
pub use list_view::*;
pub use notify::*;
pub use optimistic::*;
pub use retry::{execute, execute_observed, BackoffPolicy, Retryable, RetryPolicy};
pub use selection::*;
pub use state::*;
