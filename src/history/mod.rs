//! Cached, fetch-ahead listing of the machine's shot history.

mod cache;
pub(crate) mod commands;
mod config;
mod coordinator;
mod prefetch;
mod response;
mod service;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheStatus, Generation, InsertOutcome, ShotCache};
pub use config::HistoryConfig;
pub use coordinator::{FetchCoordinator, FetchRun};
pub use prefetch::PrefetchScheduler;
pub use response::ApiResponse;
pub use service::{RecentShots, ShotHistory};
