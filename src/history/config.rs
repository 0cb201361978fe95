use std::time::Duration;

/// Tunables for the shot history cache.
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Shots requested per background page; the frontend pages by the same amount.
    pub page_size: usize,

    /// Consecutive failed ids after which there is assumed to be no older history.
    /// A handful of deleted shots must not trip this.
    pub failure_threshold: u32,

    /// Pause after every id of a fetch run. Zero only yields to the scheduler.
    pub yield_interval: Duration,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            page_size: 12,
            failure_threshold: 25,
            yield_interval: Duration::from_millis(10),
        }
    }
}
