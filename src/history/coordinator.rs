use tokio_util::sync::CancellationToken;

use crate::device::ShotFetcher;

use super::{
    cache::{Generation, InsertOutcome, ShotCache},
    HistoryConfig,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Result of one descending fetch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FetchRun {
    /// Ids that produced a shot, including ones that were already cached.
    pub fetched: usize,
    /// The run walked past the oldest shot the machine has.
    pub exhausted: bool,
}

/// Walks shot ids downwards, one request at a time, filling the cache.
pub struct FetchCoordinator<'a> {
    fetcher: &'a dyn ShotFetcher,
    cache: &'a ShotCache,
    config: &'a HistoryConfig,
}

impl<'a> FetchCoordinator<'a> {
    pub fn new(fetcher: &'a dyn ShotFetcher, cache: &'a ShotCache, config: &'a HistoryConfig) -> Self {
        Self {
            fetcher,
            cache,
            config,
        }
    }

    /// Fetches up to `count` shots starting at `start_id` and moving towards
    /// id 1.
    ///
    /// A failed id is logged and skipped, and so is a shot whose body names a
    /// different id than the one requested. `failure_threshold` failures in a
    /// row end the run as exhausted, as does reaching id 0. The run stops
    /// without reporting exhaustion if `cancel` fires or the cache is
    /// cleared underneath it.
    pub async fn run(
        &self,
        generation: Generation,
        start_id: u32,
        count: usize,
        cancel: &CancellationToken,
    ) -> FetchRun {
        let mut current_id = start_id;
        let mut fetched = 0usize;
        let mut consecutive_failures = 0u32;

        while current_id > 0 && fetched < count {
            if cancel.is_cancelled() {
                log_debug!("fetch run cancelled at shot {}", current_id);
                return FetchRun {
                    fetched,
                    exhausted: false,
                };
            }

            let fetched_detail = match self.fetcher.fetch_detail(current_id).await {
                Ok(detail) if detail.id != current_id => Err(format!(
                    "machine answered with shot {} instead",
                    detail.id
                )),
                Ok(detail) => Ok(detail),
                Err(err) => Err(err.to_string()),
            };

            match fetched_detail {
                Ok(detail) => {
                    consecutive_failures = 0;
                    match self.cache.insert(generation, detail.summary()).await {
                        InsertOutcome::Added => {}
                        InsertOutcome::Duplicate => {
                            log_debug!("shot {} already cached", current_id);
                        }
                        InsertOutcome::Stale => {
                            log_debug!("cache cleared during fetch run; stopping at shot {}", current_id);
                            return FetchRun {
                                fetched,
                                exhausted: false,
                            };
                        }
                    }
                    fetched += 1;
                }
                Err(err) => {
                    consecutive_failures += 1;
                    log_warn!("skipping shot {}: {}", current_id, err);

                    if consecutive_failures >= self.config.failure_threshold {
                        log_info!(
                            "{} consecutive misses ending at shot {}; treating history as exhausted",
                            consecutive_failures,
                            current_id
                        );
                        return FetchRun {
                            fetched,
                            exhausted: true,
                        };
                    }
                }
            }

            current_id -= 1;
            self.pause().await;
        }

        FetchRun {
            fetched,
            exhausted: current_id == 0,
        }
    }

    async fn pause(&self) {
        if self.config.yield_interval.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.config.yield_interval).await;
        }
    }
}
