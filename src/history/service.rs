use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::device::{DeviceError, ShotFetcher};
use crate::models::{ShotDetail, ShotSummary};

use super::{
    cache::ShotCache, coordinator::FetchCoordinator, prefetch::PrefetchScheduler, ApiResponse,
    HistoryConfig,
};

/// One page of the recents list.
#[derive(Debug, Clone)]
pub struct RecentShots {
    pub shots: Vec<ShotSummary>,
    pub all_loaded: bool,
}

/// Entry point for everything the frontend asks about shots.
///
/// Summaries are cached and fetched ahead in the background; details and
/// the latest id always go straight to the machine.
pub struct ShotHistory {
    fetcher: RwLock<Arc<dyn ShotFetcher>>,
    cache: ShotCache,
    prefetch: PrefetchScheduler,
    config: HistoryConfig,
}

impl ShotHistory {
    pub fn new(fetcher: Arc<dyn ShotFetcher>, config: HistoryConfig) -> Self {
        let cache = ShotCache::new();
        Self {
            fetcher: RwLock::new(fetcher),
            prefetch: PrefetchScheduler::new(cache.clone(), config.clone()),
            cache,
            config,
        }
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    async fn source(&self) -> Arc<dyn ShotFetcher> {
        self.fetcher.read().await.clone()
    }

    pub async fn get_recent_shots(
        &self,
        limit: usize,
        force_refresh: bool,
    ) -> ApiResponse<Vec<ShotSummary>> {
        match self.recent_shots(limit, force_refresh).await {
            Ok(page) => ApiResponse::ok(page.shots).with_all_loaded(page.all_loaded),
            Err(err) => {
                error!("Failed to load recent shots: {err}");
                let all_loaded = self.cache.is_exhausted().await;
                ApiResponse::failure(err).with_all_loaded(all_loaded)
            }
        }
    }

    /// Returns the `limit` newest shots, fetching synchronously only as many
    /// as the cache is short of, then queues the next page in the background.
    ///
    /// Fails only when the cache is empty and the machine cannot report its
    /// latest shot id.
    pub async fn recent_shots(
        &self,
        limit: usize,
        force_refresh: bool,
    ) -> Result<RecentShots, DeviceError> {
        if force_refresh {
            self.invalidate().await;
        }

        // Generation before source: `update_source` swaps the source first,
        // so a fresh generation always comes with the fresh source.
        let generation = self.cache.generation().await;
        let fetcher = self.source().await;

        let mut status = self.cache.status().await;
        if limit > status.size && !status.exhausted && self.prefetch.is_active().await {
            // The running prefetch walks the same ids a top-up would.
            self.prefetch.wait_idle().await;
            status = self.cache.status().await;
        }

        let needed = limit.saturating_sub(status.size);
        if needed > 0 && !status.exhausted {
            let start_id = match status.oldest_id {
                Some(oldest) => oldest.saturating_sub(1),
                None => fetcher.fetch_latest_id().await?,
            };

            if start_id > 0 {
                let run = FetchCoordinator::new(fetcher.as_ref(), &self.cache, &self.config)
                    .run(generation, start_id, needed, &CancellationToken::new())
                    .await;
                if run.exhausted {
                    self.cache.mark_exhausted(generation).await;
                }
            } else {
                self.cache.mark_exhausted(generation).await;
            }
        }

        let shots = self.cache.snapshot(limit).await;
        let all_loaded = self.cache.is_exhausted().await;

        if !all_loaded {
            if let Some(lowest) = shots.last().map(|shot| shot.id) {
                if lowest > 1 {
                    self.prefetch
                        .schedule_from(fetcher, generation, lowest - 1, self.config.page_size)
                        .await;
                }
            }
        }

        Ok(RecentShots { shots, all_loaded })
    }

    /// Full time series for one shot. Never cached.
    pub async fn get_shot_detail(&self, id: u32) -> ApiResponse<ShotDetail> {
        match self.source().await.fetch_detail(id).await {
            Ok(detail) if detail.id != id => {
                warn!("Asked for shot {id}, machine answered with shot {}", detail.id);
                ApiResponse::failure(DeviceError::MalformedResponse(format!(
                    "asked for shot {id}, got shot {}",
                    detail.id
                )))
            }
            Ok(detail) => ApiResponse::ok(detail),
            Err(err) => {
                warn!("Failed to fetch shot {id}: {err}");
                ApiResponse::failure(err)
            }
        }
    }

    pub async fn get_latest_id(&self) -> ApiResponse<u32> {
        match self.source().await.fetch_latest_id().await {
            Ok(id) => ApiResponse::ok(id),
            Err(err) => {
                warn!("Failed to fetch latest shot id: {err}");
                ApiResponse::failure(err)
            }
        }
    }

    /// Forgets every cached summary and any background run in flight.
    pub async fn invalidate(&self) {
        self.cache.clear().await;
        self.prefetch.abandon().await;
        info!("Shot history cache invalidated");
    }

    /// Points the history at another machine and starts over.
    pub async fn update_source(&self, fetcher: Arc<dyn ShotFetcher>) {
        *self.fetcher.write().await = fetcher;
        self.invalidate().await;
    }
}
