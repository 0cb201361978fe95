use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::device::ShotFetcher;

use super::{
    cache::{Generation, ShotCache},
    coordinator::FetchCoordinator,
    HistoryConfig,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

struct PrefetchTask {
    run_id: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    /// Flips to true once the run has written its last result.
    done: watch::Receiver<bool>,
}

/// Runs at most one background fetch-ahead at a time.
///
/// Results flow back only through the shared cache; nobody awaits the task.
#[derive(Clone)]
pub struct PrefetchScheduler {
    cache: ShotCache,
    config: HistoryConfig,
    slot: Arc<Mutex<Option<PrefetchTask>>>,
    next_run_id: Arc<AtomicU64>,
}

impl PrefetchScheduler {
    pub fn new(cache: ShotCache, config: HistoryConfig) -> Self {
        Self {
            cache,
            config,
            slot: Arc::new(Mutex::new(None)),
            next_run_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Starts fetching `batch_size` shots downwards from `start_id` in the
    /// background, on behalf of a caller that read the cache at `generation`
    /// using `fetcher`.
    ///
    /// Returns false without doing anything if a run is already in flight or
    /// the cache has been cleared since `generation` was taken.
    pub async fn schedule_from(
        &self,
        fetcher: Arc<dyn ShotFetcher>,
        generation: Generation,
        start_id: u32,
        batch_size: usize,
    ) -> bool {
        if start_id == 0 || batch_size == 0 {
            return false;
        }

        let mut slot = self.slot.lock().await;
        if slot.as_ref().is_some_and(|task| !task.handle.is_finished()) {
            log_debug!("prefetch already running; ignoring request from shot {}", start_id);
            return false;
        }

        if self.cache.generation().await != generation {
            log_debug!("cache cleared since shot {} was requested; not prefetching", start_id);
            return false;
        }

        let run_id = self.next_run_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let (done_tx, done) = watch::channel(false);

        let handle = tokio::spawn(prefetch_run(
            self.clone(),
            fetcher,
            run_id,
            generation,
            start_id,
            batch_size,
            cancel.clone(),
            done_tx,
        ));

        *slot = Some(PrefetchTask {
            run_id,
            cancel,
            handle,
            done,
        });
        true
    }

    /// Waits for the tracked run, if any, to finish writing to the cache.
    /// A run that was abandoned is not waited for.
    pub async fn wait_idle(&self) {
        let done = self
            .slot
            .lock()
            .await
            .as_ref()
            .filter(|task| !task.handle.is_finished())
            .map(|task| task.done.clone());

        if let Some(mut done) = done {
            // Err means the run was dropped without finishing, which is idle too.
            let _ = done.wait_for(|finished| *finished).await;
        }
    }

    pub async fn is_active(&self) -> bool {
        self.slot
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Stops tracking the current run and asks it to stop at its next step.
    /// Anything it still writes is discarded by the cache generation check.
    pub async fn abandon(&self) {
        if let Some(task) = self.slot.lock().await.take() {
            log_debug!("abandoning prefetch run {}", task.run_id);
            task.cancel.cancel();
        }
    }

    async fn finish(&self, run_id: u64) {
        let mut slot = self.slot.lock().await;
        if slot.as_ref().is_some_and(|task| task.run_id == run_id) {
            *slot = None;
        }
    }
}

async fn prefetch_run(
    scheduler: PrefetchScheduler,
    fetcher: Arc<dyn ShotFetcher>,
    run_id: u64,
    generation: Generation,
    start_id: u32,
    batch_size: usize,
    cancel: CancellationToken,
    done: watch::Sender<bool>,
) {
    log_info!("prefetching up to {} shots from {}", batch_size, start_id);

    let run = FetchCoordinator::new(fetcher.as_ref(), &scheduler.cache, &scheduler.config)
        .run(generation, start_id, batch_size, &cancel)
        .await;

    if run.exhausted && scheduler.cache.mark_exhausted(generation).await {
        log_info!("prefetch reached the oldest shot");
    }

    log_info!("prefetch from {} finished with {} shots", start_id, run.fetched);
    let _ = done.send(true);
    scheduler.finish(run_id).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::testing::{test_config, wait_idle, ScriptedFetcher};
    use tokio::sync::Semaphore;

    #[tokio::test]
    async fn second_request_while_running_is_ignored() {
        let gate = Arc::new(Semaphore::new(0));
        let fetcher = Arc::new(
            ScriptedFetcher::new(50)
                .with_shots(1..=50)
                .gated(gate.clone()),
        );
        let cache = ShotCache::new();
        let scheduler = PrefetchScheduler::new(cache.clone(), test_config());
        let generation = cache.generation().await;

        assert!(scheduler.schedule_from(fetcher.clone(), generation, 50, 5).await);
        assert!(!scheduler.schedule_from(fetcher.clone(), generation, 50, 5).await);
        assert!(!scheduler.schedule_from(fetcher.clone(), generation, 30, 5).await);
        assert!(scheduler.is_active().await);

        gate.add_permits(100);
        wait_idle(&scheduler).await;

        assert_eq!(fetcher.calls(), vec![50, 49, 48, 47, 46]);
        assert_eq!(cache.size().await, 5);
    }

    #[tokio::test]
    async fn a_new_run_can_start_after_completion() {
        let fetcher = Arc::new(ScriptedFetcher::new(20).with_shots(1..=20));
        let cache = ShotCache::new();
        let scheduler = PrefetchScheduler::new(cache.clone(), test_config());
        let generation = cache.generation().await;

        assert!(scheduler.schedule_from(fetcher.clone(), generation, 20, 4).await);
        wait_idle(&scheduler).await;
        assert!(scheduler.schedule_from(fetcher.clone(), generation, 16, 4).await);
        wait_idle(&scheduler).await;

        assert_eq!(cache.size().await, 8);
        assert_eq!(cache.oldest_id().await, Some(13));
        assert!(!cache.is_exhausted().await);
    }

    #[tokio::test]
    async fn exhaustion_is_recorded_in_the_cache() {
        let fetcher = Arc::new(ScriptedFetcher::new(4).with_shots(1..=4));
        let cache = ShotCache::new();
        let scheduler = PrefetchScheduler::new(cache.clone(), test_config());
        let generation = cache.generation().await;

        assert!(scheduler.schedule_from(fetcher, generation, 4, 12).await);
        wait_idle(&scheduler).await;

        assert_eq!(cache.size().await, 4);
        assert!(cache.is_exhausted().await);
    }

    #[tokio::test]
    async fn abandoned_run_leaves_a_cleared_cache_alone() {
        let gate = Arc::new(Semaphore::new(0));
        let fetcher = Arc::new(
            ScriptedFetcher::new(30)
                .with_shots(1..=30)
                .gated(gate.clone()),
        );
        let cache = ShotCache::new();
        let scheduler = PrefetchScheduler::new(cache.clone(), test_config());
        let generation = cache.generation().await;

        assert!(scheduler.schedule_from(fetcher.clone(), generation, 30, 10).await);
        // let the task reach its first request
        tokio::task::yield_now().await;

        cache.clear().await;
        scheduler.abandon().await;
        assert!(!scheduler.is_active().await);

        gate.add_permits(100);
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }

        assert_eq!(cache.size().await, 0);
        assert!(fetcher.calls().len() <= 1);
    }

    #[tokio::test]
    async fn zero_start_id_is_ignored() {
        let fetcher = Arc::new(ScriptedFetcher::new(0));
        let cache = ShotCache::new();
        let generation = cache.generation().await;
        let scheduler = PrefetchScheduler::new(cache, test_config());

        assert!(!scheduler.schedule_from(fetcher, generation, 0, 12).await);
        assert!(!scheduler.is_active().await);
    }

    #[tokio::test]
    async fn request_from_before_a_clear_is_refused() {
        let fetcher = Arc::new(ScriptedFetcher::new(40).with_shots(1..=40));
        let cache = ShotCache::new();
        let scheduler = PrefetchScheduler::new(cache.clone(), test_config());
        let stale = cache.generation().await;
        cache.clear().await;

        assert!(!scheduler.schedule_from(fetcher.clone(), stale, 40, 5).await);
        assert!(!scheduler.is_active().await);
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn wait_idle_returns_after_the_run_has_written() {
        let fetcher = Arc::new(ScriptedFetcher::new(20).with_shots(1..=20));
        let cache = ShotCache::new();
        let scheduler = PrefetchScheduler::new(cache.clone(), test_config());
        let generation = cache.generation().await;

        assert!(scheduler.schedule_from(fetcher, generation, 20, 6).await);
        scheduler.wait_idle().await;

        assert_eq!(cache.size().await, 6);
        // nothing tracked: returns immediately
        scheduler.wait_idle().await;
    }
}
