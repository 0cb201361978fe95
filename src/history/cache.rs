use std::{collections::BTreeMap, sync::Arc};

use tokio::sync::Mutex;

use crate::models::ShotSummary;

/// Identifies which cache contents a fetch run was started against.
///
/// Every wholesale clear starts a new generation; writes tagged with an older
/// one are dropped, so a run abandoned by `invalidate` can never repopulate
/// the fresh cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Added,
    Duplicate,
    Stale,
}

/// Consistent view of the cache bookkeeping, taken under one lock.
#[derive(Debug, Clone, Copy)]
pub struct CacheStatus {
    pub size: usize,
    pub oldest_id: Option<u32>,
    pub exhausted: bool,
    pub generation: Generation,
}

#[derive(Default)]
struct CacheState {
    entries: BTreeMap<u32, ShotSummary>,
    /// No history exists below the oldest entry. Only `clear` resets it.
    exhausted: bool,
    generation: u64,
}

/// Ordered, de-duplicated store of shot summaries shared by the foreground
/// and background fetch paths.
///
/// The lock is only held for the duration of each call and never across a
/// network request.
#[derive(Clone, Default)]
pub struct ShotCache {
    inner: Arc<Mutex<CacheState>>,
}

impl ShotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn generation(&self) -> Generation {
        Generation(self.inner.lock().await.generation)
    }

    pub async fn status(&self) -> CacheStatus {
        let state = self.inner.lock().await;
        CacheStatus {
            size: state.entries.len(),
            oldest_id: state.entries.keys().next().copied(),
            exhausted: state.exhausted,
            generation: Generation(state.generation),
        }
    }

    /// Adds `summary` unless its id is already cached or the cache has been
    /// cleared since `generation` was taken.
    pub async fn insert(&self, generation: Generation, summary: ShotSummary) -> InsertOutcome {
        let mut state = self.inner.lock().await;
        if state.generation != generation.0 {
            return InsertOutcome::Stale;
        }
        if state.entries.contains_key(&summary.id) {
            return InsertOutcome::Duplicate;
        }
        state.entries.insert(summary.id, summary);
        InsertOutcome::Added
    }

    /// Up to `limit` summaries, newest first.
    pub async fn snapshot(&self, limit: usize) -> Vec<ShotSummary> {
        let state = self.inner.lock().await;
        state.entries.values().rev().take(limit).cloned().collect()
    }

    pub async fn oldest_id(&self) -> Option<u32> {
        self.inner.lock().await.entries.keys().next().copied()
    }

    pub async fn size(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_exhausted(&self) -> bool {
        self.inner.lock().await.exhausted
    }

    /// Returns false when the mark was dropped because the cache was cleared
    /// after `generation` was taken.
    pub async fn mark_exhausted(&self, generation: Generation) -> bool {
        let mut state = self.inner.lock().await;
        if state.generation != generation.0 {
            return false;
        }
        state.exhausted = true;
        true
    }

    /// Drops every entry, resets exhaustion and starts a new generation.
    pub async fn clear(&self) -> Generation {
        let mut state = self.inner.lock().await;
        state.entries.clear();
        state.exhausted = false;
        state.generation = state.generation.wrapping_add(1);
        Generation(state.generation)
    }
}
