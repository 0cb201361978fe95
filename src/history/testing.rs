//! In-memory shot source for the history tests.

use std::{
    collections::{BTreeSet, HashMap},
    ops::RangeInclusive,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::sync::Semaphore;

use crate::device::{DeviceError, ShotFetcher};
use crate::models::{ShotDetail, ShotSummary};

use super::{HistoryConfig, PrefetchScheduler};

pub(crate) fn test_config() -> HistoryConfig {
    HistoryConfig {
        page_size: 12,
        failure_threshold: 25,
        yield_interval: Duration::ZERO,
    }
}

pub(crate) fn summary(id: u32) -> ShotSummary {
    detail(id).summary()
}

pub(crate) fn detail(id: u32) -> ShotDetail {
    ShotDetail {
        id,
        profile_name: format!("profile {id}"),
        captured_at: "Jan 01, 08:00".into(),
        final_weight_grams: 36.0,
        duration_formatted: "00m30s".into(),
        duration_secs: 30.0,
        target_temperature: Some(93.0),
        time_points: vec![0.0, 0.5],
        pressure: vec![0.0, 9.0],
        temperature: vec![93.0, 93.1],
        flow: vec![0.0, 2.0],
        weight: vec![0.0, 36.0],
        weight_flow: vec![0.0, 1.5],
        target_pressure: vec![9.0, 9.0],
        target_flow: vec![2.0, 2.0],
    }
}

/// Fake machine serving a fixed set of shot ids.
///
/// Ids outside the set answer 404; a missing latest id means the machine is
/// unreachable. With a gate attached, every detail request waits for a
/// permit first.
pub(crate) struct ScriptedFetcher {
    latest: Mutex<Option<u32>>,
    shots: Mutex<BTreeSet<u32>>,
    /// Requested id -> id written in the response body.
    reported_ids: Mutex<HashMap<u32, u32>>,
    calls: Mutex<Vec<u32>>,
    gate: Option<Arc<Semaphore>>,
    waiting: AtomicUsize,
}

impl ScriptedFetcher {
    pub(crate) fn new(latest: u32) -> Self {
        Self {
            latest: Mutex::new(Some(latest)),
            shots: Mutex::new(BTreeSet::new()),
            reported_ids: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            gate: None,
            waiting: AtomicUsize::new(0),
        }
    }

    pub(crate) fn offline() -> Self {
        let fetcher = Self::new(0);
        *fetcher.latest.lock().unwrap() = None;
        fetcher
    }

    pub(crate) fn with_shots(self, ids: RangeInclusive<u32>) -> Self {
        self.add_shots(ids);
        self
    }

    pub(crate) fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub(crate) fn add_shots(&self, ids: RangeInclusive<u32>) {
        self.shots.lock().unwrap().extend(ids);
    }

    /// Answers requests for `requested` with a shot claiming to be `reported`.
    pub(crate) fn misreport(&self, requested: u32, reported: u32) {
        self.reported_ids.lock().unwrap().insert(requested, reported);
    }

    /// Detail requests that have reached the gate, released or not.
    pub(crate) fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    pub(crate) fn set_latest(&self, latest: u32) {
        *self.latest.lock().unwrap() = Some(latest);
    }

    /// Detail requests in the order they were made.
    pub(crate) fn calls(&self) -> Vec<u32> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl ShotFetcher for ScriptedFetcher {
    async fn fetch_latest_id(&self) -> Result<u32, DeviceError> {
        let latest = *self.latest.lock().unwrap();
        latest.ok_or_else(|| DeviceError::HttpStatus {
            url: "http://test/api/shots/latest".into(),
            status: StatusCode::SERVICE_UNAVAILABLE,
        })
    }

    async fn fetch_detail(&self, id: u32) -> Result<ShotDetail, DeviceError> {
        if let Some(gate) = &self.gate {
            self.waiting.fetch_add(1, Ordering::SeqCst);
            let _permit = gate.acquire().await.unwrap();
        }
        self.calls.lock().unwrap().push(id);

        if self.shots.lock().unwrap().contains(&id) {
            let reported = self.reported_ids.lock().unwrap().get(&id).copied();
            Ok(detail(reported.unwrap_or(id)))
        } else {
            Err(DeviceError::HttpStatus {
                url: format!("http://test/api/shots/{id}"),
                status: StatusCode::NOT_FOUND,
            })
        }
    }
}

/// Waits until no background run is active.
pub(crate) async fn wait_idle(scheduler: &PrefetchScheduler) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while scheduler.is_active().await {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("background prefetch did not finish");
}
