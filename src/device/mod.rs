//! Access to the espresso machine's shot-history API.

mod client;
pub mod convert;

pub use client::{normalize_base_url, GaggiuinoClient, DEFAULT_DEVICE_URL};

use async_trait::async_trait;
use thiserror::Error;

use crate::models::ShotDetail;

/// The device could not produce usable data for a request.
///
/// Every variant is recoverable from the caller's point of view: the history
/// coordinator treats a failed id as "no data here" and moves on.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("could not reach the machine at {url}: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("machine answered {status} for {url}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("unexpected response from the machine: {0}")]
    MalformedResponse(String),
}

/// Source of shot records.
///
/// The device can only hand out one shot per request plus the id of the most
/// recent one; everything else is built on top of these two calls.
#[async_trait]
pub trait ShotFetcher: Send + Sync + 'static {
    async fn fetch_latest_id(&self) -> Result<u32, DeviceError>;

    async fn fetch_detail(&self, id: u32) -> Result<ShotDetail, DeviceError>;
}
