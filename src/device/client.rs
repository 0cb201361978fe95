use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;

use crate::models::ShotDetail;

use super::{convert, DeviceError, ShotFetcher};

pub const DEFAULT_DEVICE_URL: &str = "http://gaggiuino.local";

// Applies to connect and read of every single request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP client for a Gaggiuino machine.
///
/// Cloning is cheap and clones share one connection pool, so the foreground
/// and background fetch paths reuse the same keep-alive connections.
#[derive(Clone)]
pub struct GaggiuinoClient {
    http: Client,
    base_url: String,
}

impl GaggiuinoClient {
    pub fn new(base_url: &str) -> reqwest::Result<Self> {
        let http = Client::builder()
            .connect_timeout(REQUEST_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: normalize_base_url(base_url),
        })
    }

    /// Same connection pool, different machine.
    pub fn with_base_url(&self, base_url: &str) -> Self {
        Self {
            http: self.http.clone(),
            base_url: normalize_base_url(base_url),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_text(&self, path: &str) -> Result<String, DeviceError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {url}");

        let res = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| DeviceError::Unreachable {
                url: url.clone(),
                source,
            })?;

        let status = res.status();
        if !status.is_success() {
            return Err(DeviceError::HttpStatus { url, status });
        }

        res.text()
            .await
            .map_err(|source| DeviceError::Unreachable { url, source })
    }
}

#[async_trait]
impl ShotFetcher for GaggiuinoClient {
    async fn fetch_latest_id(&self) -> Result<u32, DeviceError> {
        let body = self.get_text("/api/shots/latest").await?;
        convert::parse_latest_id(&body)
    }

    async fn fetch_detail(&self, id: u32) -> Result<ShotDetail, DeviceError> {
        let body = self.get_text(&format!("/api/shots/{id}")).await?;
        convert::parse_shot(id, &body)
    }
}

/// Trims whitespace and trailing slashes; an empty address means the default
/// mDNS name of the machine.
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_DEVICE_URL.to_string()
    } else {
        trimmed.to_string()
    }
}
