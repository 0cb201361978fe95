//! Shot records as shown to the frontend.
//!
//! `ShotDetail` is produced by `device::convert`; the history cache only ever
//! stores the `ShotSummary` projection of it.

use serde::{Deserialize, Serialize};

/// Minimal fields of a shot needed for the recents list and favorites.
///
/// Two summaries are equal when they describe the same shot id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShotSummary {
    pub id: u32,
    pub profile_name: String,
    pub captured_at: String,
    pub final_weight_grams: f64,
    pub duration_formatted: String,
}

impl PartialEq for ShotSummary {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ShotSummary {}

/// Full time-series record of one shot, already converted to display units.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShotDetail {
    pub id: u32,
    pub profile_name: String,
    pub captured_at: String,
    pub final_weight_grams: f64,
    pub duration_formatted: String,
    /// Shot duration in seconds.
    pub duration_secs: f64,
    pub target_temperature: Option<f64>,
    /// Time axis in seconds; every series below is sampled on it.
    pub time_points: Vec<f64>,
    pub pressure: Vec<f64>,
    pub temperature: Vec<f64>,
    pub flow: Vec<f64>,
    pub weight: Vec<f64>,
    pub weight_flow: Vec<f64>,
    pub target_pressure: Vec<f64>,
    pub target_flow: Vec<f64>,
}

impl ShotDetail {
    pub fn summary(&self) -> ShotSummary {
        ShotSummary {
            id: self.id,
            profile_name: self.profile_name.clone(),
            captured_at: self.captured_at.clone(),
            final_weight_grams: self.final_weight_grams,
            duration_formatted: self.duration_formatted.clone(),
        }
    }
}
