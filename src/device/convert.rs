//! Conversion of raw device JSON into display units.
//!
//! The machine reports pressure, temperature, flow, weight, time and duration
//! as integers in tenths of their display unit.

use chrono::{Local, TimeZone};
use serde::Deserialize;
use serde_json::Value;
use std::fmt::Display;

use crate::models::ShotDetail;

use super::DeviceError;

const UNKNOWN_PROFILE: &str = "Unknown Profile";
const CAPTURED_AT_FORMAT: &str = "%b %d, %H:%M";

#[derive(Debug, Deserialize)]
pub(crate) struct RawShot {
    #[serde(default)]
    id: Option<u32>,
    timestamp: i64,
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    profile: Option<RawProfile>,
    #[serde(default)]
    datapoints: Option<RawDatapoints>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProfile {
    name: Option<String>,
    water_temperature: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawDatapoints {
    time_in_shot: Vec<f64>,
    pressure: Vec<f64>,
    temperature: Vec<f64>,
    pump_flow: Vec<f64>,
    shot_weight: Vec<f64>,
    weight_flow: Vec<f64>,
    target_pressure: Vec<f64>,
    target_pump_flow: Vec<f64>,
}

/// Parses the body of `/api/shots/latest`: `[{"lastShotId": 123}]`.
///
/// Some firmware versions send the id as a string.
pub fn parse_latest_id(body: &str) -> Result<u32, DeviceError> {
    let entries: Vec<Value> = serde_json::from_str(body)
        .map_err(|err| DeviceError::MalformedResponse(format!("latest shot id: {err}")))?;

    let value = entries
        .first()
        .and_then(|entry| entry.get("lastShotId"))
        .ok_or_else(|| DeviceError::MalformedResponse("missing lastShotId".into()))?;

    let id = match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    };

    id.and_then(|id| u32::try_from(id).ok())
        .ok_or_else(|| DeviceError::MalformedResponse(format!("invalid lastShotId {value}")))
}

/// Parses the body of `/api/shots/{id}`, formatting the capture time in the
/// local timezone.
pub fn parse_shot(requested_id: u32, body: &str) -> Result<ShotDetail, DeviceError> {
    let raw: RawShot = serde_json::from_str(body).map_err(|err| {
        DeviceError::MalformedResponse(format!("shot {requested_id}: {err}"))
    })?;
    detail_from_raw(requested_id, raw, &Local)
}

pub(crate) fn detail_from_raw<Tz>(
    requested_id: u32,
    raw: RawShot,
    tz: &Tz,
) -> Result<ShotDetail, DeviceError>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    if let Some(id) = raw.id.filter(|id| *id != requested_id) {
        return Err(DeviceError::MalformedResponse(format!(
            "asked for shot {requested_id}, got shot {id}"
        )));
    }

    let captured_at = tz
        .timestamp_opt(raw.timestamp, 0)
        .single()
        .map(|dt| dt.format(CAPTURED_AT_FORMAT).to_string())
        .ok_or_else(|| {
            DeviceError::MalformedResponse(format!(
                "shot {requested_id}: invalid timestamp {}",
                raw.timestamp
            ))
        })?;

    let profile = raw.profile.unwrap_or_default();
    let points = raw.datapoints.unwrap_or_default();

    let duration_secs = raw.duration / 10.0;
    let final_weight_grams = points.shot_weight.last().map(|w| w / 10.0).unwrap_or(0.0);

    Ok(ShotDetail {
        id: requested_id,
        profile_name: profile.name.unwrap_or_else(|| UNKNOWN_PROFILE.to_string()),
        captured_at,
        final_weight_grams,
        duration_formatted: format_duration(duration_secs),
        duration_secs,
        target_temperature: profile.water_temperature,
        time_points: tenths(&points.time_in_shot),
        pressure: tenths(&points.pressure),
        temperature: tenths(&points.temperature),
        flow: tenths(&points.pump_flow),
        weight: tenths(&points.shot_weight),
        weight_flow: tenths(&points.weight_flow),
        target_pressure: tenths(&points.target_pressure),
        target_flow: tenths(&points.target_pump_flow),
    })
}

fn tenths(values: &[f64]) -> Vec<f64> {
    values.iter().map(|v| v / 10.0).collect()
}

/// `35.4` -> `"00m35s"`. Halves round to even.
fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).round_ties_even() as u64;
    format!("{:02}m{:02}s", total / 60, total % 60)
}
