use tauri::State;

use crate::models::{ShotDetail, ShotSummary};
use crate::AppState;

use super::ApiResponse;

// Shot lookups report failures inside the envelope, so the outer Result is
// always Ok. Tauri needs it for async commands that borrow state.

#[tauri::command]
pub async fn get_recent_shots(
    state: State<'_, AppState>,
    limit: Option<usize>,
    force_refresh: Option<bool>,
) -> Result<ApiResponse<Vec<ShotSummary>>, String> {
    let history = &state.history;
    let limit = limit.unwrap_or(history.config().page_size);
    Ok(history
        .get_recent_shots(limit, force_refresh.unwrap_or(false))
        .await)
}

#[tauri::command]
pub async fn get_shot_by_id(
    state: State<'_, AppState>,
    shot_id: u32,
) -> Result<ApiResponse<ShotDetail>, String> {
    Ok(state.history.get_shot_detail(shot_id).await)
}

#[tauri::command]
pub async fn get_latest_shot_id(state: State<'_, AppState>) -> Result<ApiResponse<u32>, String> {
    Ok(state.history.get_latest_id().await)
}
