pub mod device;
pub mod history;
pub mod models;
pub mod settings;
mod utils;

use std::sync::Arc;

use device::GaggiuinoClient;
use history::{
    commands::{get_latest_shot_id, get_recent_shots, get_shot_by_id},
    HistoryConfig, ShotHistory,
};
use log::info;
use settings::{SettingsStore, UserSettings};
use tauri::{Manager, State};

pub(crate) struct AppState {
    pub(crate) history: ShotHistory,
    /// Template for new machine addresses; clones share its connection pool.
    device: GaggiuinoClient,
    settings: SettingsStore,
}

#[tauri::command]
fn ping() -> bool {
    true
}

#[tauri::command]
fn load_user_settings(state: State<AppState>) -> Result<UserSettings, String> {
    Ok(state.settings.get())
}

#[tauri::command]
fn save_user_settings(
    settings: UserSettings,
    state: State<AppState>,
) -> Result<UserSettings, String> {
    state.settings.update(settings).map_err(|e| e.to_string())
}

#[tauri::command]
async fn update_gaggiuino_url(url: String, state: State<'_, AppState>) -> Result<String, String> {
    let client = state.device.with_base_url(&url);
    let base_url = client.base_url().to_string();

    state.history.update_source(Arc::new(client)).await;
    info!("Shot source switched to {base_url}");

    Ok(base_url)
}

fn debug_enabled() -> bool {
    std::env::var("SHOT_COMPARE_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    // Initialize logging (reads RUST_LOG env var)
    let default_level = if debug_enabled() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();

    info!("Shot Compare starting up...");

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(|app| {
            let result = (|| -> anyhow::Result<()> {
                let app_data_dir = app
                    .path()
                    .app_data_dir()
                    .map_err(|err| anyhow::anyhow!(err))?;
                std::fs::create_dir_all(&app_data_dir)?;

                let settings_path = app_data_dir.join("settings.json");
                let settings_store = SettingsStore::new(settings_path)?;

                let device = GaggiuinoClient::new(&settings_store.gaggiuino_url())?;
                info!("Using Gaggiuino at {}", device.base_url());

                let history = ShotHistory::new(Arc::new(device.clone()), HistoryConfig::default());

                app.manage(AppState {
                    history,
                    device,
                    settings: settings_store,
                });

                Ok(())
            })();

            result.map_err(|err| err.into())
        })
        .invoke_handler(tauri::generate_handler![
            get_recent_shots,
            get_shot_by_id,
            get_latest_shot_id,
            update_gaggiuino_url,
            load_user_settings,
            save_user_settings,
            ping,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
