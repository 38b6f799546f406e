use std::collections::HashMap;

use crate::db::settings_repo;
use crate::error::{AppError, AppResult};
use crate::models::settings::{API_URL_KEY, SESSION_ID_KEY};
use crate::state::AppState;

#[tauri::command]
pub async fn get_settings(
    state: tauri::State<'_, AppState>,
) -> AppResult<HashMap<String, String>> {
    let db = state.db.clone();
    tokio::task::spawn_blocking(move || {
        let settings = settings_repo::get_all_settings(&db)?;
        Ok(settings.into_iter().map(|s| (s.key, s.value)).collect())
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

/// Stores a setting. `api_url` takes effect on the next start; the session id
/// is owned by the conversation and cannot be written here.
#[tauri::command]
pub async fn update_settings(
    state: tauri::State<'_, AppState>,
    key: String,
    value: String,
) -> AppResult<()> {
    if key == SESSION_ID_KEY {
        return Err(AppError::InvalidRequest(format!(
            "{SESSION_ID_KEY} is managed by the chat session"
        )));
    }
    if key == API_URL_KEY && !(value.starts_with("http://") || value.starts_with("https://")) {
        return Err(AppError::Validation(format!("{API_URL_KEY} must be an http(s) URL")));
    }
    let db = state.db.clone();
    tokio::task::spawn_blocking(move || settings_repo::set_setting(&db, &key, &value))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
}
