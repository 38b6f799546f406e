use crate::error::AppResult;
use crate::models::connection::{ConnectionState, StatusIndicator};
use crate::state::AppState;

#[tauri::command]
pub async fn get_connection_status(state: tauri::State<'_, AppState>) -> AppResult<StatusIndicator> {
    state.conversation.indicator()
}

#[tauri::command]
pub async fn reconnect(state: tauri::State<'_, AppState>) -> AppResult<ConnectionState> {
    log::info!("reconnect requested");
    state.conversation.reconnect().await
}

#[tauri::command]
pub async fn clear_session(state: tauri::State<'_, AppState>) -> AppResult<()> {
    state.conversation.clear_session()
}
