use tauri::Emitter;

use crate::desktop::{WebviewSpeechEngine, EVENT_COMPOSER, EVENT_VOICE_STATE};
use crate::error::AppResult;
use crate::state::{AppState, VoiceEvent};
use crate::voice::{SpeechCapability, VoiceState};

fn publish(app: &tauri::AppHandle, state: &AppState) -> AppResult<VoiceState> {
    let voice = state.voice_state()?;
    app.emit(EVENT_VOICE_STATE, voice).ok();
    Ok(voice)
}

/// Called by the page on load (and whenever it recreates its recognizer) to
/// report whether the webview exposes a speech recognition API.
#[tauri::command]
pub async fn voice_register(
    app: tauri::AppHandle,
    state: tauri::State<'_, AppState>,
    available: bool,
) -> AppResult<VoiceState> {
    log::info!("voice_register: available={}", available);
    let capability = if available {
        SpeechCapability::Available(Box::new(WebviewSpeechEngine::new(app.clone())))
    } else {
        SpeechCapability::Unavailable
    };
    state.voice()?.replace_engine(capability);
    publish(&app, &state)
}

#[tauri::command]
pub async fn voice_toggle(
    app: tauri::AppHandle,
    state: tauri::State<'_, AppState>,
) -> AppResult<VoiceState> {
    state.voice()?.toggle();
    publish(&app, &state)
}

#[tauri::command]
pub async fn voice_event(
    app: tauri::AppHandle,
    state: tauri::State<'_, AppState>,
    event: VoiceEvent,
) -> AppResult<VoiceState> {
    if state.handle_voice_event(event)?.is_some() {
        app.emit(EVENT_COMPOSER, state.composer_view()?).ok();
    }
    publish(&app, &state)
}
