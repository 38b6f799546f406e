use tauri::Emitter;

use crate::composer::ComposerView;
use crate::conversation::SendOutcome;
use crate::desktop::EVENT_COMPOSER;
use crate::error::AppResult;
use crate::models::attachment::PendingAttachment;
use crate::state::{AppState, DraftText};

fn publish(app: &tauri::AppHandle, state: &AppState) -> AppResult<ComposerView> {
    let view = state.composer_view()?;
    app.emit(EVENT_COMPOSER, &view).ok();
    Ok(view)
}

#[tauri::command]
pub async fn get_composer(state: tauri::State<'_, AppState>) -> AppResult<ComposerView> {
    state.composer_view()
}

/// Mirrors a textarea edit. Not published back to the page: the textarea is
/// the source of the text, and a late echo would overwrite newer typing.
#[tauri::command]
pub async fn update_draft(
    state: tauri::State<'_, AppState>,
    text: String,
    revision: u64,
) -> AppResult<ComposerView> {
    state.composer()?.sync_text(text, revision);
    state.composer_view()
}

#[tauri::command(rename_all = "camelCase")]
pub async fn attach_image(
    app: tauri::AppHandle,
    state: tauri::State<'_, AppState>,
    file_name: String,
    mime_type: String,
    data_url: String,
) -> AppResult<ComposerView> {
    log::info!("attach_image called: file={}, type={}", file_name, mime_type);
    {
        let mut composer = state.composer()?;
        composer.check_type(&file_name, &mime_type)?;
        let attachment = PendingAttachment::from_data_url(file_name, mime_type, &data_url)?;
        composer.select_attachment(attachment)?;
    }
    publish(&app, &state)
}

#[tauri::command]
pub async fn remove_attachment(
    app: tauri::AppHandle,
    state: tauri::State<'_, AppState>,
) -> AppResult<ComposerView> {
    state.composer()?.remove_attachment();
    publish(&app, &state)
}

/// Submits the draft through the conversation. Returns `None` when the draft
/// was empty or input is disabled.
#[tauri::command]
pub async fn submit_draft(
    app: tauri::AppHandle,
    state: tauri::State<'_, AppState>,
    draft: Option<DraftText>,
) -> AppResult<Option<SendOutcome>> {
    let draft = state.take_draft(None, draft)?;
    let sending = draft.is_some();
    if sending {
        publish(&app, &state)?;
    }
    let outcome = state.dispatch(draft).await;
    if sending {
        publish(&app, &state)?;
    }
    outcome
}

#[tauri::command]
pub async fn composer_key(
    app: tauri::AppHandle,
    state: tauri::State<'_, AppState>,
    key: String,
    shift: bool,
    draft: Option<DraftText>,
) -> AppResult<Option<SendOutcome>> {
    let draft = state.take_draft(Some((key.as_str(), shift)), draft)?;
    let sending = draft.is_some();
    if sending {
        publish(&app, &state)?;
    }
    let outcome = state.dispatch(draft).await;
    if sending {
        publish(&app, &state)?;
    }
    outcome
}
