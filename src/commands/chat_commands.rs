use serde::Deserialize;

use crate::conversation::{ConversationSnapshot, SendOutcome};
use crate::error::AppResult;
use crate::models::attachment::PendingAttachment;
use crate::models::connection::ConnectionState;
use crate::state::AppState;

/// An image as read by the page's `FileReader`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentPayload {
    pub file_name: String,
    pub mime_type: String,
    pub data_url: String,
}

#[tauri::command]
pub async fn initialize_chat(state: tauri::State<'_, AppState>) -> AppResult<ConnectionState> {
    state.conversation.initialize().await
}

#[tauri::command]
pub async fn get_conversation(state: tauri::State<'_, AppState>) -> AppResult<ConversationSnapshot> {
    state.conversation.snapshot()
}

/// Sends a turn directly, bypassing the stored draft.
#[tauri::command]
pub async fn send_message(
    state: tauri::State<'_, AppState>,
    content: String,
    attachment: Option<AttachmentPayload>,
) -> AppResult<Option<SendOutcome>> {
    log::info!("send_message called: content_len={}", content.len());

    let attachment = match attachment {
        Some(a) => {
            state.composer()?.check_type(&a.file_name, &a.mime_type)?;
            Some(PendingAttachment::from_data_url(a.file_name, a.mime_type, &a.data_url)?)
        }
        None => None,
    };

    if content.trim().is_empty() && attachment.is_none() {
        return Ok(None);
    }

    state.conversation.send_message(content, attachment).await.map(Some)
}

#[tauri::command]
pub async fn cancel_send(state: tauri::State<'_, AppState>) -> AppResult<bool> {
    state.conversation.cancel_send()
}
