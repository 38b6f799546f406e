//! Bridges between the core chat types and the Tauri webview.

use serde::Serialize;
use tauri::{AppHandle, Emitter};

use crate::error::{AppError, AppResult};
use crate::events::ChatEvents;
use crate::models::connection::ConnectionState;
use crate::models::message::Message;
use crate::models::notification::Notification;
use crate::voice::SpeechEngine;

pub const EVENT_MESSAGE: &str = "chat:message";
pub const EVENT_NOTIFICATION: &str = "chat:notification";
pub const EVENT_CONNECTION: &str = "chat:connection";
pub const EVENT_PROCESSING: &str = "chat:processing";
pub const EVENT_COMPOSER: &str = "chat:composer";
pub const EVENT_VOICE_CONTROL: &str = "voice:control";
pub const EVENT_VOICE_STATE: &str = "voice:state";

/// Forwards conversation events to the main window.
pub struct TauriEvents {
    app: AppHandle,
}

impl TauriEvents {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }

    fn emit<S: Serialize + Clone>(&self, event: &str, payload: S) {
        if let Err(e) = self.app.emit(event, payload) {
            log::warn!("Failed to emit {}: {}", event, e);
        }
    }
}

impl ChatEvents for TauriEvents {
    fn notify(&self, notification: Notification) {
        self.emit(EVENT_NOTIFICATION, notification);
    }

    fn message_appended(&self, message: &Message) {
        self.emit(EVENT_MESSAGE, message.clone());
    }

    fn connection_changed(&self, state: ConnectionState, session_id: Option<&str>) {
        self.emit(EVENT_CONNECTION, state.indicator(session_id));
    }

    fn processing_changed(&self, processing: bool) {
        self.emit(EVENT_PROCESSING, processing);
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
enum VoiceControl {
    Start { locale: String },
    Stop,
}

/// Drives the page's `SpeechRecognition` object. Engine callbacks come back
/// through the `voice_event` command.
pub struct WebviewSpeechEngine {
    app: AppHandle,
}

impl WebviewSpeechEngine {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl SpeechEngine for WebviewSpeechEngine {
    fn start(&mut self, locale: &str) -> AppResult<()> {
        self.app
            .emit(
                EVENT_VOICE_CONTROL,
                VoiceControl::Start {
                    locale: locale.to_string(),
                },
            )
            .map_err(|e| AppError::Internal(format!("voice start failed: {e}")))
    }

    fn stop(&mut self) {
        if let Err(e) = self.app.emit(EVENT_VOICE_CONTROL, VoiceControl::Stop) {
            log::warn!("Failed to stop speech recognition: {}", e);
        }
    }
}
