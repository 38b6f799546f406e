use std::sync::{Arc, Mutex, MutexGuard};

use serde::Deserialize;

use crate::backend::{ChatBackend, HttpChatBackend};
use crate::composer::{Composer, ComposerView, SendEvent};
use crate::config::AppConfig;
use crate::conversation::{Conversation, SendOutcome};
use crate::db::DbHandle;
use crate::error::{AppError, AppResult};
use crate::events::ChatEvents;
use crate::session::SettingsSessionStore;
use crate::voice::{RecognitionResult, SpeechCapability, VoiceInput, VoiceState};

/// Engine callbacks forwarded from the page's speech API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum VoiceEvent {
    Start,
    Result { results: Vec<RecognitionResult> },
    Error { code: String },
    /// `recognition.start()` threw on the page.
    StartFailed {
        #[serde(default)]
        reason: String,
    },
    End,
}

/// The textarea contents at the moment of a send, tagged with the page's
/// edit revision.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DraftText {
    pub text: String,
    pub revision: u64,
}

/// Everything one chat window needs, shared between command handlers.
pub struct AppState {
    /// SQLite database connection
    pub db: DbHandle,
    pub config: AppConfig,
    pub conversation: Arc<Conversation>,
    pub composer: Arc<Mutex<Composer>>,
    pub voice: Arc<Mutex<VoiceInput>>,
}

impl AppState {
    /// Wires the HTTP backend and the settings-backed session store.
    pub fn new(
        db: DbHandle,
        config: AppConfig,
        events: Arc<dyn ChatEvents>,
        speech: SpeechCapability,
    ) -> AppResult<Self> {
        let backend: Arc<dyn ChatBackend> = Arc::new(HttpChatBackend::new(&config)?);
        Ok(Self::with_backend(db, config, backend, events, speech))
    }

    pub fn with_backend(
        db: DbHandle,
        config: AppConfig,
        backend: Arc<dyn ChatBackend>,
        events: Arc<dyn ChatEvents>,
        speech: SpeechCapability,
    ) -> Self {
        let store = Arc::new(SettingsSessionStore::new(db.clone()));
        let conversation = Arc::new(Conversation::new(backend, store, events.clone()));
        let composer = Arc::new(Mutex::new(Composer::new(events.clone())));
        let voice = Arc::new(Mutex::new(VoiceInput::new(
            speech,
            events,
            config.speech_locale.clone(),
        )));
        Self {
            db,
            config,
            conversation,
            composer,
            voice,
        }
    }

    pub fn composer(&self) -> AppResult<MutexGuard<'_, Composer>> {
        self.composer
            .lock()
            .map_err(|e| AppError::Internal(format!("composer state poisoned: {e}")))
    }

    pub fn voice(&self) -> AppResult<MutexGuard<'_, VoiceInput>> {
        self.voice
            .lock()
            .map_err(|e| AppError::Internal(format!("voice state poisoned: {e}")))
    }

    /// Composer view with its `disabled` flag synced to the conversation.
    pub fn composer_view(&self) -> AppResult<ComposerView> {
        let disabled = self.conversation.input_disabled();
        let mut composer = self.composer()?;
        composer.set_disabled(disabled);
        Ok(composer.view())
    }

    /// Takes the draft out of the composer, if it is submittable right now.
    /// `draft` carries the page's current text, applied under the same lock
    /// as the submit so no out-of-order edit can land in between.
    pub fn take_draft(
        &self,
        key: Option<(&str, bool)>,
        draft: Option<DraftText>,
    ) -> AppResult<Option<SendEvent>> {
        let disabled = self.conversation.input_disabled();
        let mut composer = self.composer()?;
        composer.set_disabled(disabled);
        if let Some(draft) = draft {
            composer.sync_text(draft.text, draft.revision);
        }
        Ok(match key {
            Some((key, shift)) => composer.handle_key(key, shift),
            None => composer.submit(),
        })
    }

    /// Sends what the composer emitted. `None` when nothing was emitted.
    pub async fn dispatch(&self, event: Option<SendEvent>) -> AppResult<Option<SendOutcome>> {
        let Some(event) = event else {
            return Ok(None);
        };
        let outcome = self
            .conversation
            .send_message(event.text, event.attachment)
            .await?;
        Ok(Some(outcome))
    }

    /// Applies an engine event. Returns the utterance that was appended to
    /// the draft, if any.
    pub fn handle_voice_event(&self, event: VoiceEvent) -> AppResult<Option<String>> {
        let mut voice = self.voice()?;
        match event {
            VoiceEvent::Start => voice.on_start(),
            VoiceEvent::End => voice.on_end(),
            VoiceEvent::Error { code } => voice.on_error(&code),
            VoiceEvent::StartFailed { reason } => voice.on_start_failed(&reason),
            VoiceEvent::Result { results } => {
                if let Some(text) = voice.on_result(&results) {
                    drop(voice);
                    self.composer()?.append_transcript(&text);
                    return Ok(Some(text));
                }
            }
        }
        Ok(None)
    }

    pub fn voice_state(&self) -> AppResult<VoiceState> {
        Ok(self.voice()?.state())
    }
}
