//! Dictation support. The recognition engine itself lives outside the crate
//! (the webview's speech API on desktop); this module owns the listening state
//! and turns engine events into transcripts and notifications.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::events::ChatEvents;
use crate::models::notification::Notification;

/// Error code engines report when listening was stopped on purpose.
pub const ABORTED: &str = "aborted";

pub trait SpeechEngine: Send {
    fn start(&mut self, locale: &str) -> AppResult<()>;
    fn stop(&mut self);
}

pub enum SpeechCapability {
    Available(Box<dyn SpeechEngine>),
    Unavailable,
}

impl SpeechCapability {
    pub fn is_available(&self) -> bool {
        matches!(self, SpeechCapability::Available(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionResult {
    pub transcript: String,
    pub is_final: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceState {
    pub available: bool,
    pub listening: bool,
}

pub struct VoiceInput {
    capability: SpeechCapability,
    events: Arc<dyn ChatEvents>,
    locale: String,
    listening: bool,
}

impl VoiceInput {
    pub fn new(capability: SpeechCapability, events: Arc<dyn ChatEvents>, locale: impl Into<String>) -> Self {
        Self {
            capability,
            events,
            locale: locale.into(),
            listening: false,
        }
    }

    pub fn state(&self) -> VoiceState {
        VoiceState {
            available: self.capability.is_available(),
            listening: self.listening,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Starts or stops listening. Inert when no engine is available.
    pub fn toggle(&mut self) {
        let SpeechCapability::Available(engine) = &mut self.capability else {
            log::debug!("Voice toggle ignored: speech recognition unavailable");
            return;
        };

        if self.listening {
            engine.stop();
            return;
        }

        if let Err(e) = engine.start(&self.locale) {
            self.on_start_failed(&e.to_string());
        }
    }

    /// The engine refused to start, either synchronously or as reported back
    /// by the page after `recognition.start()` threw.
    pub fn on_start_failed(&mut self, reason: &str) {
        log::error!("Speech recognition failed to start: {}", reason);
        self.listening = false;
        self.events.notify(Notification::error(
            "Initialization Error",
            "Speech recognition failed to initialize.",
        ));
    }

    pub fn on_start(&mut self) {
        self.listening = true;
        self.events
            .notify(Notification::info("Listening...", "Please speak now."));
    }

    /// Joins the transcripts seen so far and returns the utterance once the
    /// engine marks the latest result final.
    pub fn on_result(&mut self, results: &[RecognitionResult]) -> Option<String> {
        let last = results.last()?;
        let transcript: String = results.iter().map(|r| r.transcript.as_str()).collect();
        if last.is_final {
            log::debug!("Final transcript: {} chars", transcript.len());
            Some(transcript)
        } else {
            None
        }
    }

    /// Listening state is left to `on_end`, which engines fire after errors.
    pub fn on_error(&mut self, code: &str) {
        if code == ABORTED {
            return;
        }
        log::warn!("Speech recognition error: {}", code);
        self.events.notify(Notification::error(
            "Speech Recognition Error",
            format!("Error: {code}"),
        ));
    }

    pub fn on_end(&mut self) {
        self.listening = false;
    }

    /// Swaps in a new engine, stopping the old one first.
    pub fn replace_engine(&mut self, capability: SpeechCapability) {
        if let SpeechCapability::Available(engine) = &mut self.capability {
            engine.stop();
        }
        self.capability = capability;
        self.listening = false;
    }
}

impl Drop for VoiceInput {
    fn drop(&mut self) {
        if let SpeechCapability::Available(engine) = &mut self.capability {
            if self.listening {
                engine.stop();
            }
        }
    }
}
