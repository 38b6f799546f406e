//! Draft state of the chat input: text, at most one image, and the rules for
//! turning them into a send.

use std::sync::Arc;

use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::events::ChatEvents;
use crate::models::attachment::{is_image_mime, PendingAttachment};
use crate::models::notification::Notification;

/// What the composer hands over when the user submits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendEvent {
    pub text: String,
    pub attachment: Option<PendingAttachment>,
}

/// Serializable view of the draft for the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposerView {
    pub text: String,
    pub attachment: Option<PendingAttachment>,
    pub disabled: bool,
    pub can_submit: bool,
    /// Last page edit folded into `text`.
    pub revision: u64,
}

pub struct Composer {
    events: Arc<dyn ChatEvents>,
    text: String,
    attachment: Option<PendingAttachment>,
    disabled: bool,
    /// Highest page-side edit revision applied so far.
    revision: u64,
}

impl Composer {
    pub fn new(events: Arc<dyn ChatEvents>) -> Self {
        Self {
            events,
            text: String::new(),
            attachment: None,
            disabled: false,
            revision: 0,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn attachment(&self) -> Option<&PendingAttachment> {
        self.attachment.as_ref()
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Applies a text edit from the page. Edits arrive on independent tasks,
    /// so one older than the last applied revision is dropped. Returns
    /// whether the edit was applied.
    pub fn sync_text(&mut self, text: impl Into<String>, revision: u64) -> bool {
        if revision <= self.revision {
            log::debug!("Dropping stale draft revision {} (at {})", revision, self.revision);
            return false;
        }
        self.revision = revision;
        self.text = text.into();
        true
    }

    /// Appends dictated text, separated from any existing draft by a space.
    pub fn append_transcript(&mut self, transcript: &str) {
        if self.text.is_empty() {
            self.text = transcript.to_string();
        } else {
            self.text.push(' ');
            self.text.push_str(transcript);
        }
    }

    /// Rejects declared types outside `image/*` with a validation toast.
    pub fn check_type(&self, file_name: &str, mime_type: &str) -> AppResult<()> {
        if is_image_mime(mime_type) {
            return Ok(());
        }
        log::warn!("Rejected attachment {} with type {}", file_name, mime_type);
        self.events
            .notify(Notification::error("Hata", "Please select image file only"));
        Err(AppError::Validation(format!("{mime_type} is not an image")))
    }

    /// Accepts the attachment only when its declared type is an image.
    pub fn select_attachment(&mut self, attachment: PendingAttachment) -> AppResult<()> {
        self.check_type(&attachment.file_name, &attachment.mime_type)?;
        self.attachment = Some(attachment);
        Ok(())
    }

    pub fn remove_attachment(&mut self) {
        self.attachment = None;
    }

    fn can_submit(&self) -> bool {
        !self.disabled && (!self.text.trim().is_empty() || self.attachment.is_some())
    }

    /// Emits the draft and resets it. The draft is cleared whether or not the
    /// downstream send later succeeds.
    pub fn submit(&mut self) -> Option<SendEvent> {
        if !self.can_submit() {
            return None;
        }
        Some(SendEvent {
            text: std::mem::take(&mut self.text),
            attachment: self.attachment.take(),
        })
    }

    /// Keyboard handling for the text area: plain Enter submits, Shift+Enter
    /// inserts a newline on the page side.
    pub fn handle_key(&mut self, key: &str, shift: bool) -> Option<SendEvent> {
        if key == "Enter" && !shift {
            self.submit()
        } else {
            None
        }
    }

    pub fn view(&self) -> ComposerView {
        ComposerView {
            text: self.text.clone(),
            attachment: self.attachment.clone(),
            disabled: self.disabled,
            can_submit: self.can_submit(),
            revision: self.revision,
        }
    }
}
