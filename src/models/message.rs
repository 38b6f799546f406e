use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const GREETING_ID: &str = "greeting";
pub const GREETING_TEXT: &str = "Hello! How can I help you? You can upload an image for leaf disease detection or ask general questions.";
pub const FALLBACK_REPLY: &str = "Sorry, an error occurred. Please try again or come back later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Disease prediction the backend attaches to replies for image uploads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: String,
    pub probability: f64,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>, image: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::User,
            content: content.into(),
            image,
            audio_url: None,
            classification: None,
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::Assistant,
            content: content.into(),
            image: None,
            audio_url: None,
            classification: None,
            timestamp: Utc::now(),
        }
    }

    pub fn greeting() -> Self {
        Self {
            id: GREETING_ID.into(),
            ..Self::assistant(GREETING_TEXT)
        }
    }

    pub fn fallback() -> Self {
        Self::assistant(FALLBACK_REPLY)
    }

    pub fn with_classification(mut self, classification: Option<Classification>) -> Self {
        self.classification = classification;
        self
    }

    /// Local wall-clock time as shown under each bubble, e.g. `14:05`.
    pub fn display_time(&self) -> String {
        self.timestamp
            .with_timezone(&chrono::Local)
            .format("%H:%M")
            .to_string()
    }
}

/// Body of a successful `POST /chatbot/` call.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatReply {
    pub response: String,
    #[serde(default)]
    pub classification: Option<Classification>,
}
