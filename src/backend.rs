//! HTTP boundary to the diagnosis backend.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::models::attachment::PendingAttachment;
use crate::models::message::ChatReply;

/// One chat turn as sent to the backend.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub session_id: String,
    /// `None` when the user sent no text.
    pub question: Option<String>,
    pub file: Option<PendingAttachment>,
}

impl ChatRequest {
    pub fn new(session_id: impl Into<String>, content: &str, file: Option<PendingAttachment>) -> Self {
        Self {
            session_id: session_id.into(),
            question: (!content.is_empty()).then(|| content.to_string()),
            file,
        }
    }
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Asks the backend for a new session identifier.
    async fn create_session(&self) -> AppResult<String>;

    async fn send(&self, request: ChatRequest) -> AppResult<ChatReply>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SessionBody {
    Bare(String),
    Wrapped { session_id: String },
}

pub struct HttpChatBackend {
    client: reqwest::Client,
    session_url: String,
    chat_url: String,
}

impl HttpChatBackend {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("HTTP client error: {e}")))?;

        Ok(Self {
            client,
            session_url: config.session_url(),
            chat_url: config.chat_url(),
        })
    }
}

async fn check_status(resp: reqwest::Response) -> AppResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let mut message = resp.text().await.unwrap_or_default();
    if message.len() > 200 {
        let mut cut = 200;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
    }
    if message.is_empty() {
        message = status.canonical_reason().unwrap_or("request failed").to_string();
    }
    Err(AppError::Backend {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn create_session(&self) -> AppResult<String> {
        log::debug!("Requesting new chat session: {}", self.session_url);
        let resp = self.client.get(&self.session_url).send().await?;
        let resp = check_status(resp).await?;

        let body: SessionBody = resp
            .json()
            .await
            .map_err(|e| AppError::Network(format!("Invalid session response: {e}")))?;

        let id = match body {
            SessionBody::Bare(id) | SessionBody::Wrapped { session_id: id } => id,
        };
        if id.trim().is_empty() {
            return Err(AppError::Network("Backend returned an empty session id".into()));
        }
        Ok(id)
    }

    async fn send(&self, request: ChatRequest) -> AppResult<ChatReply> {
        log::info!(
            "Posting chat turn: question_len={}, has_file={}",
            request.question.as_deref().map(str::len).unwrap_or(0),
            request.file.is_some()
        );

        let mut form = Form::new().text("session_id", request.session_id);
        if let Some(question) = request.question {
            form = form.text("question", question);
        }
        if let Some(file) = request.file {
            let part = Part::bytes(file.bytes)
                .file_name(file.file_name)
                .mime_str(&file.mime_type)?;
            form = form.part("file", part);
        }

        let resp = self.client.post(&self.chat_url).multipart(form).send().await?;
        let resp = check_status(resp).await?;

        resp.json::<ChatReply>()
            .await
            .map_err(|e| AppError::Network(format!("Invalid chat response: {e}")))
    }
}
