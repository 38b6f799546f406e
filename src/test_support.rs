use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::backend::{ChatBackend, ChatRequest};
use crate::error::{AppError, AppResult};
use crate::events::ChatEvents;
use crate::models::connection::ConnectionState;
use crate::models::message::{ChatReply, Message};
use crate::models::notification::Notification;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Default)]
pub struct RecordingEvents {
    pub notifications: Mutex<Vec<Notification>>,
    pub messages: Mutex<Vec<Message>>,
    pub connection: Mutex<Vec<ConnectionState>>,
    pub processing: Mutex<Vec<bool>>,
}

impl RecordingEvents {
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<Notification> {
        self.notifications().into_iter().filter(|n| n.is_error()).collect()
    }

    pub fn connection(&self) -> Vec<ConnectionState> {
        self.connection.lock().unwrap().clone()
    }
}

impl ChatEvents for RecordingEvents {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }

    fn message_appended(&self, message: &Message) {
        self.messages.lock().unwrap().push(message.clone());
    }

    fn connection_changed(&self, state: ConnectionState, _session_id: Option<&str>) {
        self.connection.lock().unwrap().push(state);
    }

    fn processing_changed(&self, processing: bool) {
        self.processing.lock().unwrap().push(processing);
    }
}

/// Backend double answering from queued results. Empty queues answer with a
/// default session id or an echo of the question.
#[derive(Default)]
pub struct ScriptedBackend {
    pub sessions: Mutex<VecDeque<AppResult<String>>>,
    pub replies: Mutex<VecDeque<AppResult<ChatReply>>>,
    pub session_calls: AtomicUsize,
    pub requests: Mutex<Vec<ChatRequest>>,
    /// When set, `send` waits for a permit before answering.
    pub gate: Option<Arc<Notify>>,
}

impl ScriptedBackend {
    pub fn with_session(id: &str) -> Self {
        let backend = Self::default();
        backend.sessions.lock().unwrap().push_back(Ok(id.to_string()));
        backend
    }

    pub fn failing_session() -> Self {
        let backend = Self::default();
        backend.sessions.lock().unwrap().push_back(Err(AppError::Backend {
            status: 500,
            message: "Internal Server Error".into(),
        }));
        backend
    }

    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn push_reply(&self, reply: AppResult<ChatReply>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn session_calls(&self) -> usize {
        self.session_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn create_session(&self) -> AppResult<String> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.sessions.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok("session-default".into()))
    }

    async fn send(&self, request: ChatRequest) -> AppResult<ChatReply> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| {
            Ok(ChatReply {
                response: format!("echo: {}", request.question.unwrap_or_default()),
                classification: None,
            })
        })
    }
}
