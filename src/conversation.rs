//! Conversation orchestration: session acquisition, the message list and the
//! send/receive cycle. This is the only place that talks to the backend.
//!
//! State lives behind a plain mutex that is never held across an `.await`, so
//! readers (the page, the status badge) always see the optimistic user message
//! while a request is in flight.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::backend::{ChatBackend, ChatRequest};
use crate::error::{AppError, AppResult};
use crate::events::ChatEvents;
use crate::models::attachment::PendingAttachment;
use crate::models::connection::{ConnectionState, StatusIndicator};
use crate::models::message::Message;
use crate::models::notification::Notification;
use crate::session::{SessionContext, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Acquisition {
    NotStarted,
    Running,
    Finished,
}

/// The single send slot. `seq` identifies which request owns it.
struct InFlight {
    seq: u64,
    cancel: CancellationToken,
}

struct Inner {
    messages: Vec<Message>,
    session: SessionContext,
    acquisition: Acquisition,
    in_flight: Option<InFlight>,
    next_seq: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "camelCase")]
pub enum SendOutcome {
    /// The backend answered; carries the appended assistant message.
    Replied(Message),
    /// The request failed; carries the appended apology message.
    Failed(Message),
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSnapshot {
    pub messages: Vec<Message>,
    pub connection: ConnectionState,
    pub session_id: Option<String>,
    pub processing: bool,
    pub input_disabled: bool,
    pub indicator: StatusIndicator,
}

pub struct Conversation {
    backend: Arc<dyn ChatBackend>,
    events: Arc<dyn ChatEvents>,
    inner: Mutex<Inner>,
}

impl Conversation {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        store: Arc<dyn SessionStore>,
        events: Arc<dyn ChatEvents>,
    ) -> Self {
        Self {
            backend,
            events,
            inner: Mutex::new(Inner {
                messages: vec![Message::greeting()],
                session: SessionContext::new(store),
                acquisition: Acquisition::NotStarted,
                in_flight: None,
                next_seq: 1,
            }),
        }
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| AppError::Internal(format!("conversation state poisoned: {e}")))
    }

    /// Runs session acquisition the first time it is called. Later calls
    /// report the current state without touching the store or the network.
    pub async fn initialize(&self) -> AppResult<ConnectionState> {
        {
            let inner = self.lock()?;
            if inner.acquisition != Acquisition::NotStarted {
                return Ok(inner.session.state());
            }
        }
        self.acquire().await
    }

    /// Re-runs session acquisition on explicit user request.
    pub async fn reconnect(&self) -> AppResult<ConnectionState> {
        self.acquire().await
    }

    async fn acquire(&self) -> AppResult<ConnectionState> {
        let stored = {
            let mut inner = self.lock()?;
            if inner.acquisition == Acquisition::Running {
                return Err(AppError::AcquisitionInProgress);
            }
            inner.acquisition = Acquisition::Running;
            inner.session.begin();
            inner.session.load()
        };
        self.events.connection_changed(ConnectionState::Connecting, None);

        if let Some(id) = stored {
            log::info!("Using stored session id: {}", id);
            self.lock()?.acquisition = Acquisition::Finished;
            self.events.connection_changed(ConnectionState::Connected, Some(&id));
            return Ok(ConnectionState::Connected);
        }

        let result = self.backend.create_session().await;

        let mut inner = self.lock()?;
        inner.acquisition = Acquisition::Finished;
        match result {
            Ok(id) => {
                log::info!("Started new session: {}", id);
                inner.session.create(id.clone());
                drop(inner);
                self.events.connection_changed(ConnectionState::Connected, Some(&id));
                self.events.notify(Notification::info(
                    "Connection established",
                    "A new session has been started.",
                ));
                Ok(ConnectionState::Connected)
            }
            Err(e) => {
                log::error!("Connection error: {}", e);
                inner.session.fail();
                drop(inner);
                self.events.connection_changed(ConnectionState::Disconnected, None);
                self.events.notify(Notification::error(
                    "Connection Error",
                    "Could not connect to backend API. Please make sure it is working.",
                ));
                Ok(ConnectionState::Disconnected)
            }
        }
    }

    /// Forgets the session id, both in memory and in the store. A send still
    /// in flight belongs to the old session: it is cancelled and its slot
    /// released, so its reply is never appended.
    pub fn clear_session(&self) -> AppResult<()> {
        let released = {
            let mut inner = self.lock()?;
            if inner.acquisition == Acquisition::Running {
                return Err(AppError::AcquisitionInProgress);
            }
            inner.session.clear()?;
            inner.in_flight.take()
        };
        log::info!("Session cleared");
        if let Some(flight) = released {
            log::info!("Abandoning request #{} of the cleared session", flight.seq);
            flight.cancel.cancel();
            self.events.processing_changed(false);
        }
        self.events.connection_changed(ConnectionState::Disconnected, None);
        Ok(())
    }

    /// Sends one chat turn. The user message is appended before the request
    /// goes out; backend failures are absorbed into an apology message.
    pub async fn send_message(
        &self,
        content: String,
        attachment: Option<PendingAttachment>,
    ) -> AppResult<SendOutcome> {
        let (request, seq, cancel, user_msg) = {
            let mut inner = self.lock()?;

            let Some(session_id) = inner.session.session_id().map(str::to_string) else {
                drop(inner);
                log::warn!("send_message rejected: no session id");
                self.events.notify(Notification::error(
                    "Error",
                    "Session ID not found. Refresh the page.",
                ));
                return Err(AppError::NoSession);
            };

            if inner.in_flight.is_some() {
                drop(inner);
                log::warn!("send_message rejected: another send is in flight");
                self.events.notify(Notification::error(
                    "Error",
                    "A message is already being processed. Please wait.",
                ));
                return Err(AppError::SendInProgress);
            }

            let seq = inner.next_seq;
            inner.next_seq += 1;
            let cancel = CancellationToken::new();
            inner.in_flight = Some(InFlight {
                seq,
                cancel: cancel.clone(),
            });

            let user_msg = Message::user(
                content.clone(),
                attachment.as_ref().map(|a| a.preview.clone()),
            );
            inner.messages.push(user_msg.clone());

            (ChatRequest::new(session_id, &content, attachment), seq, cancel, user_msg)
        };

        self.events.message_appended(&user_msg);
        self.events.processing_changed(true);
        log::info!("send_message #{}: content_len={}", seq, content.len());

        let result = tokio::select! {
            r = self.backend.send(request) => Some(r),
            _ = cancel.cancelled() => None,
        };

        let mut inner = self.lock()?;
        if inner.in_flight.as_ref().map(|f| f.seq) != Some(seq) {
            // The slot was released (and `processing` reset) by whoever took it.
            log::warn!("Discarding completion of request #{} that no longer owns the send slot", seq);
            return Ok(SendOutcome::Cancelled);
        }
        inner.in_flight = None;

        match result {
            None => {
                drop(inner);
                log::info!("send_message #{} cancelled", seq);
                self.events.processing_changed(false);
                self.events.notify(Notification::info(
                    "Request cancelled",
                    "The pending message was cancelled.",
                ));
                Ok(SendOutcome::Cancelled)
            }
            Some(Ok(reply)) => {
                let msg = Message::assistant(reply.response).with_classification(reply.classification);
                inner.messages.push(msg.clone());
                drop(inner);
                self.events.message_appended(&msg);
                self.events.processing_changed(false);
                Ok(SendOutcome::Replied(msg))
            }
            Some(Err(e)) => {
                log::error!("Send message error (#{}): {}", seq, e);
                let msg = Message::fallback();
                inner.messages.push(msg.clone());
                drop(inner);
                self.events.message_appended(&msg);
                self.events.processing_changed(false);
                self.events.notify(Notification::error(
                    "Submission Error",
                    "Your message could not be sent.",
                ));
                Ok(SendOutcome::Failed(msg))
            }
        }
    }

    /// Cancels the in-flight send, if any. Returns whether one was cancelled.
    pub fn cancel_send(&self) -> AppResult<bool> {
        let inner = self.lock()?;
        match &inner.in_flight {
            Some(flight) => {
                flight.cancel.cancel();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn messages(&self) -> AppResult<Vec<Message>> {
        Ok(self.lock()?.messages.clone())
    }

    pub fn connection_state(&self) -> AppResult<ConnectionState> {
        Ok(self.lock()?.session.state())
    }

    pub fn session_id(&self) -> AppResult<Option<String>> {
        Ok(self.lock()?.session.session_id().map(str::to_string))
    }

    pub fn is_processing(&self) -> bool {
        self.lock().map(|inner| inner.in_flight.is_some()).unwrap_or(false)
    }

    /// Whether the composer should be inert right now.
    pub fn input_disabled(&self) -> bool {
        self.lock()
            .map(|inner| inner.in_flight.is_some() || inner.session.state() != ConnectionState::Connected)
            .unwrap_or(true)
    }

    pub fn indicator(&self) -> AppResult<StatusIndicator> {
        let inner = self.lock()?;
        Ok(inner.session.state().indicator(inner.session.session_id()))
    }

    pub fn snapshot(&self) -> AppResult<ConversationSnapshot> {
        let inner = self.lock()?;
        let state = inner.session.state();
        let processing = inner.in_flight.is_some();
        Ok(ConversationSnapshot {
            messages: inner.messages.clone(),
            connection: state,
            session_id: inner.session.session_id().map(str::to_string),
            processing,
            input_disabled: processing || state != ConnectionState::Connected,
            indicator: state.indicator(inner.session.session_id()),
        })
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::Notify;

    use super::*;
    use crate::models::message::{ChatReply, Classification, Role, FALLBACK_REPLY};
    use crate::session::MemorySessionStore;
    use crate::test_support::{init_logging, RecordingEvents, ScriptedBackend};

    struct Fixture {
        conv: Arc<Conversation>,
        backend: Arc<ScriptedBackend>,
        store: Arc<MemorySessionStore>,
        events: Arc<RecordingEvents>,
    }

    fn fixture(backend: ScriptedBackend, store: MemorySessionStore) -> Fixture {
        init_logging();
        let backend = Arc::new(backend);
        let store = Arc::new(store);
        let events = Arc::new(RecordingEvents::default());
        let conv = Arc::new(Conversation::new(backend.clone(), store.clone(), events.clone()));
        Fixture {
            conv,
            backend,
            store,
            events,
        }
    }

    async fn connected() -> Fixture {
        let f = fixture(ScriptedBackend::default(), MemorySessionStore::with_session("xyz"));
        assert_eq!(f.conv.initialize().await.unwrap(), ConnectionState::Connected);
        f
    }

    async fn wait_until_processing(conv: &Conversation) {
        while !conv.is_processing() {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_starts_with_greeting_and_connecting() {
        let f = fixture(ScriptedBackend::default(), MemorySessionStore::default());
        let snap = f.conv.snapshot().unwrap();
        assert_eq!(snap.messages.len(), 1);
        assert_eq!(snap.messages[0].role, Role::Assistant);
        assert_eq!(snap.connection, ConnectionState::Connecting);
        assert!(snap.input_disabled);
    }

    #[tokio::test]
    async fn test_stored_session_skips_network() {
        let f = fixture(ScriptedBackend::default(), MemorySessionStore::with_session("xyz"));
        let state = f.conv.initialize().await.unwrap();
        assert_eq!(state, ConnectionState::Connected);
        assert_eq!(f.backend.session_calls(), 0);
        assert_eq!(
            f.events.connection(),
            vec![ConnectionState::Connecting, ConnectionState::Connected]
        );
        assert_eq!(f.conv.session_id().unwrap().as_deref(), Some("xyz"));
        assert!(f.events.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_new_session_is_persisted() {
        let f = fixture(ScriptedBackend::with_session("abc123"), MemorySessionStore::default());
        let state = f.conv.initialize().await.unwrap();
        assert_eq!(state, ConnectionState::Connected);
        assert_eq!(f.backend.session_calls(), 1);
        assert_eq!(
            f.events.connection(),
            vec![ConnectionState::Connecting, ConnectionState::Connected]
        );
        assert_eq!(f.store.load().unwrap().as_deref(), Some("abc123"));
        let notes = f.events.notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "Connection established");
        assert!(!notes[0].is_error());
    }

    #[tokio::test]
    async fn test_acquisition_failure_disconnects() {
        let f = fixture(ScriptedBackend::failing_session(), MemorySessionStore::default());
        let state = f.conv.initialize().await.unwrap();
        assert_eq!(state, ConnectionState::Disconnected);
        assert_eq!(f.store.load().unwrap(), None);
        let errors = f.events.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].title, "Connection Error");
        assert!(f.conv.input_disabled());
        assert_eq!(f.conv.indicator().unwrap().label, "Bağlantı yok");
    }

    #[tokio::test]
    async fn test_initialize_runs_once() {
        let f = fixture(ScriptedBackend::failing_session(), MemorySessionStore::default());
        f.conv.initialize().await.unwrap();
        let again = f.conv.initialize().await.unwrap();
        assert_eq!(again, ConnectionState::Disconnected);
        assert_eq!(f.backend.session_calls(), 1);
        assert_eq!(f.events.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_reconnect_retries_on_request() {
        let f = fixture(ScriptedBackend::failing_session(), MemorySessionStore::default());
        f.conv.initialize().await.unwrap();
        f.backend.sessions.lock().unwrap().push_back(Ok("second".into()));
        let state = f.conv.reconnect().await.unwrap();
        assert_eq!(state, ConnectionState::Connected);
        assert_eq!(f.backend.session_calls(), 2);
        assert_eq!(f.store.load().unwrap().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_send_without_session_is_rejected() {
        let f = fixture(ScriptedBackend::default(), MemorySessionStore::default());
        let err = f.conv.send_message("hello".into(), None).await.unwrap_err();
        assert!(matches!(err, AppError::NoSession));
        assert_eq!(f.conv.messages().unwrap().len(), 1);
        assert_eq!(f.events.notifications().len(), 1);
        assert_eq!(f.events.errors().len(), 1);
        assert!(f.backend.requests().is_empty());
    }

    #[tokio::test]
    async fn test_successful_sends_append_pairs_in_order() {
        let f = connected().await;
        let n = 4;
        for i in 0..n {
            let outcome = f.conv.send_message(format!("question {i}"), None).await.unwrap();
            assert!(matches!(outcome, SendOutcome::Replied(_)));
        }
        let messages = f.conv.messages().unwrap();
        assert_eq!(messages.len(), 1 + 2 * n);
        for (i, pair) in messages[1..].chunks(2).enumerate() {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[0].content, format!("question {i}"));
            assert_eq!(pair[1].role, Role::Assistant);
            assert_eq!(pair[1].content, format!("echo: question {i}"));
        }
        assert!(messages.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert!(!f.conv.is_processing());
        let requests = f.backend.requests();
        assert!(requests.iter().all(|r| r.session_id == "xyz"));
    }

    #[tokio::test]
    async fn test_backend_failure_appends_fallback() {
        let f = connected().await;
        f.backend.push_reply(Err(AppError::Backend {
            status: 500,
            message: "boom".into(),
        }));
        let outcome = f.conv.send_message("hello".into(), None).await.unwrap();
        let SendOutcome::Failed(msg) = outcome else {
            panic!("expected failure outcome");
        };
        assert_eq!(msg.content, FALLBACK_REPLY);

        let messages = f.conv.messages().unwrap();
        let fallbacks: Vec<_> = messages
            .iter()
            .filter(|m| m.role == Role::Assistant && m.content == FALLBACK_REPLY)
            .collect();
        assert_eq!(fallbacks.len(), 1);
        assert_eq!(messages.len(), 3);
        assert_eq!(f.conv.connection_state().unwrap(), ConnectionState::Connected);
        let errors = f.events.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].title, "Submission Error");
        assert_eq!(*f.events.processing.lock().unwrap(), vec![true, false]);
    }

    #[tokio::test]
    async fn test_attachment_becomes_user_image_and_upload() {
        let f = connected().await;
        let att = PendingAttachment::from_bytes("leaf.png", "image/png", vec![7, 7]);
        let preview = att.preview.clone();
        f.conv.send_message(String::new(), Some(att)).await.unwrap();

        let messages = f.conv.messages().unwrap();
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "");
        assert_eq!(messages[1].image.as_deref(), Some(preview.as_str()));

        let request = &f.backend.requests()[0];
        assert!(request.question.is_none());
        assert_eq!(request.file.as_ref().unwrap().bytes, vec![7, 7]);
    }

    #[tokio::test]
    async fn test_reply_classification_is_kept() {
        let f = connected().await;
        f.backend.push_reply(Ok(ChatReply {
            response: "Early blight".into(),
            classification: Some(Classification {
                label: "Tomato___Early_blight".into(),
                probability: 0.9,
                image_url: None,
            }),
        }));
        let outcome = f.conv.send_message("what is it?".into(), None).await.unwrap();
        let SendOutcome::Replied(msg) = outcome else {
            panic!("expected reply");
        };
        assert_eq!(msg.classification.unwrap().label, "Tomato___Early_blight");
    }

    #[tokio::test]
    async fn test_second_send_while_in_flight_is_rejected() {
        init_logging();
        let gate = Arc::new(Notify::new());
        let backend = Arc::new(ScriptedBackend::gated(gate.clone()));
        let events = Arc::new(RecordingEvents::default());
        let conv = Arc::new(Conversation::new(
            backend.clone(),
            Arc::new(MemorySessionStore::with_session("xyz")),
            events.clone(),
        ));
        conv.initialize().await.unwrap();

        let first = {
            let conv = conv.clone();
            tokio::spawn(async move { conv.send_message("first".into(), None).await })
        };
        wait_until_processing(&conv).await;

        // Optimistic user message is visible while the request is pending.
        assert_eq!(conv.messages().unwrap().len(), 2);
        assert!(conv.input_disabled());

        let err = conv.send_message("second".into(), None).await.unwrap_err();
        assert!(matches!(err, AppError::SendInProgress));
        assert_eq!(conv.messages().unwrap().len(), 2);

        gate.notify_one();
        let outcome = first.await.unwrap().unwrap();
        assert!(matches!(outcome, SendOutcome::Replied(_)));
        assert_eq!(conv.messages().unwrap().len(), 3);
        assert_eq!(backend.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_releases_slot_without_reply() {
        init_logging();
        let gate = Arc::new(Notify::new());
        let backend = Arc::new(ScriptedBackend::gated(gate.clone()));
        let events = Arc::new(RecordingEvents::default());
        let conv = Arc::new(Conversation::new(
            backend.clone(),
            Arc::new(MemorySessionStore::with_session("xyz")),
            events.clone(),
        ));
        conv.initialize().await.unwrap();
        assert!(!conv.cancel_send().unwrap());

        let pending = {
            let conv = conv.clone();
            tokio::spawn(async move { conv.send_message("slow".into(), None).await })
        };
        wait_until_processing(&conv).await;
        assert!(conv.cancel_send().unwrap());

        let outcome = pending.await.unwrap().unwrap();
        assert_eq!(outcome, SendOutcome::Cancelled);
        assert!(!conv.is_processing());
        assert_eq!(conv.messages().unwrap().len(), 2);
        assert_eq!(events.notifications().last().unwrap().title, "Request cancelled");

        gate.notify_one();
        let outcome = conv.send_message("again".into(), None).await.unwrap();
        assert!(matches!(outcome, SendOutcome::Replied(_)));
        assert_eq!(conv.messages().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_clear_session_blocks_sends_until_reconnect() {
        let f = connected().await;
        f.conv.clear_session().unwrap();
        assert_eq!(f.conv.connection_state().unwrap(), ConnectionState::Disconnected);
        assert_eq!(f.store.load().unwrap(), None);

        let err = f.conv.send_message("hi".into(), None).await.unwrap_err();
        assert!(matches!(err, AppError::NoSession));

        f.backend.sessions.lock().unwrap().push_back(Ok("fresh".into()));
        assert_eq!(f.conv.reconnect().await.unwrap(), ConnectionState::Connected);
        assert_eq!(f.conv.session_id().unwrap().as_deref(), Some("fresh"));
        assert!(f.conv.send_message("hi".into(), None).await.is_ok());
    }

    #[tokio::test]
    async fn test_clear_session_abandons_in_flight_send() {
        init_logging();
        let gate = Arc::new(Notify::new());
        let backend = Arc::new(ScriptedBackend::gated(gate.clone()));
        let events = Arc::new(RecordingEvents::default());
        let conv = Arc::new(Conversation::new(
            backend.clone(),
            Arc::new(MemorySessionStore::with_session("xyz")),
            events.clone(),
        ));
        conv.initialize().await.unwrap();

        let pending = {
            let conv = conv.clone();
            tokio::spawn(async move { conv.send_message("old session".into(), None).await })
        };
        wait_until_processing(&conv).await;

        conv.clear_session().unwrap();
        assert!(!conv.is_processing());

        let outcome = pending.await.unwrap().unwrap();
        assert_eq!(outcome, SendOutcome::Cancelled);
        assert_eq!(conv.messages().unwrap().len(), 2);
        assert_eq!(*events.processing.lock().unwrap(), vec![true, false]);
        assert!(events
            .notifications()
            .iter()
            .all(|n| n.title != "Request cancelled"));

        // A new session's send is unaffected by the abandoned one.
        backend.sessions.lock().unwrap().push_back(Ok("fresh".into()));
        conv.reconnect().await.unwrap();
        gate.notify_one();
        let outcome = conv.send_message("new session".into(), None).await.unwrap();
        assert!(matches!(outcome, SendOutcome::Replied(_)));
        assert_eq!(backend.requests().last().unwrap().session_id, "fresh");
    }

    #[tokio::test]
    async fn test_snapshot_reflects_state() {
        let f = connected().await;
        let snap = f.conv.snapshot().unwrap();
        assert_eq!(snap.connection, ConnectionState::Connected);
        assert_eq!(snap.session_id.as_deref(), Some("xyz"));
        assert!(!snap.processing);
        assert!(!snap.input_disabled);
        assert_eq!(snap.indicator.icon, "wifi");
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["connection"], "connected");
        assert_eq!(json["sessionId"], "xyz");
    }
}
