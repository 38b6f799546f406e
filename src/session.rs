//! Session identifier persistence and the per-conversation session context.
//!
//! The backend issues an opaque session id on first contact. It is kept in the
//! local settings table under [`SESSION_ID_KEY`] and reused until cleared.

use std::sync::{Arc, Mutex};

use crate::db::{settings_repo, DbHandle};
use crate::error::{AppError, AppResult};
use crate::models::connection::ConnectionState;
use crate::models::settings::SESSION_ID_KEY;

/// Where the session identifier survives restarts.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> AppResult<Option<String>>;
    fn save(&self, session_id: &str) -> AppResult<()>;
    fn clear(&self) -> AppResult<()>;
}

/// Stores the id in the `settings` table.
pub struct SettingsSessionStore {
    db: DbHandle,
}

impl SettingsSessionStore {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }
}

impl SessionStore for SettingsSessionStore {
    fn load(&self) -> AppResult<Option<String>> {
        Ok(settings_repo::get_setting(&self.db, SESSION_ID_KEY)?
            .map(|s| s.value)
            .filter(|v| !v.is_empty()))
    }

    fn save(&self, session_id: &str) -> AppResult<()> {
        settings_repo::set_setting(&self.db, SESSION_ID_KEY, session_id)
    }

    fn clear(&self) -> AppResult<()> {
        settings_repo::delete_setting(&self.db, SESSION_ID_KEY)
    }
}

/// Process-local store, used when nothing should touch disk.
#[derive(Default)]
pub struct MemorySessionStore {
    value: Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn with_session(session_id: &str) -> Self {
        Self {
            value: Mutex::new(Some(session_id.to_string())),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> AppResult<Option<String>> {
        let value = self.value.lock().map_err(|e| AppError::Internal(e.to_string()))?;
        Ok(value.clone())
    }

    fn save(&self, session_id: &str) -> AppResult<()> {
        let mut value = self.value.lock().map_err(|e| AppError::Internal(e.to_string()))?;
        *value = Some(session_id.to_string());
        Ok(())
    }

    fn clear(&self) -> AppResult<()> {
        let mut value = self.value.lock().map_err(|e| AppError::Internal(e.to_string()))?;
        *value = None;
        Ok(())
    }
}

/// The adopted session id together with the connection state derived from
/// acquiring it.
pub struct SessionContext {
    store: Arc<dyn SessionStore>,
    session_id: Option<String>,
    state: ConnectionState,
}

impl SessionContext {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            session_id: None,
            state: ConnectionState::Connecting,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn begin(&mut self) {
        self.state = ConnectionState::Connecting;
    }

    /// Adopts a persisted id, if any. Read failures count as "nothing stored".
    pub fn load(&mut self) -> Option<String> {
        match self.store.load() {
            Ok(Some(id)) => {
                self.session_id = Some(id.clone());
                self.state = ConnectionState::Connected;
                Some(id)
            }
            Ok(None) => None,
            Err(e) => {
                log::warn!("Failed to read stored session id: {}", e);
                None
            }
        }
    }

    /// Adopts a freshly issued id and persists it. A failed write is logged;
    /// the id is still used for this run.
    pub fn create(&mut self, session_id: String) {
        if let Err(e) = self.store.save(&session_id) {
            log::error!("Failed to persist session id: {}", e);
        }
        self.session_id = Some(session_id);
        self.state = ConnectionState::Connected;
    }

    pub fn fail(&mut self) {
        self.state = ConnectionState::Disconnected;
    }

    pub fn clear(&mut self) -> AppResult<()> {
        self.store.clear()?;
        self.session_id = None;
        self.state = ConnectionState::Disconnected;
        Ok(())
    }
}
