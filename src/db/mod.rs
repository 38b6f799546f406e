pub mod migrations;
pub mod settings_repo;

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

/// Shared handle to the local settings database.
pub type DbHandle = Arc<Mutex<Connection>>;
