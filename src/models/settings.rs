use serde::{Deserialize, Serialize};

/// Settings key holding the backend-issued session identifier.
pub const SESSION_ID_KEY: &str = "sessionId";
/// Settings key overriding the configured backend URL.
pub const API_URL_KEY: &str = "api_url";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}
