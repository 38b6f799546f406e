use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// What the header badge shows for a connection state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusIndicator {
    pub state: ConnectionState,
    pub icon: &'static str,
    pub label: &'static str,
    pub color: &'static str,
    pub detail: StatusDetail,
}

/// Contents of the expandable panel under the badge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDetail {
    pub title: &'static str,
    pub status: &'static str,
    pub session_id: Option<String>,
    pub active_note: Option<&'static str>,
}

impl ConnectionState {
    pub fn icon(self) -> &'static str {
        match self {
            ConnectionState::Connected => "wifi",
            ConnectionState::Connecting => "loader",
            ConnectionState::Disconnected => "wifi-off",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ConnectionState::Connected => "Bağlı",
            ConnectionState::Connecting => "Bağlanıyor...",
            ConnectionState::Disconnected => "Bağlantı yok",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            ConnectionState::Connected => "green",
            ConnectionState::Connecting => "yellow",
            ConnectionState::Disconnected => "red",
        }
    }

    pub fn indicator(self, session_id: Option<&str>) -> StatusIndicator {
        StatusIndicator {
            state: self,
            icon: self.icon(),
            label: self.label(),
            color: self.color(),
            detail: StatusDetail {
                title: "Connection Status",
                status: self.label(),
                session_id: session_id.filter(|s| !s.is_empty()).map(str::to_string),
                active_note: (self == ConnectionState::Connected).then_some("API connection active"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connected_indicator() {
        let ind = ConnectionState::Connected.indicator(Some("abc123"));
        assert_eq!(ind.icon, "wifi");
        assert_eq!(ind.label, "Bağlı");
        assert_eq!(ind.color, "green");
        assert_eq!(ind.detail.session_id.as_deref(), Some("abc123"));
        assert_eq!(ind.detail.active_note, Some("API connection active"));
    }

    #[test]
    fn test_connecting_indicator() {
        let ind = ConnectionState::Connecting.indicator(None);
        assert_eq!(ind.icon, "loader");
        assert_eq!(ind.label, "Bağlanıyor...");
        assert_eq!(ind.color, "yellow");
        assert!(ind.detail.session_id.is_none());
        assert!(ind.detail.active_note.is_none());
    }

    #[test]
    fn test_disconnected_indicator_keeps_session_id() {
        let ind = ConnectionState::Disconnected.indicator(Some("xyz"));
        assert_eq!(ind.icon, "wifi-off");
        assert_eq!(ind.label, "Bağlantı yok");
        assert_eq!(ind.color, "red");
        assert_eq!(ind.detail.status, "Bağlantı yok");
        assert_eq!(ind.detail.session_id.as_deref(), Some("xyz"));
        assert!(ind.detail.active_note.is_none());
    }

    #[test]
    fn test_empty_session_id_is_hidden() {
        let ind = ConnectionState::Connected.indicator(Some(""));
        assert!(ind.detail.session_id.is_none());
    }

    #[test]
    fn test_state_serializes_lowercase() {
        let json = serde_json::to_string(&ConnectionState::Disconnected).unwrap();
        assert_eq!(json, "\"disconnected\"");
    }
}
