use crate::models::connection::ConnectionState;
use crate::models::message::Message;
use crate::models::notification::Notification;

/// Outbound surface of the conversation: whatever renders it implements this.
pub trait ChatEvents: Send + Sync {
    fn notify(&self, notification: Notification);

    fn message_appended(&self, message: &Message);

    fn connection_changed(&self, state: ConnectionState, session_id: Option<&str>);

    fn processing_changed(&self, processing: bool);
}
