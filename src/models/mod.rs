pub mod attachment;
pub mod connection;
pub mod message;
pub mod notification;
pub mod settings;
