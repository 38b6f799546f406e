pub mod chat_commands;
pub mod composer_commands;
pub mod session_commands;
pub mod settings_commands;
pub mod voice_commands;
