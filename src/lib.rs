pub mod backend;
pub mod composer;
pub mod config;
pub mod conversation;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod repl;
pub mod session;
pub mod state;
pub mod voice;

#[cfg(feature = "desktop")]
pub mod commands;
#[cfg(feature = "desktop")]
pub mod desktop;

#[cfg(test)]
mod test_support;

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use std::sync::{Arc, Mutex};

    use tauri::Manager;

    use crate::config::AppConfig;
    use crate::desktop::TauriEvents;
    use crate::state::AppState;
    use crate::voice::SpeechCapability;

    let mut config = AppConfig::from_env();

    // Initialize the database
    let conn = db::migrations::init_db(&config.data_dir).expect("Failed to initialize database");
    let db: db::DbHandle = Arc::new(Mutex::new(conn));
    config.apply_settings(&db);

    tauri::Builder::default()
        .setup(move |app| {
            if cfg!(debug_assertions) {
                app.handle().plugin(
                    tauri_plugin_log::Builder::default()
                        .level(log::LevelFilter::Debug)
                        .build(),
                )?;
            } else {
                // Also log in release mode but at info level
                app.handle().plugin(
                    tauri_plugin_log::Builder::default()
                        .level(log::LevelFilter::Info)
                        .build(),
                )?;
            }
            log::info!("Using backend {}", config.api_url);

            // The page registers its speech engine once it has loaded.
            let events = Arc::new(TauriEvents::new(app.handle().clone()));
            let state = AppState::new(db, config, events, SpeechCapability::Unavailable)?;
            app.manage(state);
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // Chat commands
            commands::chat_commands::initialize_chat,
            commands::chat_commands::get_conversation,
            commands::chat_commands::send_message,
            commands::chat_commands::cancel_send,
            // Session commands
            commands::session_commands::get_connection_status,
            commands::session_commands::reconnect,
            commands::session_commands::clear_session,
            // Composer commands
            commands::composer_commands::get_composer,
            commands::composer_commands::update_draft,
            commands::composer_commands::attach_image,
            commands::composer_commands::remove_attachment,
            commands::composer_commands::submit_draft,
            commands::composer_commands::composer_key,
            // Voice commands
            commands::voice_commands::voice_register,
            commands::voice_commands::voice_toggle,
            commands::voice_commands::voice_event,
            // Settings commands
            commands::settings_commands::get_settings,
            commands::settings_commands::update_settings,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
