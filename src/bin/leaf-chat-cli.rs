use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use app_lib::config::AppConfig;
use app_lib::conversation::SendOutcome;
use app_lib::db::{migrations, DbHandle};
use app_lib::events::ChatEvents;
use app_lib::models::attachment::PendingAttachment;
use app_lib::models::connection::ConnectionState;
use app_lib::models::message::Message;
use app_lib::models::notification::Notification;
use app_lib::repl::{parse_line, PendingSends, ReplCommand, HELP};
use app_lib::state::AppState;
use app_lib::voice::SpeechCapability;

#[derive(Parser)]
#[command(name = "leaf-chat-cli")]
#[command(about = "Terminal client for the leaf disease diagnosis chatbot", long_about = None)]
struct Cli {
    /// Backend base URL (overrides LEAFCHAT_API_URL and the stored setting)
    #[arg(long)]
    api_url: Option<String>,

    /// Directory holding leafchat.db
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Forget the stored session id before connecting
    #[arg(long)]
    new_session: bool,
}

/// Prints conversation events to the terminal.
struct ConsoleEvents;

impl ChatEvents for ConsoleEvents {
    fn notify(&self, n: Notification) {
        if n.is_error() {
            eprintln!("! {}: {}", n.title, n.description);
        } else {
            println!("* {}: {}", n.title, n.description);
        }
    }

    fn message_appended(&self, message: &Message) {
        if message.role == app_lib::models::message::Role::User {
            return;
        }
        println!("[{}] bot: {}", message.display_time(), message.content);
        if let Some(c) = &message.classification {
            println!("        {} ({:.1}%)", c.label, c.probability * 100.0);
        }
    }

    fn connection_changed(&self, state: ConnectionState, session_id: Option<&str>) {
        match session_id {
            Some(id) => println!("* {} (session {})", state.label(), id),
            None => println!("* {}", state.label()),
        }
    }

    fn processing_changed(&self, processing: bool) {
        if processing {
            println!("  ...");
        }
    }
}

fn print_status(state: &AppState) -> Result<()> {
    let indicator = state.conversation.indicator()?;
    println!("{}: {}", indicator.detail.title, indicator.detail.status);
    if let Some(id) = indicator.detail.session_id {
        println!("  Session: {id}");
    }
    if let Some(note) = indicator.detail.active_note {
        println!("  {note}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let mut config = AppConfig::from_env();
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    let conn = migrations::init_db(&config.data_dir).context("failed to open settings database")?;
    let db: DbHandle = Arc::new(Mutex::new(conn));

    config.apply_settings(&db);
    if let Some(url) = &cli.api_url {
        config = config.with_api_url(url);
    }
    if let Some(secs) = cli.timeout.filter(|s| *s > 0) {
        config.request_timeout = Duration::from_secs(secs);
    }
    log::info!("Using backend {}", config.api_url);

    let state = Arc::new(AppState::new(
        db,
        config,
        Arc::new(ConsoleEvents),
        SpeechCapability::Unavailable,
    )?);

    if cli.new_session {
        state.conversation.clear_session()?;
    }
    state.conversation.initialize().await?;
    for message in state.conversation.messages()? {
        println!("[{}] bot: {}", message.display_time(), message.content);
    }
    println!("Type /help for commands.");

    let mut pending = PendingSends::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Quit => break,
            ReplCommand::Help => println!("{HELP}"),
            ReplCommand::Status => print_status(&state)?,
            ReplCommand::Unknown(cmd) => eprintln!("Unknown command: {cmd} (try /help)"),
            ReplCommand::Attach(path) => match PendingAttachment::from_path(&path) {
                Ok(att) => {
                    let name = att.file_name.clone();
                    if state.composer()?.select_attachment(att).is_ok() {
                        println!("* Attached {name}");
                    }
                }
                Err(e) => eprintln!("! Could not read {}: {e}", path.display()),
            },
            ReplCommand::RemoveAttachment => state.composer()?.remove_attachment(),
            ReplCommand::Reconnect => {
                if let Err(e) = state.conversation.reconnect().await {
                    eprintln!("! {e}");
                }
            }
            ReplCommand::ClearSession => {
                if let Err(e) = state.conversation.clear_session() {
                    eprintln!("! {e}");
                }
            }
            ReplCommand::Cancel => {
                if !state.conversation.cancel_send()? {
                    println!("* Nothing to cancel");
                }
            }
            ReplCommand::Text(text) => {
                state.composer()?.set_text(text);
                let draft = state.take_draft(None, None)?;
                if draft.is_none() {
                    if state.conversation.input_disabled() {
                        eprintln!("! Not ready to send (use /status)");
                    }
                    continue;
                }
                let state = state.clone();
                pending.spawn(async move {
                    match state.dispatch(draft).await {
                        Ok(Some(SendOutcome::Cancelled)) => log::debug!("send cancelled"),
                        Ok(_) => {}
                        Err(e) => log::debug!("send rejected: {}", e),
                    }
                });
            }
        }
    }

    if !pending.is_empty() {
        println!("* Waiting for the pending reply...");
    }
    pending.drain().await;

    Ok(())
}
