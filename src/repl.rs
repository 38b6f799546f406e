//! Line commands understood by the terminal client.

use std::future::Future;
use std::path::PathBuf;

use tokio::task::JoinSet;

pub const HELP: &str = "\
Type a message and press Enter to send it.
  /image <path>   attach an image to the next message
  /remove         drop the pending attachment
  /status         show connection status and session id
  /reconnect      request a new session if disconnected
  /clear          forget the stored session id
  /cancel         cancel the message being sent
  /help           show this help
  /quit           exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// Draft text to append to the composer and submit.
    Text(String),
    Attach(PathBuf),
    RemoveAttachment,
    Status,
    Reconnect,
    ClearSession,
    Cancel,
    Help,
    Quit,
    Unknown(String),
    Empty,
}

pub fn parse_line(line: &str) -> ReplCommand {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return ReplCommand::Empty;
    }

    let Some(rest) = line.trim_start().strip_prefix('/') else {
        return ReplCommand::Text(line.to_string());
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    match name {
        "image" | "img" if !arg.is_empty() => ReplCommand::Attach(PathBuf::from(arg)),
        "remove" => ReplCommand::RemoveAttachment,
        "status" => ReplCommand::Status,
        "reconnect" => ReplCommand::Reconnect,
        "clear" => ReplCommand::ClearSession,
        "cancel" => ReplCommand::Cancel,
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" | "q" => ReplCommand::Quit,
        _ => ReplCommand::Unknown(line.trim().to_string()),
    }
}

/// Sends running in the background while the prompt keeps reading input.
/// They are awaited before the client exits so no reply is lost.
#[derive(Default)]
pub struct PendingSends {
    tasks: JoinSet<()>,
}

impl PendingSends {
    pub fn spawn<F>(&mut self, send: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        while self.tasks.try_join_next().is_some() {}
        self.tasks.spawn(send);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Waits for every outstanding send to finish.
    pub async fn drain(&mut self) {
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                log::error!("Send task failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_drain_waits_for_outstanding_send() {
        let replied = Arc::new(AtomicBool::new(false));
        let mut pending = PendingSends::default();
        {
            let replied = replied.clone();
            pending.spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                replied.store(true, Ordering::SeqCst);
            });
        }
        assert_eq!(pending.len(), 1);
        pending.drain().await;
        assert!(replied.load(Ordering::SeqCst));
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_finished_sends_are_reaped() {
        let mut pending = PendingSends::default();
        pending.spawn(async {});
        pending.drain().await;
        pending.spawn(async {});
        tokio::task::yield_now().await;
        pending.spawn(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
        });
        assert!(pending.len() <= 2);
        pending.drain().await;
        assert!(pending.is_empty());
    }

    #[test]
    fn test_plain_text_is_kept_verbatim() {
        assert_eq!(
            parse_line("  is this powdery mildew?\n"),
            ReplCommand::Text("  is this powdery mildew?".into())
        );
    }

    #[test]
    fn test_blank_line_is_empty() {
        assert_eq!(parse_line("   \n"), ReplCommand::Empty);
    }

    #[test]
    fn test_image_takes_path_with_spaces() {
        assert_eq!(
            parse_line("/image ~/Pictures/my leaf.jpg"),
            ReplCommand::Attach(PathBuf::from("~/Pictures/my leaf.jpg"))
        );
    }

    #[test]
    fn test_image_without_path_is_unknown() {
        assert_eq!(parse_line("/image"), ReplCommand::Unknown("/image".into()));
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(parse_line("/status"), ReplCommand::Status);
        assert_eq!(parse_line("/remove"), ReplCommand::RemoveAttachment);
        assert_eq!(parse_line("/reconnect"), ReplCommand::Reconnect);
        assert_eq!(parse_line("/clear"), ReplCommand::ClearSession);
        assert_eq!(parse_line("/cancel"), ReplCommand::Cancel);
        assert_eq!(parse_line("/exit"), ReplCommand::Quit);
        assert_eq!(parse_line("/bogus"), ReplCommand::Unknown("/bogus".into()));
    }
}
