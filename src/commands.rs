//! Owner SMS commands: `START IG`, `STOP IG`, `STATUS IG`.

use igsms_core::error::IgsmsError;
use tracing::info;

use crate::monitor::Monitor;
use crate::notifier::Notifier;

/// How many trailing characters of the owner phone must match the sender.
const OWNER_SUFFIX_CHARS: usize = 10;

/// A parsed SMS command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Status,
    /// Anything else is echoed back.
    Echo(String),
}

impl Command {
    /// Match on the upper-cased body. Keywords may appear anywhere; the first
    /// match in start, stop, status order wins.
    pub fn parse(body: &str) -> Self {
        let body = body.trim();
        let upper = body.to_uppercase();
        if upper.contains("START IG") {
            Self::Start
        } else if upper.contains("STOP IG") {
            Self::Stop
        } else if upper.contains("STATUS IG") {
            Self::Status
        } else {
            Self::Echo(body.to_string())
        }
    }
}

/// Whether `from` is the owner: it must end with the last ten characters of
/// the configured number, so `+1 555…` and `555…` forms both match.
pub fn is_owner(owner_phone: &str, from: &str) -> bool {
    let owner = owner_phone.trim();
    if owner.is_empty() {
        return false;
    }
    let skip = owner.chars().count().saturating_sub(OWNER_SUFFIX_CHARS);
    let suffix: String = owner.chars().skip(skip).collect();
    from.trim().ends_with(&suffix)
}

/// Run `command` and text the reply to the owner. Returns the reply.
pub async fn handle(
    command: Command,
    monitor: &Monitor,
    notifier: &Notifier,
) -> Result<String, IgsmsError> {
    let reply = match command {
        Command::Start => format!("IG monitor {}", monitor.start().await?),
        Command::Stop => format!("IG monitor {}", monitor.stop().await?),
        Command::Status => format!("IG monitor running: {}", monitor.is_running().await),
        Command::Echo(body) => format!("Received: {body}"),
    };
    info!("command reply: {reply}");
    notifier.notify(&reply).await?;
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::Monitor;
    use crate::testing::{
        fast_settings, notifier, temp_store, MockBrowser, MockChannel, MockPage, OWNER,
    };
    use std::sync::Arc;

    #[test]
    fn test_parse_keywords() {
        assert_eq!(Command::parse("START IG"), Command::Start);
        assert_eq!(Command::parse("please stop ig now"), Command::Stop);
        assert_eq!(Command::parse("Status IG?"), Command::Status);
    }

    #[test]
    fn test_parse_order_start_wins() {
        assert_eq!(Command::parse("stop ig then start ig"), Command::Start);
        assert_eq!(Command::parse("status ig, stop ig"), Command::Stop);
    }

    #[test]
    fn test_parse_echo_is_trimmed() {
        assert_eq!(
            Command::parse("  hello there \n"),
            Command::Echo("hello there".to_string())
        );
        assert_eq!(Command::parse("STARTIG"), Command::Echo("STARTIG".to_string()));
    }

    #[test]
    fn test_owner_suffix_match() {
        assert!(is_owner("+15551234567", "+15551234567"));
        assert!(is_owner("+15551234567", "5551234567"));
        assert!(is_owner("5551234567", "+15551234567"));
        assert!(!is_owner("+15551234567", "+15551234568"));
        assert!(!is_owner("+15551234567", ""));
    }

    #[test]
    fn test_empty_owner_matches_nobody() {
        assert!(!is_owner("", "+15551234567"));
        assert!(!is_owner("  ", ""));
    }

    #[test]
    fn test_short_owner_number_uses_whole_number() {
        assert!(is_owner("12345", "+9912345"));
        assert!(!is_owner("12345", "1234"));
    }

    #[tokio::test]
    async fn test_handle_start_stop_status() {
        let (store, _tmp) = temp_store().await;
        let channel = Arc::new(MockChannel::default());
        let notifier = notifier(&store, channel.clone());
        let page = Arc::new(MockPage::logged_in(&[]));
        let monitor = Monitor::new(
            Arc::new(MockBrowser::new(page)),
            store.clone(),
            notifier.clone(),
            fast_settings(),
        );

        assert_eq!(
            handle(Command::Start, &monitor, &notifier).await.unwrap(),
            "IG monitor started"
        );
        assert_eq!(
            handle(Command::Start, &monitor, &notifier).await.unwrap(),
            "IG monitor already_running"
        );
        assert_eq!(
            handle(Command::Status, &monitor, &notifier).await.unwrap(),
            "IG monitor running: true"
        );
        assert_eq!(
            handle(Command::Stop, &monitor, &notifier).await.unwrap(),
            "IG monitor stopped"
        );
        assert_eq!(
            handle(Command::Status, &monitor, &notifier).await.unwrap(),
            "IG monitor running: false"
        );

        let sent = channel.sent.lock().unwrap();
        assert!(sent
            .iter()
            .all(|m| m.reply_target.as_deref() == Some(OWNER)));
        assert!(sent.iter().any(|m| m.text == "IG monitor stopped"));
    }

    #[tokio::test]
    async fn test_handle_echo() {
        let (store, _tmp) = temp_store().await;
        let channel = Arc::new(MockChannel::default());
        let notifier = notifier(&store, channel.clone());
        let monitor = Monitor::new(
            Arc::new(MockBrowser::new(Arc::new(MockPage::default()))),
            store.clone(),
            notifier.clone(),
            fast_settings(),
        );

        let reply = handle(Command::parse(" hi "), &monitor, &notifier)
            .await
            .unwrap();
        assert_eq!(reply, "Received: hi");
        assert_eq!(channel.texts(), vec!["Received: hi"]);
    }
}
