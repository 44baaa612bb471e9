//! Message types seen by the harness.
//!
//! These are transport-neutral: the Telegram adapter converts teloxide
//! messages into them, tests build them directly.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use tokio::time::Instant;

/// `/command` or `/command@bot` at the start of the text or after whitespace.
static BOT_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)/([A-Za-z0-9_]{1,64})(?:@[A-Za-z0-9_]+)?").unwrap());

/// Command names in `text`, found the way Telegram marks `bot_command`
/// entities. Slashes inside URLs or fractions are not commands.
pub fn bot_commands(text: &str) -> Vec<String> {
    BOT_COMMAND
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            if text[whole.end()..].starts_with(|c: char| c == '/' || c.is_alphanumeric()) {
                return None;
            }
            caps.get(1).map(|name| name.as_str().to_string())
        })
        .collect()
}

/// A button on an inline keyboard attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: Option<String>,
    pub url: Option<String>,
}

impl InlineButton {
    pub fn callback(text: &str, data: &str) -> Self {
        Self {
            text: text.to_string(),
            callback_data: Some(data.to_string()),
            url: None,
        }
    }
}

/// A chat message.
#[derive(Debug, Clone)]
pub struct Message {
    pub message_id: i64,
    /// Chat the message belongs to (negative = group, positive = private chat).
    pub chat_id: i64,
    /// Server-side send time.
    pub date: DateTime<Utc>,
    /// Text or caption. Empty for media without caption.
    pub text: String,
    /// Inline keyboard under the message, one `Vec` per row.
    pub inline_keyboard: Option<Vec<Vec<InlineButton>>>,
    /// Bot commands mentioned in the text, without the slash or `@bot` suffix.
    pub commands: Vec<String>,
    /// Sent by the controlling account rather than the peer.
    pub outgoing: bool,
    pub edited: bool,
    /// Local receipt time, stamped when a collection session records the message.
    pub received_at: Option<Instant>,
}

impl Message {
    /// An incoming, unedited text message dated now.
    pub fn incoming(message_id: i64, chat_id: i64, text: &str) -> Self {
        Self {
            message_id,
            chat_id,
            date: Utc::now(),
            text: text.to_string(),
            inline_keyboard: None,
            commands: bot_commands(text),
            outgoing: false,
            edited: false,
            received_at: None,
        }
    }

    pub fn with_inline_keyboard(mut self, rows: Vec<Vec<InlineButton>>) -> Self {
        self.inline_keyboard = Some(rows);
        self
    }

    pub fn inline_keyboard(&self) -> Option<&[Vec<InlineButton>]> {
        self.inline_keyboard.as_deref()
    }
}

/// An event delivered through the dispatch registry.
#[derive(Debug, Clone)]
pub enum MessageEvent {
    New(Message),
    Edited(Message),
    /// The transport hit a transient server-side error. Not filtered; every
    /// subscription sees it.
    ServerError(String),
}

impl MessageEvent {
    /// The message carried by this event, if any.
    pub fn message(&self) -> Option<&Message> {
        match self {
            Self::New(m) | Self::Edited(m) => Some(m),
            Self::ServerError(_) => None,
        }
    }
}
