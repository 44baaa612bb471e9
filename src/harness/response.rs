//! Read-only view of what a collection session recorded.

use std::fmt;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::harness::message::{InlineButton, Message};

#[derive(Debug, Clone, Default)]
pub struct Response {
    messages: Vec<Message>,
}

impl Response {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn count(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn first(&self) -> Option<&Message> {
        self.messages.first()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn get(&self, index: usize) -> Option<&Message> {
        self.messages.get(index)
    }

    /// Non-empty texts joined by newlines.
    pub fn full_text(&self) -> String {
        self.messages
            .iter()
            .filter(|m| !m.text.is_empty())
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Server date of the last message.
    pub fn last_message_date(&self) -> Option<DateTime<Utc>> {
        self.last().map(|m| m.date)
    }

    /// Local receipt time of the last message.
    pub fn last_received_at(&self) -> Option<Instant> {
        self.last().and_then(|m| m.received_at)
    }

    /// Inline keyboards of all messages carrying one, in order.
    pub fn inline_keyboards(&self) -> Vec<&[Vec<InlineButton>]> {
        self.messages.iter().filter_map(Message::inline_keyboard).collect()
    }

    /// Distinct bot commands across all messages, in order of appearance.
    pub fn commands(&self) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        for command in self.messages.iter().flat_map(|m| &m.commands) {
            if !found.contains(command) {
                found.push(command.clone());
            }
        }
        found
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "Empty response");
        }
        let quoted: Vec<String> = self.messages.iter().map(|m| format!("\"{}\"", m.text)).collect();
        write!(f, "{}", quoted.join("\nthen\n"))
    }
}
