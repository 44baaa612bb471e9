//! Composable message filters.
//!
//! A filter decides which messages a collection session records. Filters are
//! cheap to clone and can be combined with `and`, `or` and `not`.

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::harness::message::Message;

type Predicate = dyn Fn(&Message) -> bool + Send + Sync;

#[derive(Clone)]
pub struct Filter {
    predicate: Arc<Predicate>,
    label: String,
}

impl Filter {
    pub fn new<F>(label: &str, predicate: F) -> Self
    where
        F: Fn(&Message) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            label: label.to_string(),
        }
    }

    /// Matches every message.
    pub fn all() -> Self {
        Self::new("all", |_| true)
    }

    pub fn chat(chat_id: i64) -> Self {
        Self::new(&format!("chat({chat_id})"), move |m| m.chat_id == chat_id)
    }

    pub fn incoming() -> Self {
        Self::new("incoming", |m| !m.outgoing)
    }

    pub fn outgoing() -> Self {
        Self::new("outgoing", |m| m.outgoing)
    }

    /// Messages with non-empty text.
    pub fn text() -> Self {
        Self::new("text", |m| !m.text.is_empty())
    }

    pub fn regex(pattern: Regex) -> Self {
        let label = format!("regex({})", pattern.as_str());
        Self::new(&label, move |m| pattern.is_match(&m.text))
    }

    pub fn and(self, other: Filter) -> Self {
        let label = format!("({} & {})", self.label, other.label);
        Self::new(&label, move |m| self.matches(m) && other.matches(m))
    }

    pub fn or(self, other: Filter) -> Self {
        let label = format!("({} | {})", self.label, other.label);
        Self::new(&label, move |m| self.matches(m) || other.matches(m))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        let label = format!("!{}", self.label);
        Self::new(&label, move |m| !self.matches(m))
    }

    pub fn matches(&self, message: &Message) -> bool {
        (self.predicate)(message)
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Filter({})", self.label)
    }
}
