use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::SOS_TEXT;
use crate::error::{CoreError, Result};
use crate::time::now_unix_millis;
use crate::urgency::is_urgent;

/// One chat entry. Urgency is decided once, at creation, and never revised.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    /// Zero-based insertion position; the only ordering the log defines.
    pub sequence: u64,
    pub text: String,
    pub urgent: bool,
    pub timestamp_ms: u64,
}

/// Append-only chat log. Entries are never updated or removed.
#[derive(Clone, Debug, Default)]
pub struct MessageLog {
    entries: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a log from persisted entries, checking that sequences are
    /// contiguous from zero and every text is already trimmed and non-empty.
    pub fn restore(entries: Vec<Message>) -> Result<Self> {
        for (i, msg) in entries.iter().enumerate() {
            if msg.sequence != i as u64 {
                return Err(CoreError::CorruptLog(format!(
                    "expected sequence {i}, found {}",
                    msg.sequence
                )));
            }
            if msg.text.is_empty() || msg.text.trim() != msg.text {
                return Err(CoreError::CorruptLog(format!(
                    "entry {i} has untrimmed or empty text"
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Append a user message. The text is trimmed; blank input is rejected
    /// and leaves the log untouched.
    pub fn append(&mut self, text: &str) -> Result<Message> {
        self.append_at(text, now_unix_millis())
    }

    /// [`append`](Self::append) with an explicit timestamp.
    pub fn append_at(&mut self, text: &str, timestamp_ms: u64) -> Result<Message> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CoreError::EmptyMessage);
        }
        Ok(self.push(text.to_string(), is_urgent(text), timestamp_ms))
    }

    /// Append the fixed SOS broadcast. Always urgent, always succeeds.
    pub fn append_sos(&mut self) -> Message {
        self.append_sos_at(now_unix_millis())
    }

    pub fn append_sos_at(&mut self, timestamp_ms: u64) -> Message {
        self.push(SOS_TEXT.to_string(), true, timestamp_ms)
    }

    fn push(&mut self, text: String, urgent: bool, timestamp_ms: u64) -> Message {
        let msg = Message {
            id: Uuid::new_v4(),
            sequence: self.entries.len() as u64,
            text,
            urgent,
            timestamp_ms,
        };
        self.entries.push(msg.clone());
        msg
    }

    /// All entries in insertion order.
    pub fn all(&self) -> &[Message] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn urgent(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().filter(|m| m.urgent)
    }
}
