//! Append-only conversation log.
//!
//! The log starts with a welcome placeholder that is removed exactly once
//! when the first real entry arrives. After that, entries are only ever
//! appended; nothing is edited or removed.

use chrono::Local;
use std::fmt;

/// Who or what produced a conversation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Status and lifecycle notices.
    System,
    /// Something the user sent.
    User,
    /// An AI response.
    Ai,
    /// A failure surfaced to the user.
    Error,
}

impl EntryKind {
    fn label(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "you",
            Self::Ai => "ai",
            Self::Error => "error",
        }
    }
}

/// One rendered line of the conversation.
#[derive(Debug, Clone)]
pub struct ConversationEntry {
    pub kind: EntryKind,
    pub content: String,
    /// Display timestamp. Server-provided when available, local otherwise.
    pub timestamp: String,
}

impl fmt::Display for ConversationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.timestamp,
            self.kind.label(),
            self.content
        )
    }
}

/// Append-only list of conversation entries.
#[derive(Debug)]
pub struct ConversationLog {
    entries: Vec<ConversationEntry>,
    placeholder_present: bool,
    appended: u64,
}

impl ConversationLog {
    /// Create a log seeded with the welcome placeholder.
    pub fn new(welcome_message: &str) -> Self {
        Self {
            entries: vec![ConversationEntry {
                kind: EntryKind::System,
                content: welcome_message.to_owned(),
                timestamp: local_timestamp(),
            }],
            placeholder_present: true,
            appended: 0,
        }
    }

    /// Append an entry, removing the welcome placeholder on the first call.
    ///
    /// `timestamp` is the peer-provided display time; when absent the local
    /// time of the append is used. Returns the entry as stored.
    pub fn append(
        &mut self,
        kind: EntryKind,
        content: impl Into<String>,
        timestamp: Option<String>,
    ) -> &ConversationEntry {
        if self.placeholder_present {
            self.entries.clear();
            self.placeholder_present = false;
        }
        self.entries.push(ConversationEntry {
            kind,
            content: content.into(),
            timestamp: timestamp.unwrap_or_else(local_timestamp),
        });
        self.appended += 1;
        // push above guarantees non-empty
        &self.entries[self.entries.len() - 1]
    }

    /// Count of real appends since creation (the placeholder excluded).
    pub fn total_appended(&self) -> u64 {
        self.appended
    }

    /// All entries in append order.
    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn local_timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}
