use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which party a transcript fragment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single entry in the conversation transcript.
///
/// While `is_final` is false the content is still being refined by the
/// speech recognizer and may be replaced wholesale; once final, the entry is
/// closed and never mutated again.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub content: String,
    pub is_final: bool,
    /// When this entry was last updated.
    pub received_at: DateTime<Utc>,
}

/// Folds the stream of partial/final transcript messages into an ordered log.
///
/// Merge rules:
/// - a partial for role R replaces the latest still-open entry for R (found
///   by scanning from the end), or appends a new open entry if none exists;
/// - a final for role R closes the latest open entry for R, or appends an
///   already-closed entry if none is open. Closed entries are never touched.
///
/// At most one open entry per role exists at any time.
#[derive(Debug, Default, Clone)]
pub struct TranscriptLog {
    entries: Vec<TranscriptEntry>,
}

impl TranscriptLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, role: Role, content: String, is_final: bool) {
        let received_at = Utc::now();
        let open_idx = self
            .entries
            .iter()
            .rposition(|e| e.role == role && !e.is_final);

        match open_idx {
            Some(idx) => {
                let entry = &mut self.entries[idx];
                entry.content = content;
                entry.is_final = is_final;
                entry.received_at = received_at;
            }
            None => self.entries.push(TranscriptEntry {
                role,
                content,
                is_final,
                received_at,
            }),
        }
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Owned copy for consumers that outlive the log's next mutation.
    pub fn snapshot(&self) -> Vec<TranscriptEntry> {
        self.entries.clone()
    }

    /// Entries that will never change again, for permanent display.
    pub fn finalized(&self) -> impl Iterator<Item = &TranscriptEntry> {
        self.entries.iter().filter(|e| e.is_final)
    }

    /// The in-progress entry for a role, if any, for live caption rendering.
    pub fn open_entry(&self, role: Role) -> Option<&TranscriptEntry> {
        self.entries.iter().rev().find(|e| e.role == role && !e.is_final)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
