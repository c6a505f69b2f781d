//! Bounded per-session conversation memory.
//!
//! Each session keeps at most `max_messages` entries; the oldest entry is
//! dropped first. Sessions live in a map behind a read-write lock and every
//! session log has its own mutex, so appends to different sessions do not
//! wait on each other while appends to one session are serialized.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::DEFAULT_MAX_MESSAGES;

/// Length of the document preview shown in the context string.
const DOC_REFERENCE_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("User"),
            Role::Assistant => f.write_str("Assistant"),
        }
    }
}

/// One remembered message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub document_context: Vec<String>,
}

type SessionLog = Arc<Mutex<VecDeque<Message>>>;

pub struct ConversationMemory {
    sessions: RwLock<HashMap<String, SessionLog>>,
    max_messages: usize,
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGES)
    }
}

impl ConversationMemory {
    pub fn new(max_messages: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_messages: max_messages.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.max_messages
    }

    fn session(&self, session_id: &str) -> Option<SessionLog> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned()
    }

    /// Append a message, evicting the oldest one when over capacity.
    ///
    /// The map lock is held until the push completes, so a concurrent
    /// `clear` either runs first or removes the message with the log.
    pub fn append(
        &self,
        session_id: &str,
        role: Role,
        content: impl Into<String>,
        document_context: &[String],
    ) {
        let message = Message {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            document_context: document_context.to_vec(),
        };

        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(log) = sessions.get(session_id) {
            self.push(session_id, log, message);
            return;
        }
        drop(sessions);

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let log = sessions.entry(session_id.to_string()).or_insert_with(|| {
            Arc::new(Mutex::new(VecDeque::with_capacity(self.max_messages + 1)))
        });
        self.push(session_id, log, message);
    }

    fn push(&self, session_id: &str, log: &SessionLog, message: Message) {
        let role = message.role;
        let mut messages = log.lock().unwrap_or_else(PoisonError::into_inner);
        messages.push_back(message);
        while messages.len() > self.max_messages {
            messages.pop_front();
        }

        debug!(
            session = session_id,
            size = messages.len(),
            "Added {} message to memory",
            role
        );
    }

    /// Ordered copy of the session log; empty for unknown sessions.
    pub fn history(&self, session_id: &str) -> Vec<Message> {
        self.session(session_id)
            .map(|log| {
                log.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .iter()
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Render the last `max_messages` messages for prompting.
    pub fn context_string(&self, session_id: &str, max_messages: usize) -> String {
        let history = self.history(session_id);
        let start = history.len().saturating_sub(max_messages);
        let mut lines = Vec::new();

        for msg in &history[start..] {
            lines.push(format!("{}: {}", msg.role, msg.content));
            if !msg.document_context.is_empty() {
                let refs: Vec<String> = msg
                    .document_context
                    .iter()
                    .map(|doc| {
                        let preview: String = doc.chars().take(DOC_REFERENCE_CHARS).collect();
                        format!("{}...", preview)
                    })
                    .collect();
                lines.push(format!("Document References: {}", refs.join(", ")));
            }
        }

        lines.join("\n")
    }

    /// Remove a session. Unknown sessions are ignored.
    pub fn clear(&self, session_id: &str) {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id);
        if removed.is_some() {
            info!("Cleared memory for session {}", session_id);
        }
    }

    pub fn session_count(&self, session_id: &str) -> usize {
        self.session(session_id)
            .map(|log| log.lock().unwrap_or_else(PoisonError::into_inner).len())
            .unwrap_or(0)
    }

    /// Ids of all live sessions, sorted.
    pub fn sessions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}
