//! Discussion transcripts and the session store.
//!
//! A [`Session`] holds the transcript of one discussion: an ordered list of
//! [`Message`]s with roles and timestamps. The [`SessionStore`] manages a
//! collection of sessions plus the notion of an active one: create, select,
//! append, and delete.
//!
//! # Architecture
//!
//! ```text
//! SessionStore
//!   ├── sessions: Vec<Session>     (in creation order)
//!   └── active: Option<Uuid>       (currently selected session)
//! Session
//!   ├── id, title, created_at, updated_at
//!   └── messages: Vec<Message>    (User | Assistant | System)
//! ```
//!
//! Appending to an empty store creates a session on the fly, titled from the
//! first message. Persistence lives in [`persistence`]: atomic JSON writes
//! with file locking and recovery from corrupted files.

pub mod persistence;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SeminarError};

/// Longest derived session title, in characters. Longer first messages are
/// truncated with a `...` suffix.
pub const TITLE_MAX_CHARS: usize = 20;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// The person driving the discussion.
    User,
    /// Replies produced by the study service.
    Assistant,
    /// Workflow narration: round markers, search notes, failures.
    System,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        };
        write!(f, "{name}")
    }
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Stable identifier, usable for later edits.
    pub id: Uuid,
    /// Who wrote it.
    pub role: MessageRole,
    /// The text.
    pub content: String,
    /// When it was added.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a message stamped with the current time.
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// One discussion transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Stable identifier.
    pub id: Uuid,
    /// Display title, derived from the first message unless set explicitly.
    pub title: String,
    /// Transcript entries in arrival order.
    pub messages: Vec<Message>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the transcript last changed.
    pub updated_at: DateTime<Utc>,
}

impl Session {
    fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }
}

/// Title for a session created from its first message.
fn derive_title(content: &str) -> String {
    let mut title: String = content.chars().take(TITLE_MAX_CHARS).collect();
    if content.chars().count() > TITLE_MAX_CHARS {
        title.push_str("...");
    }
    title
}

/// The collection of transcripts plus the active selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStore {
    sessions: Vec<Session>,
    active: Option<Uuid>,
}

impl SessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All sessions, in creation order.
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// Number of sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the store has no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Look up a session by id.
    pub fn get(&self, id: Uuid) -> Option<&Session> {
        self.sessions.iter().find(|session| session.id == id)
    }

    /// Id of the active session, if any.
    pub fn active_id(&self) -> Option<Uuid> {
        self.active
    }

    /// The active session, if any.
    pub fn active_session(&self) -> Option<&Session> {
        self.active.and_then(|id| self.get(id))
    }

    fn active_session_mut(&mut self) -> Option<&mut Session> {
        let id = self.active?;
        self.sessions.iter_mut().find(|session| session.id == id)
    }

    /// Create a session and make it active.
    ///
    /// Without an explicit title the session is numbered: `New discussion 1`,
    /// `New discussion 2`, and so on.
    pub fn create_session(&mut self, title: Option<&str>) -> Uuid {
        let title = match title {
            Some(title) => title.to_string(),
            None => format!("New discussion {}", self.sessions.len() + 1),
        };
        let session = Session::new(title);
        let id = session.id;
        self.sessions.push(session);
        self.active = Some(id);
        id
    }

    /// Make the session with `id` active.
    pub fn select(&mut self, id: Uuid) -> Result<()> {
        if self.get(id).is_none() {
            return Err(SeminarError::session(format!("no session with id {id}")));
        }
        self.active = Some(id);
        Ok(())
    }

    /// Append a message to the active session, creating one if needed.
    ///
    /// A session created this way takes its title from the message content,
    /// truncated to [`TITLE_MAX_CHARS`]. Returns the new message's id.
    pub fn add_message(&mut self, role: MessageRole, content: impl Into<String>) -> Uuid {
        let content = content.into();
        if self.active_session_mut().is_none() {
            let title = derive_title(&content);
            self.create_session(Some(&title));
        }
        let message = Message::new(role, content);
        let id = message.id;
        if let Some(session) = self.active_session_mut() {
            session.push(message);
        }
        id
    }

    /// Replace the content of a message in the active session.
    pub fn update_message(&mut self, id: Uuid, content: impl Into<String>) -> Result<()> {
        let session = self
            .active_session_mut()
            .ok_or_else(|| SeminarError::session("no active session"))?;
        let message = session
            .messages
            .iter_mut()
            .find(|message| message.id == id)
            .ok_or_else(|| SeminarError::session(format!("no message with id {id}")))?;
        message.content = content.into();
        session.updated_at = Utc::now();
        Ok(())
    }

    /// Drop every message in the active session, keeping the session itself.
    pub fn clear_messages(&mut self) {
        if let Some(session) = self.active_session_mut() {
            session.messages.clear();
            session.updated_at = Utc::now();
        }
    }

    /// Delete the session with `id`.
    ///
    /// Deleting the active session selects the first remaining one, if any.
    pub fn delete_session(&mut self, id: Uuid) -> Result<()> {
        let index = self
            .sessions
            .iter()
            .position(|session| session.id == id)
            .ok_or_else(|| SeminarError::session(format!("no session with id {id}")))?;
        self.sessions.remove(index);
        if self.active == Some(id) {
            self.active = self.sessions.first().map(|session| session.id);
        }
        Ok(())
    }
}
