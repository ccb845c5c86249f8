//! Repository pattern wrapper for database operations
//!
//! Every operation opens its own connection, so callers on different tasks
//! never share a connection and only contend inside SQLite's own locking.

use anyhow::Result;
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

use crate::chat::{SessionBacking, SessionKey};
use crate::config::Settings;
use crate::llm::Message;
use crate::storage::{Database, Meeting, NewMeeting, Summary, Todo};
use crate::AgentError;

/// Repository for meetings, summaries, todos and chat history
#[derive(Debug, Clone)]
pub struct Repository {
    db_path: PathBuf,
}

impl Repository {
    /// Create a repository at the configured database path, running migrations
    pub fn new(settings: &Settings) -> Result<Self> {
        Database::open(settings)?;
        Ok(Self {
            db_path: settings.database_path(),
        })
    }

    /// Create a repository on a specific database file
    pub fn open_path(path: &Path) -> Result<Self> {
        Database::open_path(path)?;
        Ok(Self {
            db_path: path.to_path_buf(),
        })
    }

    fn db(&self) -> Result<Database> {
        Database::open_path(&self.db_path)
    }

    /// Store a fully summarized meeting along with its summary and todos
    pub fn create_meeting(
        &self,
        meeting: NewMeeting,
        summary: &str,
        todos: &[String],
        at: NaiveDateTime,
    ) -> Result<Meeting> {
        self.db()?.insert_meeting(meeting, summary, todos, at)
    }

    pub fn get_meeting(&self, id: &str) -> Result<Option<Meeting>> {
        self.db()?.get_meeting(id)
    }

    /// Like [`Repository::get_meeting`] but a miss is a `NotFound` error
    pub fn require_meeting(&self, id: &str) -> Result<Meeting> {
        self.get_meeting(id)?
            .ok_or_else(|| AgentError::NotFound(format!("meeting {}", id)).into())
    }

    /// All meetings in insertion order
    pub fn list_meetings(&self) -> Result<Vec<Meeting>> {
        self.db()?.list_meetings()
    }

    pub fn get_summary(&self, meeting_id: &str) -> Result<Option<Summary>> {
        self.db()?.get_summary(meeting_id)
    }

    /// Store recomputed summary text, keeping the meeting's todo records as
    /// the source of its todo list
    pub fn replace_summary(
        &self,
        meeting_id: &str,
        content: &str,
        extracted: &[String],
    ) -> Result<Summary> {
        self.db()?.replace_summary(meeting_id, content, extracted)
    }

    /// Add a todo to an existing meeting
    pub fn create_todo(&self, todo: &Todo) -> Result<()> {
        self.require_meeting(&todo.meeting_id)?;
        self.db()?.insert_todo(todo)
    }

    pub fn list_todos(&self, meeting_id: &str) -> Result<Vec<Todo>> {
        self.db()?.list_todos(meeting_id)
    }

    /// Mark a todo done and return it
    pub fn complete_todo(&self, id: &str) -> Result<Todo> {
        self.db()?
            .complete_todo(id)?
            .ok_or_else(|| AgentError::NotFound(format!("todo {}", id)).into())
    }

    /// Point the meeting's summary todos at its todo records
    pub fn sync_summary_todos(&self, meeting_id: &str) -> Result<Vec<String>> {
        self.db()?.sync_summary_todos(meeting_id)
    }
}

impl SessionBacking for Repository {
    fn load(&self, key: &SessionKey) -> Result<Vec<Message>> {
        self.db()?.load_chat_messages(&key.meeting_id, &key.session_id)
    }

    fn persist(&self, key: &SessionKey, messages: &[Message]) -> Result<()> {
        self.db()?
            .append_chat_messages(&key.meeting_id, &key.session_id, messages)
    }
}
