//! Data models for storage

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix of every meeting id; the rest is the creation time as `YYYYMMDDHHMMSS`.
pub const MEETING_ID_PREFIX: &str = "meeting_";

/// Phrase the summary prompt asks the model to use for action items
/// (`小红的任务是扫地`); the text before it names the assignee.
pub const TASK_MARKER: &str = "的任务是";

/// Meeting id for a creation time.
pub fn meeting_id_at(at: NaiveDateTime) -> String {
    format!("{}{}", MEETING_ID_PREFIX, at.format("%Y%m%d%H%M%S"))
}

/// A summarized meeting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meeting {
    /// `meeting_<YYYYMMDDHHMMSS>`, fixed at creation
    pub id: String,

    pub title: String,

    /// Core agenda
    pub description: String,

    /// Distinct speakers in order of first appearance
    pub participants: Vec<String>,

    pub start_time: String,

    pub end_time: String,

    /// Full transcript text
    pub transcript: String,

    pub created_at: DateTime<Utc>,
}

/// Fields of a meeting before it has an id
#[derive(Debug, Clone, PartialEq)]
pub struct NewMeeting {
    pub title: String,
    pub description: String,
    pub participants: Vec<String>,
    pub start_time: String,
    pub end_time: String,
    pub transcript: String,
}

impl NewMeeting {
    pub fn into_meeting(self, id: String) -> Meeting {
        Meeting {
            id,
            title: self.title,
            description: self.description,
            participants: self.participants,
            start_time: self.start_time,
            end_time: self.end_time,
            transcript: self.transcript,
            created_at: Utc::now(),
        }
    }
}

/// The single summary of a meeting. Overwritten on recomputation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub meeting_id: String,
    pub content: String,
    pub todos: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl Summary {
    pub fn new(meeting_id: impl Into<String>, content: impl Into<String>, todos: Vec<String>) -> Self {
        Self {
            meeting_id: meeting_id.into(),
            content: content.into(),
            todos,
            updated_at: Utc::now(),
        }
    }
}

/// An action item attached to a meeting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    /// Unique identifier (UUID)
    pub id: String,

    pub meeting_id: String,

    pub title: String,

    pub description: String,

    /// Name of the list the todo belongs to
    pub list: String,

    pub assignee: Option<String>,

    pub completed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Todo {
    /// Default list for todos taken from a meeting summary
    pub const DEFAULT_LIST: &'static str = "meeting";

    /// Create an open todo
    pub fn new(meeting_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            meeting_id: meeting_id.into(),
            title: title.into(),
            description: String::new(),
            list: Self::DEFAULT_LIST.to_string(),
            assignee: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Todo for one action-item line of a summary. The assignee is the text
    /// before [`TASK_MARKER`] when the line has one.
    pub fn from_summary_line(meeting_id: impl Into<String>, line: &str) -> Self {
        let mut todo = Self::new(meeting_id, line.trim());
        todo.assignee = line
            .split_once(TASK_MARKER)
            .map(|(who, _)| who.trim().to_string())
            .filter(|who| !who.is_empty());
        todo
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}
