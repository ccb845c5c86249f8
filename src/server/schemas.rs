//! Request and response bodies of the HTTP API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::storage::{Meeting, Todo};
use crate::tools::{TodoInput, ToolSpec};

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateMeetingResponse {
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeetingList {
    pub meetings: Vec<MeetingEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeetingEntry {
    pub id: String,
    pub content: MeetingContent,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeetingContent {
    pub title: String,
    pub description: String,
    pub participants: Vec<String>,
    pub start_time: String,
    pub end_time: String,
    /// Transcript
    pub content: String,
}

impl From<Meeting> for MeetingEntry {
    fn from(m: Meeting) -> Self {
        Self {
            id: m.id,
            content: MeetingContent {
                title: m.title,
                description: m.description,
                participants: m.participants,
                start_time: m.start_time,
                end_time: m.end_time,
                content: m.transcript,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub meeting_id: Option<String>,
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub content: String,
    pub todos: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    pub meeting_id: Option<String>,
    pub session_id: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TodoQuery {
    pub meeting_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTodosRequest {
    #[serde(default)]
    pub meeting_id: String,
    #[serde(default)]
    pub todos: Vec<TodoInput>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TodoList {
    pub todos: Vec<Todo>,
}

#[derive(Debug, Serialize)]
pub struct ToolList {
    pub tools: Vec<ToolSpec>,
}

#[derive(Debug, Deserialize)]
pub struct InvokeToolRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}
