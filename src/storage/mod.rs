//! Storage module for meeting-agent
//!
//! SQLite persistence for meetings, summaries, todos and chat history.

mod database;
mod models;
mod repository;

pub use database::Database;
pub use models::{meeting_id_at, Meeting, NewMeeting, Summary, Todo, MEETING_ID_PREFIX, TASK_MARKER};
pub use repository::Repository;
