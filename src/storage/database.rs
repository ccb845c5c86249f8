//! SQLite database management

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

use crate::config::Settings;
use crate::llm::{Message, Role};
use crate::storage::models::{meeting_id_at, Meeting, NewMeeting, Summary, Todo};

/// Database wrapper for meeting-agent
pub struct Database {
    conn: Connection,
}

const CURRENT_SCHEMA_VERSION: i64 = 1;

/// How long a writer waits on another connection's lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const MEETING_COLUMNS: &str =
    "id, title, description, participants, start_time, end_time, transcript, created_at";

const TODO_COLUMNS: &str =
    "id, meeting_id, title, description, list, assignee, completed_at, created_at, updated_at";

impl Database {
    /// Open or create the database
    pub fn open(settings: &Settings) -> Result<Self> {
        let db_path = settings.database_path();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        Self::open_path(&db_path)
    }

    /// Open database at a specific path
    pub fn open_path(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        let db = Self { conn };
        db.initialize()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    fn initialize(&self) -> Result<()> {
        self.conn.busy_timeout(BUSY_TIMEOUT)?;
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let current_version = self.schema_version()?;
        if current_version > CURRENT_SCHEMA_VERSION {
            anyhow::bail!(
                "Database schema version {} is newer than supported version {}",
                current_version,
                CURRENT_SCHEMA_VERSION
            );
        }

        if current_version < 1 {
            self.migrate_to_v1()?;
            self.set_schema_version(1)?;
        }

        Ok(())
    }

    /// Current schema version tracked in PRAGMA user_version.
    pub fn schema_version(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))?)
    }

    fn set_schema_version(&self, version: i64) -> Result<()> {
        self.conn
            .execute(&format!("PRAGMA user_version = {}", version), [])?;
        Ok(())
    }

    fn migrate_to_v1(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS meetings (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                participants TEXT NOT NULL DEFAULT '[]',
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                transcript TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS summaries (
                meeting_id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                todos TEXT NOT NULL DEFAULT '[]',
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (meeting_id) REFERENCES meetings(id) ON DELETE CASCADE
            );
            "#,
        )?;

        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS todos (
                id TEXT PRIMARY KEY,
                meeting_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                list TEXT NOT NULL,
                assignee TEXT,
                completed_at INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (meeting_id) REFERENCES meetings(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_todos_meeting_id
                ON todos(meeting_id);
            "#,
        )?;

        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS chat_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                meeting_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE (meeting_id, session_id, seq)
            );
            "#,
        )?;

        Ok(())
    }

    /// Insert a meeting with its summary and todos in one transaction.
    ///
    /// The id comes from `at`; if it is taken, the timestamp is advanced one
    /// second at a time until a free id is found.
    pub fn insert_meeting(
        &mut self,
        new: NewMeeting,
        summary: &str,
        todos: &[String],
        at: NaiveDateTime,
    ) -> Result<Meeting> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut at = at;
        let id = loop {
            let candidate = meeting_id_at(at);
            let taken: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM meetings WHERE id = ?1)",
                params![candidate],
                |row| row.get(0),
            )?;
            if !taken {
                break candidate;
            }
            at += TimeDelta::seconds(1);
        };

        let meeting = new.into_meeting(id);
        tx.execute(
            r#"
            INSERT INTO meetings (id, title, description, participants, start_time, end_time, transcript, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                meeting.id,
                meeting.title,
                meeting.description,
                serde_json::to_string(&meeting.participants)?,
                meeting.start_time,
                meeting.end_time,
                meeting.transcript,
                meeting.created_at.timestamp(),
            ],
        )?;

        let summary = Summary::new(meeting.id.clone(), summary, todos.to_vec());
        Self::write_summary(&tx, &summary)?;

        for line in todos {
            Self::write_todo(&tx, &Todo::from_summary_line(meeting.id.clone(), line))?;
        }

        tx.commit()?;
        Ok(meeting)
    }

    /// Get a meeting by ID
    pub fn get_meeting(&self, id: &str) -> Result<Option<Meeting>> {
        let meeting = self
            .conn
            .query_row(
                &format!("SELECT {} FROM meetings WHERE id = ?1", MEETING_COLUMNS),
                params![id],
                Self::row_to_meeting,
            )
            .optional()?;

        Ok(meeting)
    }

    /// List meetings in insertion order
    pub fn list_meetings(&self) -> Result<Vec<Meeting>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM meetings ORDER BY rowid",
            MEETING_COLUMNS
        ))?;

        let meetings = stmt
            .query_map([], Self::row_to_meeting)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(meetings)
    }

    /// Get the summary of a meeting
    pub fn get_summary(&self, meeting_id: &str) -> Result<Option<Summary>> {
        let summary = self
            .conn
            .query_row(
                "SELECT meeting_id, content, todos, updated_at FROM summaries WHERE meeting_id = ?1",
                params![meeting_id],
                |row| {
                    let todos_json: String = row.get(2)?;
                    Ok(Summary {
                        meeting_id: row.get(0)?,
                        content: row.get(1)?,
                        todos: serde_json::from_str(&todos_json).unwrap_or_default(),
                        updated_at: timestamp_column(row, 3)?,
                    })
                },
            )
            .optional()?;

        Ok(summary)
    }

    /// Replace the todo titles on a meeting's summary with the titles of all
    /// its todo records. Returns the new list.
    pub fn sync_summary_todos(&mut self, meeting_id: &str) -> Result<Vec<String>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let titles = Self::write_summary_todos(&tx, meeting_id)?;

        tx.commit()?;
        Ok(titles)
    }

    /// Store recomputed summary text. Action items extracted from it that have
    /// no todo record yet get one; the summary's todos are then the titles of
    /// all the meeting's records, so todos added by callers survive.
    pub fn replace_summary(
        &mut self,
        meeting_id: &str,
        content: &str,
        extracted: &[String],
    ) -> Result<Summary> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        for line in extracted {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM todos WHERE meeting_id = ?1 AND title = ?2)",
                params![meeting_id, line.trim()],
                |row| row.get(0),
            )?;
            if !exists {
                Self::write_todo(&tx, &Todo::from_summary_line(meeting_id, line))?;
            }
        }

        let mut summary = Summary::new(meeting_id, content, Vec::new());
        Self::write_summary(&tx, &summary)?;
        summary.todos = Self::write_summary_todos(&tx, meeting_id)?;

        tx.commit()?;
        Ok(summary)
    }

    fn write_summary_todos(conn: &Connection, meeting_id: &str) -> Result<Vec<String>> {
        let titles = {
            let mut stmt = conn.prepare(
                "SELECT title FROM todos WHERE meeting_id = ?1 ORDER BY created_at, rowid",
            )?;
            let titles = stmt
                .query_map(params![meeting_id], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            titles
        };

        conn.execute(
            r#"
            INSERT INTO summaries (meeting_id, content, todos, updated_at)
            VALUES (?1, '', ?2, ?3)
            ON CONFLICT(meeting_id) DO UPDATE SET todos = excluded.todos, updated_at = excluded.updated_at
            "#,
            params![meeting_id, serde_json::to_string(&titles)?, Utc::now().timestamp()],
        )?;

        Ok(titles)
    }

    /// Insert a todo
    pub fn insert_todo(&self, todo: &Todo) -> Result<()> {
        Self::write_todo(&self.conn, todo)
    }

    /// Get a todo by ID
    pub fn get_todo(&self, id: &str) -> Result<Option<Todo>> {
        let todo = self
            .conn
            .query_row(
                &format!("SELECT {} FROM todos WHERE id = ?1", TODO_COLUMNS),
                params![id],
                Self::row_to_todo,
            )
            .optional()?;

        Ok(todo)
    }

    /// Todos of a meeting, oldest first
    pub fn list_todos(&self, meeting_id: &str) -> Result<Vec<Todo>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM todos WHERE meeting_id = ?1 ORDER BY created_at, rowid",
            TODO_COLUMNS
        ))?;

        let todos = stmt
            .query_map(params![meeting_id], Self::row_to_todo)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(todos)
    }

    /// Mark a todo completed. Completing twice keeps the first timestamp.
    pub fn complete_todo(&self, id: &str) -> Result<Option<Todo>> {
        let now = Utc::now().timestamp();
        self.conn.execute(
            "UPDATE todos SET completed_at = COALESCE(completed_at, ?2), updated_at = ?2 WHERE id = ?1",
            params![id, now],
        )?;
        self.get_todo(id)
    }

    /// Append messages to a chat session after its last stored message
    pub fn append_chat_messages(
        &mut self,
        meeting_id: &str,
        session_id: &str,
        messages: &[Message],
    ) -> Result<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let next: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq) + 1, 0) FROM chat_messages WHERE meeting_id = ?1 AND session_id = ?2",
            params![meeting_id, session_id],
            |row| row.get(0),
        )?;

        let now = Utc::now().timestamp();
        for (offset, message) in messages.iter().enumerate() {
            tx.execute(
                r#"
                INSERT INTO chat_messages (meeting_id, session_id, seq, role, content, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    meeting_id,
                    session_id,
                    next + offset as i64,
                    message.role.as_str(),
                    message.content,
                    now,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Stored history of a chat session in order
    pub fn load_chat_messages(&self, meeting_id: &str, session_id: &str) -> Result<Vec<Message>> {
        let mut stmt = self.conn.prepare(
            "SELECT role, content FROM chat_messages
             WHERE meeting_id = ?1 AND session_id = ?2
             ORDER BY seq",
        )?;

        let rows = stmt
            .query_map(params![meeting_id, session_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(role, content)| {
                let role = role
                    .parse::<Role>()
                    .with_context(|| format!("Unknown chat role in database: {}", role))?;
                Ok(Message { role, content })
            })
            .collect()
    }

    fn write_summary(conn: &Connection, summary: &Summary) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO summaries (meeting_id, content, todos, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(meeting_id) DO UPDATE SET
                content = excluded.content,
                todos = excluded.todos,
                updated_at = excluded.updated_at
            "#,
            params![
                summary.meeting_id,
                summary.content,
                serde_json::to_string(&summary.todos)?,
                summary.updated_at.timestamp(),
            ],
        )?;
        Ok(())
    }

    fn write_todo(conn: &Connection, todo: &Todo) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO todos (id, meeting_id, title, description, list, assignee, completed_at, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                todo.id,
                todo.meeting_id,
                todo.title,
                todo.description,
                todo.list,
                todo.assignee,
                todo.completed_at.map(|t| t.timestamp()),
                todo.created_at.timestamp(),
                todo.updated_at.timestamp(),
            ],
        )?;
        Ok(())
    }

    fn row_to_meeting(row: &rusqlite::Row) -> rusqlite::Result<Meeting> {
        let participants_json: String = row.get(3)?;

        Ok(Meeting {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            participants: serde_json::from_str(&participants_json).unwrap_or_default(),
            start_time: row.get(4)?,
            end_time: row.get(5)?,
            transcript: row.get(6)?,
            created_at: timestamp_column(row, 7)?,
        })
    }

    fn row_to_todo(row: &rusqlite::Row) -> rusqlite::Result<Todo> {
        let completed_at = match row.get::<_, Option<i64>>(6)? {
            Some(ts) => Some(to_datetime(6, ts)?),
            None => None,
        };

        Ok(Todo {
            id: row.get(0)?,
            meeting_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            list: row.get(4)?,
            assignee: row.get(5)?,
            completed_at,
            created_at: timestamp_column(row, 7)?,
            updated_at: timestamp_column(row, 8)?,
        })
    }
}

fn timestamp_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    to_datetime(idx, row.get(idx)?)
}

fn to_datetime(idx: usize, ts: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn new_meeting(title: &str) -> NewMeeting {
        NewMeeting {
            title: title.to_string(),
            description: "上线计划".to_string(),
            participants: vec!["Alice".to_string(), "Bob".to_string()],
            start_time: "2025-01-01 10:00".to_string(),
            end_time: "2025-01-01 10:30".to_string(),
            transcript: "Alice说：我们下周上线。".to_string(),
        }
    }

    #[test]
    fn test_new_database_sets_schema_version() {
        let db = Database::open_memory().unwrap();
        assert_eq!(db.schema_version().unwrap(), 1);
    }

    #[test]
    fn test_insert_meeting_with_summary_and_todos() {
        let mut db = Database::open_memory().unwrap();
        let todos = vec!["Alice的任务是发布版本".to_string()];

        let meeting = db
            .insert_meeting(new_meeting("上线会议"), "摘要", &todos, at(10, 0, 0))
            .unwrap();
        assert_eq!(meeting.id, "meeting_20250101100000");

        let stored = db.get_meeting(&meeting.id).unwrap().unwrap();
        assert_eq!(stored.participants, vec!["Alice", "Bob"]);
        assert_eq!(stored.title, "上线会议");

        let summary = db.get_summary(&meeting.id).unwrap().unwrap();
        assert_eq!(summary.content, "摘要");
        assert_eq!(summary.todos, todos);

        let records = db.list_todos(&meeting.id).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].assignee.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_colliding_ids_advance_by_one_second() {
        let mut db = Database::open_memory().unwrap();
        let first = db
            .insert_meeting(new_meeting("a"), "s", &[], at(10, 0, 59))
            .unwrap();
        let second = db
            .insert_meeting(new_meeting("b"), "s", &[], at(10, 0, 59))
            .unwrap();

        assert_eq!(first.id, "meeting_20250101100059");
        assert_eq!(second.id, "meeting_20250101100100");

        let listed: Vec<String> = db.list_meetings().unwrap().into_iter().map(|m| m.id).collect();
        assert_eq!(listed, vec![first.id, second.id]);
    }

    #[test]
    fn test_list_keeps_insertion_order_not_id_order() {
        let mut db = Database::open_memory().unwrap();
        db.insert_meeting(new_meeting("later"), "s", &[], at(11, 0, 0))
            .unwrap();
        db.insert_meeting(new_meeting("earlier"), "s", &[], at(9, 0, 0))
            .unwrap();

        let titles: Vec<String> = db.list_meetings().unwrap().into_iter().map(|m| m.title).collect();
        assert_eq!(titles, vec!["later", "earlier"]);
    }

    #[test]
    fn test_summary_replace_is_last_write_wins() {
        let mut db = Database::open_memory().unwrap();
        let meeting = db
            .insert_meeting(
                new_meeting("m"),
                "first",
                &["x的任务是发布".to_string()],
                at(10, 0, 0),
            )
            .unwrap();

        db.replace_summary(&meeting.id, "second", &["x的任务是发布".to_string()])
            .unwrap();

        let summary = db.get_summary(&meeting.id).unwrap().unwrap();
        assert_eq!(summary.content, "second");
        assert_eq!(summary.todos, vec!["x的任务是发布"]);
        assert_eq!(db.list_todos(&meeting.id).unwrap().len(), 1);
    }

    #[test]
    fn test_todo_completion_and_summary_sync() {
        let mut db = Database::open_memory().unwrap();
        let meeting = db
            .insert_meeting(new_meeting("m"), "summary", &[], at(10, 0, 0))
            .unwrap();

        let todo = Todo::new(meeting.id.clone(), "写周报");
        db.insert_todo(&todo).unwrap();

        let done = db.complete_todo(&todo.id).unwrap().unwrap();
        assert!(done.is_completed());
        assert!(db.complete_todo("missing").unwrap().is_none());

        let titles = db.sync_summary_todos(&meeting.id).unwrap();
        assert_eq!(titles, vec!["写周报"]);
        let summary = db.get_summary(&meeting.id).unwrap().unwrap();
        assert_eq!(summary.content, "summary");
        assert_eq!(summary.todos, vec!["写周报"]);
    }

    #[test]
    fn test_todo_requires_existing_meeting() {
        let db = Database::open_memory().unwrap();
        assert!(db.insert_todo(&Todo::new("meeting_00000000000000", "x")).is_err());
    }

    #[test]
    fn test_chat_messages_append_in_sequence() {
        let mut db = Database::open_memory().unwrap();
        db.append_chat_messages("m", "s", &[Message::user("你好"), Message::assistant("您好")])
            .unwrap();
        db.append_chat_messages("m", "s", &[Message::user("总结一下"), Message::assistant("好的")])
            .unwrap();
        db.append_chat_messages("m", "other", &[Message::user("x")])
            .unwrap();

        let history = db.load_chat_messages("m", "s").unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["你好", "您好", "总结一下", "好的"]);
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(db.load_chat_messages("m", "other").unwrap().len(), 1);
    }

    #[test]
    fn test_reopening_keeps_data() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("meetings.db");

        {
            let mut db = Database::open_path(&path).unwrap();
            db.insert_meeting(new_meeting("persisted"), "s", &[], at(10, 0, 0))
                .unwrap();
        }

        let db = Database::open_path(&path).unwrap();
        assert_eq!(db.schema_version().unwrap(), 1);
        assert_eq!(db.list_meetings().unwrap()[0].title, "persisted");
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("future.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("PRAGMA user_version = 99;").unwrap();
        drop(conn);

        assert!(Database::open_path(&path).is_err());
    }
}
