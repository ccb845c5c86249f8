use anyhow::Result;
use chrono::NaiveDate;
use tempfile::tempdir;

use meeting_agent::chat::{SessionBacking, SessionKey, SessionStore};
use meeting_agent::llm::Message;
use meeting_agent::storage::{Database, NewMeeting, Repository, Todo};

fn new_meeting(title: &str) -> NewMeeting {
    NewMeeting {
        title: title.to_string(),
        description: "上线安排".to_string(),
        participants: vec!["Alice".to_string()],
        start_time: "2025-01-01 10:00".to_string(),
        end_time: "2025-01-01 10:30".to_string(),
        transcript: "Alice说：我们下周上线。".to_string(),
    }
}

#[test]
fn database_supports_core_meeting_workflow() -> Result<()> {
    let tmp = tempdir()?;
    let mut db = Database::open_path(&tmp.path().join("meetings.db"))?;
    let at = NaiveDate::from_ymd_opt(2025, 1, 1)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap();

    let meeting = db.insert_meeting(
        new_meeting("上线会议"),
        "会议决定下周上线。",
        &["Alice的任务是发布版本".to_string()],
        at,
    )?;
    assert_eq!(meeting.id, "meeting_20250101100000");

    db.replace_summary(&meeting.id, "新摘要", &[])?;
    let summary = db.get_summary(&meeting.id)?.expect("summary should exist");
    assert_eq!(summary.content, "新摘要");
    assert_eq!(summary.todos, vec!["Alice的任务是发布版本"]);

    let todo = Todo::new(meeting.id.clone(), "通知客户");
    db.insert_todo(&todo)?;
    let titles = db.sync_summary_todos(&meeting.id)?;
    assert_eq!(titles, vec!["Alice的任务是发布版本", "通知客户"]);

    let completed = db.complete_todo(&todo.id)?.expect("todo should exist");
    assert!(completed.completed_at.is_some());

    Ok(())
}

#[tokio::test]
async fn sessions_survive_a_restart() -> Result<()> {
    let tmp = tempdir()?;
    let path = tmp.path().join("meetings.db");

    {
        let repo = Repository::open_path(&path)?;
        let store = SessionStore::with_backing(std::sync::Arc::new(repo));
        let session = store.get_or_create("meeting_1", "s1")?;
        let turn = session.begin_turn(Message::user("你好")).await;
        turn.commit(Message::assistant("您好"))?;
    }

    let repo = Repository::open_path(&path)?;
    assert_eq!(
        repo.load(&SessionKey::new("meeting_1", "s1"))?,
        vec![Message::user("你好"), Message::assistant("您好")]
    );

    let store = SessionStore::with_backing(std::sync::Arc::new(repo));
    let session = store.get_or_create("meeting_1", "s1")?;
    assert_eq!(session.history().await.len(), 2);

    Ok(())
}
