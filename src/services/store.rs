use std::sync::Arc;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::persistence::{ChatRepository, PersistenceError};
use crate::models::{Chat, Message, MessageStatus};

pub const AI_SENDER: &str = "AI Assistant";

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Chat not found: {0}")]
    NotFound(String),

    #[error("Message not found: {0}")]
    UnknownMessage(String),

    #[error("Reply already pending for message {0}")]
    AlreadyPending(String),

    #[error("Reply for message {message_id} failed: {reason}")]
    ReplyFailed { message_id: String, reason: String },

    #[error("Could not read chats: {0}")]
    PersistenceReadFailed(#[source] PersistenceError),

    #[error("Chat saved in memory only: {0}")]
    PersistenceWriteFailed(#[source] PersistenceError),
}

/// Current time at the millisecond precision chats are stored with.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// A timestamp strictly after `previous`, following the wall clock when it
/// has moved on.
pub fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = now();
    if now > previous {
        now
    } else {
        previous + Duration::milliseconds(1)
    }
}

/// Truncate text to a short title for chats.
pub fn truncate_title(text: &str) -> String {
    let first_line = text.trim().lines().next().unwrap_or_default();
    if first_line.chars().count() > 50 {
        let head: String = first_line.chars().take(47).collect();
        format!("{}...", head)
    } else {
        first_line.to_string()
    }
}

fn build_message(content: &str, sender: &str, is_ai: bool, timestamp: DateTime<Utc>) -> Message {
    Message {
        id: Uuid::new_v4().to_string(),
        content: content.to_string(),
        sender: sender.to_string(),
        timestamp,
        is_ai,
        status: MessageStatus::Completed,
    }
}

/// Start a chat from its first message.
pub fn new_chat(first_message: &str, sender: &str) -> (Chat, Message) {
    let created_at = now();
    let message = build_message(first_message, sender, false, created_at);
    let chat = Chat {
        id: Uuid::new_v4().to_string(),
        title: truncate_title(first_message),
        messages: vec![message.clone()],
        created_at,
        updated_at: created_at,
    };
    (chat, message)
}

/// Append a freshly built message, returning the new chat value and the
/// message. `chat` itself is left as it was.
pub fn append_optimistic(chat: &Chat, content: &str, sender: &str, is_ai: bool) -> (Chat, Message) {
    let updated_at = next_timestamp(chat.updated_at);
    let message = build_message(content, sender, is_ai, updated_at);

    let mut next = chat.clone();
    next.messages.push(message.clone());
    next.updated_at = updated_at;
    (next, message)
}

/// Move one message to `status`. Returns `None` when the chat has no such
/// message.
pub fn with_status(chat: &Chat, message_id: &str, status: MessageStatus) -> Option<Chat> {
    let index = chat.messages.iter().position(|m| m.id == message_id)?;
    let mut next = chat.clone();
    next.messages[index].status = status;
    next.updated_at = next_timestamp(chat.updated_at);
    Some(next)
}

/// Holds the single chat currently on screen and mirrors every committed
/// state into the repository.
pub struct ChatStore {
    repo: Arc<dyn ChatRepository>,
    current: Option<Chat>,
}

impl ChatStore {
    pub fn new(repo: Arc<dyn ChatRepository>) -> Self {
        Self { repo, current: None }
    }

    pub fn repository(&self) -> &Arc<dyn ChatRepository> {
        &self.repo
    }

    pub fn current(&self) -> Option<&Chat> {
        self.current.as_ref()
    }

    /// Make the chat with `id` the current one.
    pub fn load(&mut self, id: &str) -> Result<&Chat, ChatError> {
        let chat = self
            .repo
            .read(id)
            .map_err(ChatError::PersistenceReadFailed)?
            .ok_or_else(|| ChatError::NotFound(id.to_string()))?;
        Ok(self.current.insert(chat))
    }

    /// Latest known state of chat `id`: the in-memory copy when it is the
    /// current chat, otherwise the stored one.
    pub fn latest(&self, id: &str) -> Result<Chat, ChatError> {
        if let Some(chat) = self.current.as_ref().filter(|c| c.id == id) {
            return Ok(chat.clone());
        }
        self.repo
            .read(id)
            .map_err(ChatError::PersistenceReadFailed)?
            .ok_or_else(|| ChatError::NotFound(id.to_string()))
    }

    /// Accept `chat` as the newest state and write it through.
    ///
    /// The in-memory state is updated before the write, so a failed write
    /// leaves the session consistent and only durability is lost. A chat
    /// other than the current one is written without replacing it.
    pub fn commit(&mut self, chat: Chat) -> Result<(), ChatError> {
        let result = self.repo.write(&chat);
        if self.current.as_ref().map_or(true, |c| c.id == chat.id) {
            self.current = Some(chat);
        }
        result.map_err(ChatError::PersistenceWriteFailed)
    }

    /// Switch to a chat that is not stored yet and write it through.
    pub fn open_new(&mut self, chat: Chat) -> Result<(), ChatError> {
        self.current = None;
        self.commit(chat)
    }

    pub fn close(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::services::database::Database;

    fn sample_chat(messages: usize) -> Chat {
        let (mut chat, _) = new_chat("first", "alice");
        for i in 1..messages {
            chat = append_optimistic(&chat, &format!("message {}", i), "alice", false).0;
        }
        chat
    }

    struct FailingRepository;

    impl ChatRepository for FailingRepository {
        fn read_all(&self) -> Result<Vec<Chat>, PersistenceError> {
            Ok(Vec::new())
        }

        fn write(&self, _chat: &Chat) -> Result<(), PersistenceError> {
            Err(PersistenceError::Io(std::io::Error::other("disk full")))
        }
    }

    #[derive(Default)]
    struct RecordingRepository {
        writes: Mutex<Vec<Chat>>,
    }

    impl ChatRepository for RecordingRepository {
        fn read_all(&self) -> Result<Vec<Chat>, PersistenceError> {
            Ok(self.writes.lock().unwrap().clone())
        }

        fn write(&self, chat: &Chat) -> Result<(), PersistenceError> {
            self.writes.lock().unwrap().push(chat.clone());
            Ok(())
        }
    }

    #[test]
    fn test_append_ping_to_two_message_chat() {
        let chat = sample_chat(2);
        let (next, msg) = append_optimistic(&chat, "ping", "bob", false);

        assert_eq!(next.messages.len(), 3);
        let last = next.last_message().unwrap();
        assert_eq!(last, &msg);
        assert_eq!(last.content, "ping");
        assert_eq!(last.sender, "bob");
        assert!(!last.is_ai);
        assert!(next.updated_at > chat.updated_at);
    }

    #[test]
    fn test_append_leaves_prior_messages_untouched() {
        let mut chat = sample_chat(1);
        for i in 0..20 {
            let (next, _) = append_optimistic(&chat, &format!("m{}", i), "alice", i % 2 == 0);
            assert_eq!(next.messages.len(), chat.messages.len() + 1);
            assert_eq!(&next.messages[..chat.messages.len()], &chat.messages[..]);
            assert!(next.updated_at > chat.updated_at);
            chat = next;
        }
        let mut ids: Vec<_> = chat.messages.iter().map(|m| m.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), chat.messages.len());
    }

    #[test]
    fn test_append_does_not_touch_input_value() {
        let chat = sample_chat(2);
        let before = chat.clone();
        let _ = append_optimistic(&chat, "x", "bob", false);
        assert_eq!(chat, before);
    }

    #[test]
    fn test_next_timestamp_is_strictly_increasing() {
        let future = now() + Duration::seconds(60);
        assert_eq!(next_timestamp(future), future + Duration::milliseconds(1));
    }

    #[test]
    fn test_updated_at_never_before_created_at() {
        let (chat, _) = new_chat("hello", "alice");
        assert_eq!(chat.created_at, chat.updated_at);
        let (next, _) = append_optimistic(&chat, "again", "alice", false);
        assert!(next.updated_at >= next.created_at);
    }

    #[test]
    fn test_with_status_bumps_updated_at() {
        let chat = sample_chat(1);
        let id = chat.messages[0].id.clone();
        let next = with_status(&chat, &id, MessageStatus::Failed).unwrap();
        assert_eq!(next.messages[0].status, MessageStatus::Failed);
        assert_eq!(next.messages[0].content, chat.messages[0].content);
        assert!(next.updated_at > chat.updated_at);
        assert!(with_status(&chat, "nope", MessageStatus::Failed).is_none());
    }

    #[test]
    fn test_truncate_title() {
        assert_eq!(truncate_title("Short title"), "Short title");
        assert_eq!(truncate_title("line one\nline two"), "line one");
        let long = "a".repeat(80);
        let title = truncate_title(&long);
        assert_eq!(title.chars().count(), 50);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn test_load_missing_then_create_scenario() {
        let db = Arc::new(Database::new_in_memory().unwrap());
        let mut store = ChatStore::new(db.clone());

        assert!(matches!(store.load("x"), Err(ChatError::NotFound(id)) if id == "x"));

        let (mut chat, _) = new_chat("hi", "alice");
        chat.id = "x".to_string();
        store.open_new(chat).unwrap();

        let all = db.read_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].messages.len(), 1);
        assert_eq!(store.load("x").unwrap().messages[0].sender, "alice");
    }

    #[test]
    fn test_commit_keeps_memory_state_when_write_fails() {
        let mut store = ChatStore::new(Arc::new(FailingRepository));
        let (chat, _) = new_chat("hi", "alice");

        let err = store.open_new(chat.clone()).unwrap_err();
        assert!(matches!(err, ChatError::PersistenceWriteFailed(_)));
        assert_eq!(store.current(), Some(&chat));
    }

    #[test]
    fn test_commit_of_other_chat_keeps_current() {
        let repo = Arc::new(RecordingRepository::default());
        let mut store = ChatStore::new(repo.clone());
        let (shown, _) = new_chat("shown", "alice");
        let (background, _) = new_chat("background", "alice");

        store.open_new(shown.clone()).unwrap();
        store.commit(background.clone()).unwrap();

        assert_eq!(store.current().map(|c| c.id.as_str()), Some(shown.id.as_str()));
        assert_eq!(repo.writes.lock().unwrap().len(), 2);
        assert_eq!(store.latest(&background.id).unwrap(), background);
    }
}
