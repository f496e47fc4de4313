use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use crate::models::{Chat, ChatSummary};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),

    #[error("Unknown message status: {0}")]
    UnknownStatus(String),

    #[error("Chat not stored: {0}")]
    UnknownChat(String),

    #[error("{0} is not supported by this store")]
    Unsupported(&'static str),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Durable write-through mirror of every chat.
///
/// Calls complete without suspending the caller. Writers in separate
/// processes are not coordinated: the last write for a chat id wins.
pub trait ChatRepository: Send + Sync {
    /// All stored chats, oldest first.
    fn read_all(&self) -> Result<Vec<Chat>, PersistenceError>;

    /// Upsert by id. Writing the same value twice is indistinguishable from
    /// writing it once.
    fn write(&self, chat: &Chat) -> Result<(), PersistenceError>;

    fn read(&self, id: &str) -> Result<Option<Chat>, PersistenceError> {
        Ok(self.read_all()?.into_iter().find(|c| c.id == id))
    }

    fn summaries(&self) -> Result<Vec<ChatSummary>, PersistenceError> {
        Ok(self.read_all()?.iter().map(ChatSummary::from).collect())
    }

    fn set_pinned(&self, _id: &str, _pinned: bool) -> Result<(), PersistenceError> {
        Err(PersistenceError::Unsupported("Pinning"))
    }
}

/// Stored timestamp format: RFC 3339 with millisecond precision, UTC.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, PersistenceError> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_round_trip_keeps_millis() {
        let ts = Utc.timestamp_millis_opt(1_714_557_600_123).unwrap();
        let text = format_timestamp(&ts);
        assert_eq!(text, "2024-05-01T10:00:00.123Z");
        assert_eq!(parse_timestamp(&text).unwrap(), ts);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(PersistenceError::Timestamp(_))
        ));
    }
}
