use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of the reply requested for a message.
///
/// A message is created `Completed`. Dispatching a reply moves it to
/// `Pending`; the reply outcome settles it as `Completed`, `Failed` or
/// `Aborted`. Failed and aborted messages may be dispatched again. A
/// `Pending` status read back from storage has no reply behind it any more;
/// it is settled as `Aborted` when the chat is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    #[default]
    Completed,
    Failed,
    Aborted,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Completed => "completed",
            MessageStatus::Failed => "failed",
            MessageStatus::Aborted => "aborted",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(MessageStatus::Pending),
            "completed" => Some(MessageStatus::Completed),
            "failed" => Some(MessageStatus::Failed),
            "aborted" => Some(MessageStatus::Aborted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub sender: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "isAI")]
    pub is_ai: bool,
    #[serde(default)]
    pub status: MessageStatus,
}
