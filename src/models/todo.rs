use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoList {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: String,
    pub list_id: String,
    pub task: String,
    pub done: bool,
    pub order_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update for a todo item; unset fields are left untouched server-side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_key: Option<String>,
}

/// A todo operation requested from the chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TodoCommand {
    CreateList { name: String },
    DeleteList { list_id: String },
    AddItem { list_id: String, task: String },
    SetDone { item_id: String, done: bool },
    DeleteItem { item_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TodoEvent {
    ListCreated(TodoList),
    ItemSaved(TodoItem),
    Deleted { id: String },
}

/// Order key for an item appended at `at`. Keys compare lexicographically in
/// creation order.
pub fn order_key_at(at: DateTime<Utc>) -> String {
    format!("{:015}", at.timestamp_millis().max(0))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    #[test]
    fn test_order_keys_sort_by_creation() {
        let earlier = Utc.timestamp_millis_opt(999).unwrap();
        let later = earlier + Duration::milliseconds(1);
        assert_eq!(order_key_at(earlier), "000000000000999");
        assert!(order_key_at(earlier) < order_key_at(later));
    }
}
