use std::cmp::Ordering;

use tokio::sync::watch;

use super::persistence::{ChatRepository, PersistenceError};
use crate::models::ChatSummary;

/// Read-only, eventually consistent list of chat summaries, as a live query
/// on the sync engine's chats shape would deliver it.
pub trait ChatSummarySource: Send + Sync {
    fn subscribe(&self) -> watch::Receiver<Vec<ChatSummary>>;

    fn snapshot(&self) -> Vec<ChatSummary> {
        self.subscribe().borrow().clone()
    }
}

/// Summary feed backed by the local repository. Publishing replaces the whole
/// list; subscribers only ever observe complete snapshots.
pub struct SummaryFeed {
    tx: watch::Sender<Vec<ChatSummary>>,
}

impl SummaryFeed {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self { tx }
    }

    pub fn publish(&self, mut summaries: Vec<ChatSummary>) {
        sort_summaries(&mut summaries);
        self.tx.send_replace(summaries);
    }

    pub fn refresh_from(&self, repo: &dyn ChatRepository) -> Result<(), PersistenceError> {
        self.publish(repo.summaries()?);
        Ok(())
    }
}

impl Default for SummaryFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSummarySource for SummaryFeed {
    fn subscribe(&self) -> watch::Receiver<Vec<ChatSummary>> {
        self.tx.subscribe()
    }
}

/// Pinned first, then newest first. Entries equal on both keys keep their
/// incoming order; that order is not part of the contract.
pub fn compare_summaries(a: &ChatSummary, b: &ChatSummary) -> Ordering {
    b.pinned
        .cmp(&a.pinned)
        .then_with(|| b.created_at.cmp(&a.created_at))
}

pub fn sort_summaries(summaries: &mut [ChatSummary]) {
    summaries.sort_by(compare_summaries);
}

/// Split an already sorted list into (pinned, unpinned).
pub fn partition_pinned(summaries: Vec<ChatSummary>) -> (Vec<ChatSummary>, Vec<ChatSummary>) {
    summaries.into_iter().partition(|s| s.pinned)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::services::database::Database;
    use crate::services::store::new_chat;

    fn summary(id: &str, pinned: bool, offset_secs: i64) -> ChatSummary {
        ChatSummary {
            id: id.to_string(),
            name: id.to_string(),
            pinned,
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(offset_secs),
        }
    }

    #[test]
    fn test_pinned_first_then_newest() {
        let mut list = vec![
            summary("old", false, 0),
            summary("pinned-old", true, 1),
            summary("new", false, 10),
            summary("pinned-new", true, 5),
        ];
        sort_summaries(&mut list);
        let ids: Vec<_> = list.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["pinned-new", "pinned-old", "new", "old"]);

        let (pinned, unpinned) = partition_pinned(list);
        assert_eq!(pinned.len(), 2);
        assert_eq!(unpinned.len(), 2);
        assert!(pinned.iter().all(|s| s.pinned));
    }

    #[test]
    fn test_equal_keys_compare_equal() {
        let a = summary("a", true, 3);
        let b = summary("b", true, 3);
        assert_eq!(compare_summaries(&a, &b), Ordering::Equal);
    }

    #[tokio::test]
    async fn test_feed_publishes_sorted_snapshots() {
        let feed = SummaryFeed::new();
        let mut rx = feed.subscribe();
        assert!(rx.borrow().is_empty());

        feed.publish(vec![summary("a", false, 0), summary("b", true, 0)]);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow()[0].id, "b");
        assert_eq!(feed.snapshot().len(), 2);
    }

    #[test]
    fn test_refresh_from_repository() {
        let db = Database::new_in_memory().unwrap();
        let (chat, _) = new_chat("hello world", "alice");
        db.write(&chat).unwrap();

        let feed = SummaryFeed::new();
        feed.refresh_from(&db).unwrap();

        let snapshot = feed.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].name, "hello world");
        assert!(!snapshot[0].pinned);
    }
}
