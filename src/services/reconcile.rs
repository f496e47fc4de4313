use std::collections::HashMap;

use uuid::Uuid;

use super::store::{append_optimistic, with_status, ChatError};
use crate::models::{Chat, Message, MessageStatus};
use crate::providers::{ReplyOutcome, ReplyRequest};

/// Handle for one dispatched reply. The token is compared against the
/// reconciler's pending token for the message when the outcome arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTicket {
    pub token: String,
    pub chat_id: String,
    pub message_id: String,
    pub request: ReplyRequest,
}

#[derive(Debug)]
pub enum Reconciliation {
    /// Reply appended; the triggering message is completed.
    Completed { chat: Chat, reply: Message },
    /// Triggering message marked failed; nothing appended.
    Failed { chat: Chat, error: ChatError },
    /// Triggering message marked aborted; nothing appended.
    Aborted { chat: Chat },
    /// The ticket is no longer the pending one for its message.
    Discarded,
}

/// Tracks which reply is pending for each message and folds reply outcomes
/// into the latest chat state.
#[derive(Debug, Default)]
pub struct Reconciler {
    pending: HashMap<String, String>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self, message_id: &str) -> bool {
        self.pending.contains_key(message_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Mark `message_id` pending and issue the ticket for its reply. Must run
    /// after the optimistic append and before the request goes out.
    pub fn dispatch(&mut self, chat: &Chat, message_id: &str, user: &str) -> Result<(Chat, ReplyTicket), ChatError> {
        let message = chat
            .message(message_id)
            .ok_or_else(|| ChatError::UnknownMessage(message_id.to_string()))?;
        if self.is_pending(message_id) {
            return Err(ChatError::AlreadyPending(message_id.to_string()));
        }

        let request = ReplyRequest {
            chat_id: chat.id.clone(),
            message_id: message_id.to_string(),
            content: message.content.clone(),
            user: user.to_string(),
            opens_chat: chat.messages.first().map(|m| m.id.as_str()) == Some(message_id),
        };
        let next = with_status(chat, message_id, MessageStatus::Pending)
            .ok_or_else(|| ChatError::UnknownMessage(message_id.to_string()))?;

        let token = Uuid::new_v4().to_string();
        self.pending.insert(message_id.to_string(), token.clone());

        tracing::debug!("Dispatching reply for message {} in chat {}", message_id, chat.id);
        Ok((
            next,
            ReplyTicket {
                token,
                chat_id: chat.id.clone(),
                message_id: message_id.to_string(),
                request,
            },
        ))
    }

    /// Abort the reply for `message_id`. A message still marked pending is
    /// aborted even when its reply is no longer tracked. Returns `None` when
    /// there was nothing to abort.
    pub fn abort(&mut self, current: &Chat, message_id: &str) -> Option<Chat> {
        let tracked = self.pending.remove(message_id).is_some();
        let marked = current.message(message_id)?.status == MessageStatus::Pending;
        if !tracked && !marked {
            return None;
        }
        tracing::info!("Aborted reply for message {}", message_id);
        with_status(current, message_id, MessageStatus::Aborted)
    }

    /// Settle every pending message of `chat` that has no reply in flight,
    /// e.g. after a restart. Returns `None` when nothing changed.
    pub fn settle_orphans(&self, chat: &Chat) -> Option<Chat> {
        let orphans: Vec<&str> = chat
            .messages
            .iter()
            .filter(|m| m.status == MessageStatus::Pending && !self.is_pending(&m.id))
            .map(|m| m.id.as_str())
            .collect();
        if orphans.is_empty() {
            return None;
        }

        tracing::warn!("Chat {} has {} unanswered pending message(s)", chat.id, orphans.len());
        let mut next = chat.clone();
        for id in orphans {
            next = with_status(&next, id, MessageStatus::Aborted)?;
        }
        Some(next)
    }

    /// Apply `outcome` to `current`, which must be the chat's state at the
    /// time the outcome arrived rather than the one captured at dispatch.
    pub fn apply(&mut self, current: &Chat, ticket: &ReplyTicket, outcome: ReplyOutcome) -> Reconciliation {
        if self.pending.get(&ticket.message_id) != Some(&ticket.token) {
            tracing::debug!(
                "Discarding stale reply outcome for message {}",
                ticket.message_id
            );
            return Reconciliation::Discarded;
        }
        self.pending.remove(&ticket.message_id);

        if current.id != ticket.chat_id || current.message(&ticket.message_id).is_none() {
            tracing::warn!(
                "Reply outcome for message {} does not match chat {}",
                ticket.message_id,
                current.id
            );
            return Reconciliation::Discarded;
        }

        match outcome {
            ReplyOutcome::Completed(payload) => {
                let Some(settled) = with_status(current, &ticket.message_id, MessageStatus::Completed) else {
                    return Reconciliation::Discarded;
                };
                let (chat, reply) = append_optimistic(&settled, &payload.content, &payload.sender, true);
                Reconciliation::Completed { chat, reply }
            }
            ReplyOutcome::Failed(reason) => match with_status(current, &ticket.message_id, MessageStatus::Failed) {
                Some(chat) => Reconciliation::Failed {
                    chat,
                    error: ChatError::ReplyFailed {
                        message_id: ticket.message_id.clone(),
                        reason,
                    },
                },
                None => Reconciliation::Discarded,
            },
            ReplyOutcome::Aborted => match with_status(current, &ticket.message_id, MessageStatus::Aborted) {
                Some(chat) => Reconciliation::Aborted { chat },
                None => Reconciliation::Discarded,
            },
        }
    }
}
