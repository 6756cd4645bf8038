//! In-process conversation store.
//!
//! Every mutation runs as a single field-scoped operation inside one
//! write-lock critical section, so all mutations on one conversation are
//! linearized by the store. This is what keeps the idempotent-delete and
//! revival transitions race-safe without any external locking: two
//! participants racing to place the final deletion marker both observe a
//! coherent count, and the loser of the race sees the record already gone.

use crate::error::{AppError, AppResult};
use crate::models::{Conversation, DeletionRecord, Message};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Result of routing a send through the state machine (§ lifecycle):
/// plain append, revival of a partially-deleted conversation, or a fork
/// into a brand-new conversation when the sender had deleted their copy.
#[derive(Debug, Clone)]
pub enum SendOutcome {
    Appended(Conversation),
    Revived(Conversation),
    Forked(Conversation),
}

impl SendOutcome {
    pub fn conversation(&self) -> &Conversation {
        match self {
            SendOutcome::Appended(c) | SendOutcome::Revived(c) | SendOutcome::Forked(c) => c,
        }
    }
}

/// Result of adding a soft-deletion marker.
#[derive(Debug, Clone)]
pub enum DeleteOutcome {
    /// Some participants have not deleted yet; the record survives.
    Partial(Conversation),
    /// The marker completed the set: the conversation and all its messages
    /// were removed within the same critical section.
    Removed,
    /// No record under that id. Benign: a racing participant already
    /// completed the full deletion (or the id never existed).
    AlreadyRemoved,
}

/// Durable (process-lifetime) record of conversations and their messages.
/// Exclusively owns `Conversation` and `Message` lifetime.
#[derive(Default, Clone)]
pub struct ConversationStore {
    inner: Arc<RwLock<HashMap<Uuid, Conversation>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(
        &self,
        participants: Vec<String>,
        initial_messages: Vec<Message>,
    ) -> Conversation {
        let convo = Conversation::new(participants, initial_messages);
        let mut guard = self.inner.write().await;
        guard.insert(convo.id, convo.clone());
        convo
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Conversation> {
        let guard = self.inner.read().await;
        guard.get(&id).cloned().ok_or(AppError::NotFound)
    }

    pub async fn append_message(&self, id: Uuid, message: Message) -> AppResult<Conversation> {
        let mut guard = self.inner.write().await;
        let convo = guard.get_mut(&id).ok_or(AppError::NotFound)?;
        convo.messages.push(message);
        convo.updated_at = Utc::now();
        Ok(convo.clone())
    }

    /// Route a send through the lifecycle state machine in one critical
    /// section, so the branch taken cannot be invalidated by a concurrent
    /// delete or send:
    ///
    /// - sender had soft-deleted their copy → fork: a new two-party
    ///   conversation holding only this message; the original is untouched;
    /// - someone else had soft-deleted → revival: clear every marker, then
    ///   append (full history preserved);
    /// - otherwise → plain append.
    pub async fn apply_send(&self, id: Uuid, message: Message) -> AppResult<SendOutcome> {
        let mut guard = self.inner.write().await;
        let convo = guard.get_mut(&id).ok_or(AppError::NotFound)?;

        // Only participants can send: revival clears every deletion marker,
        // so an outsider's append must not be able to undo a soft delete.
        if !convo.has_participant(&message.sender) {
            return Err(AppError::Validation(format!(
                "{} is not a participant",
                message.sender
            )));
        }

        if convo.is_deleted_by(&message.sender) {
            let other = convo
                .participants
                .iter()
                .find(|p| **p != message.sender)
                .cloned()
                .ok_or_else(|| {
                    AppError::Validation("conversation has no other participant".to_string())
                })?;
            let fork = Conversation::new(vec![message.sender.clone(), other], vec![message]);
            guard.insert(fork.id, fork.clone());
            return Ok(SendOutcome::Forked(fork));
        }

        let revived = !convo.deleted_by.is_empty();
        convo.deleted_by.clear();
        convo.messages.push(message);
        convo.updated_at = Utc::now();

        if revived {
            Ok(SendOutcome::Revived(convo.clone()))
        } else {
            Ok(SendOutcome::Appended(convo.clone()))
        }
    }

    pub async fn add_participant(&self, id: Uuid, username: &str) -> AppResult<Conversation> {
        let mut guard = self.inner.write().await;
        let convo = guard.get_mut(&id).ok_or(AppError::NotFound)?;
        if convo.has_participant(username) {
            return Err(AppError::Validation(format!(
                "{username} is already a participant"
            )));
        }
        convo.participants.push(username.to_string());
        convo.updated_at = Utc::now();
        Ok(convo.clone())
    }

    /// Add a soft-deletion marker (idempotent per username). When the marker
    /// set covers every participant the record and its messages are removed
    /// in the same critical section — the fully-deleted state is never
    /// stored.
    pub async fn mark_deleted(&self, id: Uuid, username: &str) -> AppResult<DeleteOutcome> {
        let mut guard = self.inner.write().await;
        let Some(convo) = guard.get_mut(&id) else {
            return Ok(DeleteOutcome::AlreadyRemoved);
        };

        // Only participants can hold markers, which is what keeps
        // |deleted_by| <= |participants| at every observed state.
        if !convo.has_participant(username) {
            return Err(AppError::Validation(format!(
                "{username} is not a participant"
            )));
        }

        if !convo.is_deleted_by(username) {
            convo.deleted_by.push(DeletionRecord {
                username: username.to_string(),
                deleted_at: Utc::now(),
            });
            convo.updated_at = Utc::now();
        }

        if convo.deleted_by.len() == convo.participants.len() {
            guard.remove(&id);
            Ok(DeleteOutcome::Removed)
        } else {
            Ok(DeleteOutcome::Partial(convo.clone()))
        }
    }

    /// Remove a conversation and everything it owns.
    pub async fn delete_entirely(&self, id: Uuid) -> AppResult<()> {
        let mut guard = self.inner.write().await;
        guard.remove(&id).map(|_| ()).ok_or(AppError::NotFound)
    }

    /// The per-user visible view: conversations the user participates in and
    /// has not soft-deleted, most recently updated first. Conversations
    /// soft-deleted by *other* participants are still included.
    pub async fn list_for_user(&self, username: &str) -> Vec<Conversation> {
        let guard = self.inner.read().await;
        let mut visible: Vec<Conversation> = guard
            .values()
            .filter(|c| c.has_participant(username) && !c.is_deleted_by(username))
            .cloned()
            .collect();
        visible.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        visible
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
