use crate::models::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Soft-deletion marker for a single participant. Set semantics per
/// username within a conversation: re-adding is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionRecord {
    pub username: String,
    pub deleted_at: DateTime<Utc>,
}

/// A direct-message conversation between a fixed set of participants.
///
/// Invariant: `deleted_by.len() <= participants.len()`, and a conversation
/// with the two counts equal is never stored — the store removes it in the
/// same operation that would produce that state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    pub participants: Vec<String>,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub deleted_by: Vec<DeletionRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(participants: Vec<String>, messages: Vec<Message>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            participants,
            messages,
            deleted_by: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_participant(&self, username: &str) -> bool {
        self.participants.iter().any(|p| p == username)
    }

    pub fn is_deleted_by(&self, username: &str) -> bool {
        self.deleted_by.iter().any(|d| d.username == username)
    }

    /// Usernames that have soft-deleted their copy, in marker order.
    pub fn deleted_usernames(&self) -> Vec<String> {
        self.deleted_by.iter().map(|d| d.username.clone()).collect()
    }

    /// True when every participant has soft-deleted. A retrievable record
    /// never satisfies this (the store removes it first), but the check is
    /// computed honestly rather than hardcoded.
    pub fn all_deleted(&self) -> bool {
        self.participants
            .iter()
            .all(|p| self.is_deleted_by(p))
    }
}
