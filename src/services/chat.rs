//! Lifecycle controller for direct-message conversations.
//!
//! Implements the create / send / delete / revive / fork state machine on
//! top of the conversation store, and publishes a lifecycle event on the
//! channel broker after every state transition. Constructed once at startup
//! with its collaborators injected.

use crate::error::{AppError, AppResult};
use crate::models::{Conversation, Message, MessageKind};
use crate::services::identity::UserDirectory;
use crate::store::{ConversationStore, DeleteOutcome, SendOutcome};
use crate::websocket::events::{ChatEvent, ChatUpdateKind};
use crate::websocket::{ChannelBroker, Scope};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Input for a message append. `msg_date_time` is advisory client metadata;
/// ordering is append order, assigned by the server.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub sender: String,
    pub text: String,
    #[serde(default)]
    pub msg_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub kind: MessageKind,
}

impl NewMessage {
    fn into_message(self) -> Message {
        Message::new(self.sender, self.text, self.msg_date_time, self.kind)
    }
}

/// Outcome of a per-user soft delete.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReport {
    pub deleted_completely: bool,
    pub deleted_by: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanDeleteReport {
    pub can_delete: bool,
    pub deleted_by: Vec<String>,
}

pub struct ChatService {
    store: ConversationStore,
    broker: ChannelBroker,
    users: Arc<dyn UserDirectory>,
}

impl ChatService {
    pub fn new(
        store: ConversationStore,
        broker: ChannelBroker,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            store,
            broker,
            users,
        }
    }

    pub fn broker(&self) -> &ChannelBroker {
        &self.broker
    }

    /// Create a conversation in the Active state and announce it globally.
    pub async fn create_chat(
        &self,
        participants: Vec<String>,
        initial_messages: Vec<NewMessage>,
    ) -> AppResult<Conversation> {
        let unique: HashSet<&String> = participants.iter().collect();
        if participants.len() < 2 || unique.len() != participants.len() {
            return Err(AppError::Validation(
                "a chat needs at least two distinct participants".to_string(),
            ));
        }
        for username in &participants {
            self.require_known_user(username).await?;
        }

        let messages = initial_messages
            .into_iter()
            .map(NewMessage::into_message)
            .collect();
        let convo = self.store.create(participants, messages).await;

        tracing::info!(chat_id = %convo.id, "chat created");
        self.broker
            .publish(
                Scope::Global,
                &ChatEvent::ChatUpdate {
                    chat: convo.clone(),
                    kind: ChatUpdateKind::Created,
                },
            )
            .await?;

        Ok(convo)
    }

    /// Send a message into a conversation. The sender must be a known
    /// identity and a participant; nothing mutates otherwise.
    ///
    /// Routes through the state machine: plain append when nobody has
    /// soft-deleted, revival (markers cleared, history kept) when another
    /// participant had, and a fork into a fresh two-party conversation when
    /// the sender had deleted their own copy — the original record is left
    /// exactly as it was, so the pair ends up with two independently-active
    /// conversations. That literal "fresh start" behavior is intentional
    /// here; see DESIGN.md.
    pub async fn add_message(
        &self,
        chat_id: Uuid,
        message: NewMessage,
    ) -> AppResult<Conversation> {
        self.require_known_user(&message.sender).await?;

        let outcome = self.store.apply_send(chat_id, message.into_message()).await?;
        match &outcome {
            SendOutcome::Forked(fork) => {
                tracing::info!(original = %chat_id, fork = %fork.id, "send forked a fresh chat");
                self.broker
                    .publish(
                        Scope::Global,
                        &ChatEvent::ChatUpdate {
                            chat: fork.clone(),
                            kind: ChatUpdateKind::Created,
                        },
                    )
                    .await?;
            }
            SendOutcome::Revived(convo) => {
                tracing::info!(chat_id = %convo.id, "chat revived by new message");
                self.publish_new_message(convo).await?;
            }
            SendOutcome::Appended(convo) => {
                self.publish_new_message(convo).await?;
            }
        }

        Ok(outcome.conversation().clone())
    }

    async fn publish_new_message(&self, convo: &Conversation) -> AppResult<()> {
        self.broker
            .publish(
                Scope::Chat(convo.id),
                &ChatEvent::ChatUpdate {
                    chat: convo.clone(),
                    kind: ChatUpdateKind::NewMessage,
                },
            )
            .await
    }

    /// Soft-delete the conversation for one participant (idempotent). When
    /// the last participant's marker lands, the conversation and its
    /// messages are removed outright and `deletedCompletely` is reported.
    ///
    /// A delete that finds the record already gone — the usual cause being a
    /// concurrent participant completing the full deletion first — reports
    /// `deletedCompletely: true` rather than failing, keeping the operation
    /// idempotent under races.
    pub async fn delete_for_user(
        &self,
        chat_id: Uuid,
        username: &str,
    ) -> AppResult<DeleteReport> {
        match self.store.mark_deleted(chat_id, username).await? {
            DeleteOutcome::Partial(convo) => {
                let deleted_by = convo.deleted_usernames();
                self.broker
                    .publish(
                        Scope::Chat(chat_id),
                        &ChatEvent::DmDeleted {
                            chat_id,
                            deleted_completely: false,
                            deleted_by: Some(deleted_by.clone()),
                        },
                    )
                    .await?;
                Ok(DeleteReport {
                    deleted_completely: false,
                    deleted_by,
                })
            }
            DeleteOutcome::Removed => {
                tracing::info!(%chat_id, "chat removed after mutual deletion");
                self.broker
                    .publish(
                        Scope::Chat(chat_id),
                        &ChatEvent::DmDeleted {
                            chat_id,
                            deleted_completely: true,
                            deleted_by: None,
                        },
                    )
                    .await?;
                Ok(DeleteReport {
                    deleted_completely: true,
                    deleted_by: Vec::new(),
                })
            }
            DeleteOutcome::AlreadyRemoved => Ok(DeleteReport {
                deleted_completely: true,
                deleted_by: Vec::new(),
            }),
        }
    }

    /// Add a participant. Leaves `deleted_by` untouched and announces the
    /// change globally, since the new participant has no channel yet.
    pub async fn add_participant(
        &self,
        chat_id: Uuid,
        username: &str,
    ) -> AppResult<Conversation> {
        self.require_known_user(username).await?;
        let convo = self.store.add_participant(chat_id, username).await?;

        self.broker
            .publish(
                Scope::Global,
                &ChatEvent::ChatUpdate {
                    chat: convo.clone(),
                    kind: ChatUpdateKind::NewParticipant,
                },
            )
            .await?;

        Ok(convo)
    }

    pub async fn get_chat(&self, chat_id: Uuid) -> AppResult<Conversation> {
        self.store.get(chat_id).await
    }

    /// The user's visible conversation list: ones they participate in and
    /// have not soft-deleted, most recently updated first.
    pub async fn chats_for_user(&self, username: &str) -> AppResult<Vec<Conversation>> {
        Ok(self.store.list_for_user(username).await)
    }

    pub async fn can_delete(&self, chat_id: Uuid) -> AppResult<CanDeleteReport> {
        let convo = self.store.get(chat_id).await?;
        Ok(CanDeleteReport {
            can_delete: convo.all_deleted(),
            deleted_by: convo.deleted_usernames(),
        })
    }

    async fn require_known_user(&self, username: &str) -> AppResult<()> {
        if self.users.user_exists(username).await? {
            Ok(())
        } else {
            Err(AppError::Validation(format!("unknown user: {username}")))
        }
    }
}
