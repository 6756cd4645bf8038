use crate::models::Conversation;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which lifecycle transition a `chatUpdate` event announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChatUpdateKind {
    Created,
    NewMessage,
    NewParticipant,
}

/// Server → client lifecycle events.
///
/// `created` and `newParticipant` are published globally — the recipient may
/// not yet be joined to a channel that did not exist for them. `newMessage`
/// and `dmDeleted` go to the conversation's own channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ChatEvent {
    #[serde(rename_all = "camelCase")]
    ChatUpdate {
        chat: Conversation,
        #[serde(rename = "type")]
        kind: ChatUpdateKind,
    },
    #[serde(rename_all = "camelCase")]
    DmDeleted {
        chat_id: Uuid,
        deleted_completely: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        deleted_by: Option<Vec<String>>,
    },
}

impl ChatEvent {
    pub fn chat_id(&self) -> Uuid {
        match self {
            ChatEvent::ChatUpdate { chat, .. } => chat.id,
            ChatEvent::DmDeleted { chat_id, .. } => *chat_id,
        }
    }
}

/// Client → server channel commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WsCommand {
    #[serde(rename_all = "camelCase")]
    JoinChat { chat_id: Uuid },
    #[serde(rename_all = "camelCase")]
    LeaveChat { chat_id: Uuid },
}
