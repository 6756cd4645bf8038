use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Content-kind tag carried on every message. The lifecycle only treats
/// `direct` specially (it is the only kind that produces client alerts).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MessageKind {
    #[default]
    #[serde(rename = "direct")]
    Direct,
    #[serde(rename = "broadcast")]
    Broadcast,
    #[serde(rename = "system-intro")]
    SystemIntro,
    #[serde(rename = "attachment-ref")]
    AttachmentRef,
}

/// A single message, owned by exactly one conversation once appended.
/// Immutable after creation. Order within a conversation is append order;
/// `msg_date_time` is advisory metadata only (client clocks skew).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub sender: String,
    pub text: String,
    pub msg_date_time: DateTime<Utc>,
    #[serde(default)]
    pub kind: MessageKind,
}

impl Message {
    pub fn new(
        sender: impl Into<String>,
        text: impl Into<String>,
        msg_date_time: Option<DateTime<Utc>>,
        kind: MessageKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: sender.into(),
            text: text.into(),
            msg_date_time: msg_date_time.unwrap_or_else(Utc::now),
            kind,
        }
    }
}
