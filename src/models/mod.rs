pub mod conversation;
pub mod message;

pub use conversation::{Conversation, DeletionRecord};
pub use message::{Message, MessageKind};
