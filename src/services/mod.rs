pub mod chat;
pub mod identity;

pub use chat::{CanDeleteReport, ChatService, DeleteReport, NewMessage};
pub use identity::{OpenUserDirectory, StaticUserDirectory, UserDirectory};
