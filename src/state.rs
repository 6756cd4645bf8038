use crate::{config::Config, services::ChatService, websocket::ChannelBroker};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub chats: Arc<ChatService>,
    pub broker: ChannelBroker,
    pub config: Arc<Config>,
}
