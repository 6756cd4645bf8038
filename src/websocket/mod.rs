use crate::error::AppResult;
use crate::websocket::events::ChatEvent;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

pub mod events;

/// Unique identifier for a registered subscriber connection.
///
/// Each connection gets a unique id when it registers, which allows precise
/// cleanup of its channel memberships when it disconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Where an event is delivered: one conversation's channel, or every
/// registered connection.
#[derive(Debug, Clone, Copy)]
pub enum Scope {
    Chat(Uuid),
    Global,
}

#[derive(Default)]
struct BrokerInner {
    // subscriber -> outbound channel (also the global fanout list)
    connections: HashMap<SubscriberId, UnboundedSender<String>>,
    // conversation -> joined subscribers
    channels: HashMap<Uuid, HashSet<SubscriberId>>,
    // subscriber -> joined conversations, for disconnect cleanup
    memberships: HashMap<SubscriberId, HashSet<Uuid>>,
}

impl BrokerInner {
    fn remove(&mut self, subscriber: SubscriberId) {
        self.connections.remove(&subscriber);
        if let Some(chats) = self.memberships.remove(&subscriber) {
            for chat_id in chats {
                if let Some(members) = self.channels.get_mut(&chat_id) {
                    members.remove(&subscriber);
                    if members.is_empty() {
                        self.channels.remove(&chat_id);
                    }
                }
            }
        }
    }
}

/// Realtime channel broker: one logical channel per conversation id.
///
/// Delivery contract: connected subscribers at publish time receive the
/// event once; there is no persistence or replay of missed events. A
/// disconnected client reconciles by re-fetching its conversation list.
///
/// Constructed once at startup and passed by reference to everything that
/// publishes or subscribes (no process-wide singleton).
#[derive(Default, Clone)]
pub struct ChannelBroker {
    inner: Arc<RwLock<BrokerInner>>,
}

impl ChannelBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. Returns its id and the receiving end of its
    /// event stream. Registered connections receive globally-published
    /// events immediately; channel events require a `join`.
    pub async fn register(&self) -> (SubscriberId, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        let subscriber = SubscriberId::new();

        let mut guard = self.inner.write().await;
        guard.connections.insert(subscriber, tx);
        guard.memberships.insert(subscriber, HashSet::new());

        tracing::debug!(?subscriber, total = guard.connections.len(), "subscriber registered");
        (subscriber, rx)
    }

    pub async fn join(&self, subscriber: SubscriberId, chat_id: Uuid) {
        let mut guard = self.inner.write().await;
        if !guard.connections.contains_key(&subscriber) {
            return;
        }
        guard.channels.entry(chat_id).or_default().insert(subscriber);
        guard
            .memberships
            .entry(subscriber)
            .or_default()
            .insert(chat_id);
    }

    pub async fn leave(&self, subscriber: SubscriberId, chat_id: Uuid) {
        let mut guard = self.inner.write().await;
        if let Some(members) = guard.channels.get_mut(&chat_id) {
            members.remove(&subscriber);
            if members.is_empty() {
                guard.channels.remove(&chat_id);
            }
        }
        if let Some(chats) = guard.memberships.get_mut(&subscriber) {
            chats.remove(&chat_id);
        }
    }

    /// Remove a connection and all of its channel memberships. Must be
    /// called when the connection closes to prevent routing-table leaks.
    pub async fn disconnect(&self, subscriber: SubscriberId) {
        let mut guard = self.inner.write().await;
        guard.remove(subscriber);
        tracing::debug!(?subscriber, remaining = guard.connections.len(), "subscriber disconnected");
    }

    /// Serialize the event once and deliver it to every subscriber in
    /// scope. Dead senders (closed receivers) are pruned on send failure.
    pub async fn publish(&self, scope: Scope, event: &ChatEvent) -> AppResult<()> {
        let payload = serde_json::to_string(event)?;
        let mut guard = self.inner.write().await;

        let targets: Vec<SubscriberId> = match scope {
            Scope::Global => guard.connections.keys().copied().collect(),
            Scope::Chat(chat_id) => guard
                .channels
                .get(&chat_id)
                .map(|members| members.iter().copied().collect())
                .unwrap_or_default(),
        };

        let mut dead = Vec::new();
        for subscriber in targets {
            if let Some(sender) = guard.connections.get(&subscriber) {
                if sender.send(payload.clone()).is_err() {
                    dead.push(subscriber);
                }
            }
        }

        for subscriber in dead {
            guard.remove(subscriber);
            tracing::debug!(?subscriber, "pruned dead subscriber during publish");
        }

        Ok(())
    }

    pub async fn subscriber_count(&self, chat_id: Uuid) -> usize {
        let guard = self.inner.read().await;
        guard.channels.get(&chat_id).map(|m| m.len()).unwrap_or(0)
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }
}
