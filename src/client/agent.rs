//! Client-side notification agent.
//!
//! A long-lived session process that keeps the user's live view in sync
//! with the conversation lifecycle: it subscribes to the broker, joins the
//! channel of every conversation visible to the user (on start and on a
//! fixed refresh interval), joins immediately on any event naming an
//! unknown conversation (revival and fork discovery, faster than the
//! polling interval), and raises alerts for qualifying new messages.
//!
//! The joined-channel set is a session-scoped cache with no invalidation:
//! it only grows, and is dropped with the session. Both background tasks
//! share one stop handle; a refresh that completes after stop discards its
//! result.

use crate::error::AppResult;
use crate::models::MessageKind;
use crate::services::ChatService;
use crate::websocket::events::{ChatEvent, ChatUpdateKind};
use crate::websocket::{ChannelBroker, SubscriberId};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// User-facing alert for an incoming direct message. `chat_id` is the
/// click-through navigation target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmAlert {
    pub chat_id: Uuid,
    pub sender: String,
    pub preview: String,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub username: String,
    pub refresh_interval: Duration,
    pub preview_max_chars: usize,
}

pub struct NotificationAgent;

impl NotificationAgent {
    /// Register with the broker and spawn the refresh and event tasks.
    /// Returns the session handle and the alert stream.
    pub async fn start(
        config: AgentConfig,
        chats: Arc<ChatService>,
        broker: ChannelBroker,
    ) -> (AgentHandle, UnboundedReceiver<DmAlert>) {
        let (subscriber_id, events) = broker.register().await;
        let (alerts_tx, alerts_rx) = unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);

        let joined: Arc<Mutex<HashSet<Uuid>>> = Arc::new(Mutex::new(HashSet::new()));
        let on_dm_screen = Arc::new(AtomicBool::new(false));

        let refresh_task = tokio::spawn(run_refresh_loop(
            config.clone(),
            chats,
            broker.clone(),
            subscriber_id,
            joined.clone(),
            stop_rx.clone(),
        ));

        let event_task = tokio::spawn(run_event_loop(
            config,
            broker.clone(),
            subscriber_id,
            events,
            joined.clone(),
            on_dm_screen.clone(),
            alerts_tx,
            stop_rx,
        ));

        let handle = AgentHandle {
            stop: stop_tx,
            refresh_task,
            event_task,
            subscriber_id,
            broker,
            joined,
            on_dm_screen,
        };

        (handle, alerts_rx)
    }
}

/// Stop handle and session-scoped state for a running agent.
pub struct AgentHandle {
    stop: watch::Sender<bool>,
    refresh_task: JoinHandle<()>,
    event_task: JoinHandle<()>,
    subscriber_id: SubscriberId,
    broker: ChannelBroker,
    joined: Arc<Mutex<HashSet<Uuid>>>,
    on_dm_screen: Arc<AtomicBool>,
}

impl AgentHandle {
    /// Mark whether the user's active view is the DM screen; alerts for
    /// incoming messages are suppressed while it is.
    pub fn set_on_dm_screen(&self, on: bool) {
        self.on_dm_screen.store(on, Ordering::Relaxed);
    }

    pub async fn joined_channels(&self) -> HashSet<Uuid> {
        self.joined.lock().await.clone()
    }

    /// Tear the session down: both tasks observe the stop signal at their
    /// next suspension point, then the broker registration is removed. No
    /// further work runs after this returns.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        let _ = self.refresh_task.await;
        let _ = self.event_task.await;
        self.broker.disconnect(self.subscriber_id).await;
    }
}

async fn run_refresh_loop(
    config: AgentConfig,
    chats: Arc<ChatService>,
    broker: ChannelBroker,
    subscriber_id: SubscriberId,
    joined: Arc<Mutex<HashSet<Uuid>>>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(config.refresh_interval);
    loop {
        tokio::select! {
            _ = stop_rx.changed() => break,
            _ = ticker.tick() => {}
        }

        let result = chats.chats_for_user(&config.username).await;

        // The session may have ended while the fetch was in flight; its
        // result must not touch the membership set in that case.
        if *stop_rx.borrow() {
            break;
        }

        match result {
            Ok(visible) => {
                let ids: Vec<Uuid> = visible.iter().map(|c| c.id).collect();
                if let Err(e) =
                    join_unknown(&broker, subscriber_id, &joined, ids).await
                {
                    tracing::debug!(error = %e, "channel join failed during refresh");
                }
            }
            // Background refreshes swallow failures; the next tick retries.
            Err(e) => tracing::debug!(error = %e, "conversation list refresh failed"),
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_event_loop(
    config: AgentConfig,
    broker: ChannelBroker,
    subscriber_id: SubscriberId,
    mut events: UnboundedReceiver<String>,
    joined: Arc<Mutex<HashSet<Uuid>>>,
    on_dm_screen: Arc<AtomicBool>,
    alerts: UnboundedSender<DmAlert>,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        let payload = tokio::select! {
            _ = stop_rx.changed() => break,
            maybe = events.recv() => match maybe {
                Some(payload) => payload,
                None => break,
            },
        };

        let event: ChatEvent = match serde_json::from_str(&payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable lifecycle event");
                continue;
            }
        };

        if let Err(e) = handle_event(
            &config,
            &broker,
            subscriber_id,
            &joined,
            &on_dm_screen,
            &alerts,
            event,
        )
        .await
        {
            tracing::debug!(error = %e, "event handling failed");
        }
    }
}

async fn handle_event(
    config: &AgentConfig,
    broker: &ChannelBroker,
    subscriber_id: SubscriberId,
    joined: &Mutex<HashSet<Uuid>>,
    on_dm_screen: &AtomicBool,
    alerts: &UnboundedSender<DmAlert>,
    event: ChatEvent,
) -> AppResult<()> {
    match event {
        ChatEvent::ChatUpdate { chat, kind } => {
            // Global events announce other users' conversations too.
            if !chat.has_participant(&config.username) {
                return Ok(());
            }

            join_unknown(broker, subscriber_id, joined, [chat.id]).await?;

            if kind == ChatUpdateKind::NewMessage {
                let Some(last) = chat.messages.last() else {
                    return Ok(());
                };
                let suppressed = last.sender == config.username
                    || last.kind != MessageKind::Direct
                    || on_dm_screen.load(Ordering::Relaxed);
                if !suppressed {
                    let _ = alerts.send(DmAlert {
                        chat_id: chat.id,
                        sender: last.sender.clone(),
                        preview: truncate_preview(&last.text, config.preview_max_chars),
                    });
                }
            }
        }
        ChatEvent::DmDeleted { chat_id, .. } => {
            join_unknown(broker, subscriber_id, joined, [chat_id]).await?;
        }
    }
    Ok(())
}

/// Join every listed conversation channel not already joined. The local
/// membership set only grows during a session run.
async fn join_unknown(
    broker: &ChannelBroker,
    subscriber_id: SubscriberId,
    joined: &Mutex<HashSet<Uuid>>,
    chat_ids: impl IntoIterator<Item = Uuid>,
) -> AppResult<()> {
    let mut guard = joined.lock().await;
    for chat_id in chat_ids {
        if guard.insert(chat_id) {
            broker.join(subscriber_id, chat_id).await;
            tracing::debug!(%chat_id, "joined conversation channel");
        }
    }
    Ok(())
}

fn truncate_preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut preview: String = text.chars().take(max_chars).collect();
        preview.push('…');
        preview
    }
}
