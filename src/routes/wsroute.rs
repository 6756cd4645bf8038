//! WebSocket route: one session actor per connection.
//!
//! The session registers with the channel broker before the actor starts,
//! forwards the broker's event stream to the socket, and handles the
//! `joinChat` / `leaveChat` commands. Heartbeat: ping every 5s, drop the
//! connection after 30s without a pong.

use crate::state::AppState;
use crate::websocket::events::WsCommand;
use crate::websocket::{ChannelBroker, SubscriberId};
use actix::{Actor, ActorContext, AsyncContext, Handler, Message as ActixMessage, StreamHandler};
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub username: Option<String>,
}

#[derive(ActixMessage)]
#[rtype(result = "()")]
struct BroadcastMessage(String);

struct WsSession {
    subscriber_id: SubscriberId,
    broker: ChannelBroker,
    username: Option<String>,
    hb: Instant,
    // Taken in started() and forwarded into the socket.
    events: Option<UnboundedReceiver<String>>,
}

impl WsSession {
    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                tracing::warn!("WebSocket heartbeat failed, disconnecting");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            username = self.username.as_deref().unwrap_or("<anonymous>"),
            subscriber = ?self.subscriber_id,
            "WebSocket session started"
        );

        self.hb(ctx);

        // Forward broker events to the socket.
        if let Some(mut rx) = self.events.take() {
            let addr = ctx.address();
            actix::spawn(async move {
                while let Some(payload) = rx.recv().await {
                    addr.do_send(BroadcastMessage(payload));
                }
            });
        }
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(subscriber = ?self.subscriber_id, "WebSocket session stopped");

        let broker = self.broker.clone();
        let subscriber_id = self.subscriber_id;
        actix::spawn(async move {
            broker.disconnect(subscriber_id).await;
        });
    }
}

impl Handler<BroadcastMessage> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: BroadcastMessage, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => match serde_json::from_str::<WsCommand>(&text) {
                Ok(WsCommand::JoinChat { chat_id }) => {
                    let broker = self.broker.clone();
                    let subscriber_id = self.subscriber_id;
                    actix::spawn(async move {
                        broker.join(subscriber_id, chat_id).await;
                    });
                }
                Ok(WsCommand::LeaveChat { chat_id }) => {
                    let broker = self.broker.clone();
                    let subscriber_id = self.subscriber_id;
                    actix::spawn(async move {
                        broker.leave(subscriber_id, chat_id).await;
                    });
                }
                Err(e) => {
                    tracing::warn!("failed to parse WS command: {e}");
                }
            },
            Ok(ws::Message::Binary(_)) => {
                tracing::warn!("binary WebSocket messages not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::info!("WebSocket close received: {reason:?}");
                ctx.stop();
            }
            _ => {}
        }
    }
}

/// GET /ws — upgrade to a realtime event subscription.
#[get("/ws")]
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    params: web::Query<WsParams>,
) -> Result<HttpResponse, Error> {
    let (subscriber_id, events) = state.broker.register().await;

    ws::start(
        WsSession {
            subscriber_id,
            broker: state.broker.clone(),
            username: params.into_inner().username,
            hb: Instant::now(),
            events: Some(events),
        },
        &req,
        stream,
    )
}
