use actix_web::{web, App, HttpServer};
use dm_service::{
    config, error, logging,
    routes,
    services::{ChatService, OpenUserDirectory, StaticUserDirectory, UserDirectory},
    state::AppState,
    store::ConversationStore,
    websocket::ChannelBroker,
};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(config::Config::from_env()?);

    let store = ConversationStore::new();
    let broker = ChannelBroker::new();

    let users: Arc<dyn UserDirectory> = if cfg.known_users.is_empty() {
        tracing::warn!("KNOWN_USERS not set; accepting any non-empty username");
        Arc::new(OpenUserDirectory)
    } else {
        Arc::new(StaticUserDirectory::new(cfg.known_users.clone()))
    };

    let chats = Arc::new(ChatService::new(store, broker.clone(), users));

    let state = AppState {
        chats,
        broker,
        config: cfg.clone(),
    };

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting dm-service");

    HttpServer::new(move || {
        let cors = actix_cors::Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .configure(routes::configure)
    })
    .bind(&bind_addr)
    .map_err(|e| error::AppError::StartServer(format!("bind: {e}")))?
    .run()
    .await
    .map_err(|e| error::AppError::StartServer(format!("run server: {e}")))
}
