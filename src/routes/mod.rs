pub mod chat;
pub mod wsroute;

use actix_web::web;

/// Register every route on the service; shared between `main` and the HTTP
/// test harness.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(chat::create_chat)
        .service(chat::get_chats_by_user)
        .service(chat::add_message)
        .service(chat::add_participant)
        .service(chat::can_delete)
        .service(chat::get_chat)
        .service(chat::delete_chat)
        .service(wsroute::ws_handler)
        .route("/health", web::get().to(|| async { "OK" }));
}
