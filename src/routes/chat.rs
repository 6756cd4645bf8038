//! REST surface for the conversation lifecycle.
//!
//! Every lifecycle failure is surfaced as HTTP 500 with a human-readable
//! message (see `AppError`'s `ResponseError` impl); success payloads are the
//! populated conversation documents.

use crate::{
    error::AppError,
    services::NewMessage,
    state::AppState,
};
use actix_web::{delete, get, post, web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatRequest {
    pub participants: Vec<String>,
    #[serde(default)]
    pub messages: Vec<NewMessage>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteChatRequest {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct AddParticipantRequest {
    pub username: String,
}

/// POST /chat/createChat
#[post("/chat/createChat")]
pub async fn create_chat(
    state: web::Data<AppState>,
    body: web::Json<CreateChatRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let convo = state.chats.create_chat(body.participants, body.messages).await?;
    Ok(HttpResponse::Ok().json(convo))
}

/// POST /chat/{id}/addMessage
#[post("/chat/{id}/addMessage")]
pub async fn add_message(
    state: web::Data<AppState>,
    chat_id: web::Path<Uuid>,
    body: web::Json<NewMessage>,
) -> Result<HttpResponse, AppError> {
    let convo = state
        .chats
        .add_message(chat_id.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(convo))
}

/// GET /chat/{id}
#[get("/chat/{id}")]
pub async fn get_chat(
    state: web::Data<AppState>,
    chat_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let convo = state.chats.get_chat(chat_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(convo))
}

/// POST /chat/{id}/addParticipant
#[post("/chat/{id}/addParticipant")]
pub async fn add_participant(
    state: web::Data<AppState>,
    chat_id: web::Path<Uuid>,
    body: web::Json<AddParticipantRequest>,
) -> Result<HttpResponse, AppError> {
    let convo = state
        .chats
        .add_participant(chat_id.into_inner(), &body.username)
        .await?;
    Ok(HttpResponse::Ok().json(convo))
}

/// GET /chat/getChatsByUser/{username}
#[get("/chat/getChatsByUser/{username}")]
pub async fn get_chats_by_user(
    state: web::Data<AppState>,
    username: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let chats = state.chats.chats_for_user(&username).await?;
    Ok(HttpResponse::Ok().json(chats))
}

/// DELETE /chat/{id} — soft delete for the given user; cascades to full
/// removal once every participant has deleted.
#[delete("/chat/{id}")]
pub async fn delete_chat(
    state: web::Data<AppState>,
    chat_id: web::Path<Uuid>,
    body: web::Json<DeleteChatRequest>,
) -> Result<HttpResponse, AppError> {
    let report = state
        .chats
        .delete_for_user(chat_id.into_inner(), &body.username)
        .await?;
    Ok(HttpResponse::Ok().json(report))
}

/// GET /chat/{id}/canDelete
#[get("/chat/{id}/canDelete")]
pub async fn can_delete(
    state: web::Data<AppState>,
    chat_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let report = state.chats.can_delete(chat_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(report))
}
