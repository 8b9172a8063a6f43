use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        DefaultBodyLimit, Multipart, Path, Query, State,
    },
    http::{header, HeaderMap, Method},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use skillsync_reply::{HybridReply, HybridResolver};
use skillsync_shared::constants::{DEFAULT_HISTORY_LIMIT, MAX_CHAT_MESSAGE_CHARS};
use skillsync_shared::{ChatRoomId, MessageSource, SenderType};
use skillsync_store::{ChatMessage, ChatRoomSummary, StoreError};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::auth::{verify_admin_token, AuthUser};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::image_store::ImageStore;
use crate::mailer::Mailer;
use crate::store::StoreHandle;
use crate::webhooks;

const MAX_HISTORY_LIMIT: u32 = 1_000;

#[derive(Clone)]
pub struct AppState {
    pub store: StoreHandle,
    pub resolver: Arc<HybridResolver>,
    pub images: Arc<ImageStore>,
    pub mailer: Option<Arc<dyn Mailer>>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    let body_limit = state.images.max_size() + 64 * 1024;

    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/chat/messages",
            post(send_chat_message).get(list_my_messages),
        )
        .route("/api/chat/reply", post(chat_reply))
        .route("/api/admin/chat/rooms", get(admin_list_rooms))
        .route(
            "/api/admin/chat/rooms/:room_id/messages",
            get(admin_room_messages).post(admin_post_message),
        )
        .route("/api/webhooks/review-created", post(webhooks::review_created))
        .route("/api/webhooks/review-deleted", post(webhooks::review_deleted))
        .route("/api/images", post(image_upload))
        .route("/api/images/:key", get(image_download).delete(image_delete))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── Response envelope ───

/// `{ success, data?, message? }`, the shape every JSON endpoint returns.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ─── Customer chat ───

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageRequest {
    message: Option<String>,
    sender_type: Option<SenderType>,
    source: Option<MessageSource>,
}

#[derive(Deserialize)]
struct ReplyRequest {
    message: Option<String>,
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatReplyData {
    reply: HybridReply,
    user_message: ChatMessage,
    reply_message: ChatMessage,
}

/// Reject blank and oversized messages before anything is stored.
fn validate_message(message: Option<&str>) -> Result<String, ServerError> {
    let text = message.map(str::trim).unwrap_or("");
    if text.is_empty() {
        return Err(ServerError::BadRequest("Message is required".into()));
    }
    if text.chars().count() > MAX_CHAT_MESSAGE_CHARS {
        return Err(ServerError::BadRequest(format!(
            "Message must be at most {MAX_CHAT_MESSAGE_CHARS} characters"
        )));
    }
    Ok(text.to_string())
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ServerError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ServerError::BadRequest(e.body_text()))
}

fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ServerError> {
    query
        .map(|Query(params)| params)
        .map_err(|e| ServerError::BadRequest(e.body_text()))
}

fn room_id_param(path: Result<Path<Uuid>, PathRejection>) -> Result<ChatRoomId, ServerError> {
    path.map(|Path(id)| ChatRoomId(id))
        .map_err(|_| ServerError::BadRequest("Invalid chat room id".into()))
}

async fn send_chat_message(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ChatMessage>>, ServerError> {
    let req = json_body(payload)?;
    let text = validate_message(req.message.as_deref())?;
    let sender = req.sender_type.unwrap_or_default();
    let source = req.source.unwrap_or_default();

    let message = state
        .store
        .run(move |db| db.append_chat_message(user_id, &text, sender, source))
        .await?;

    info!(user = %user_id, room = %message.room_id, sender = %sender, "Chat message saved");
    Ok(Json(ApiResponse::ok(message)))
}

async fn list_my_messages(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<ChatMessage>>>, ServerError> {
    let limit = history_limit(query_params(query)?.limit);

    let messages = state
        .store
        .run(move |db| match db.get_chat_room_for_user(user_id) {
            Ok(room) => db.list_chat_messages(room.id, limit),
            Err(StoreError::NotFound) => Ok(Vec::new()),
            Err(e) => Err(e),
        })
        .await?;

    Ok(Json(ApiResponse::ok(messages)))
}

/// Store the customer's message, resolve an answer, store the answer.
async fn chat_reply(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<ReplyRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ChatReplyData>>, ServerError> {
    let req = json_body(payload)?;
    let text = validate_message(req.message.as_deref())?;

    let question = text.clone();
    let user_message = state
        .store
        .run(move |db| {
            db.append_chat_message(
                user_id,
                &question,
                SenderType::User,
                MessageSource::HumanSupport,
            )
        })
        .await?;

    let reply = state.resolver.resolve(&text).await;

    let answer = reply.answer.clone();
    let source = reply.source;
    let room_id = user_message.room_id;
    let reply_message = state
        .store
        .run(move |db| db.append_to_room(room_id, &answer, SenderType::Admin, source))
        .await?;

    info!(
        user = %user_id,
        source = %reply.source,
        auto = reply.is_auto_reply,
        "Chat reply resolved"
    );

    Ok(Json(ApiResponse::ok(ChatReplyData {
        reply,
        user_message,
        reply_message,
    })))
}

fn history_limit(requested: Option<u32>) -> u32 {
    requested
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT)
}

// ─── Staff console ───

#[derive(Deserialize)]
struct StaffReplyRequest {
    message: Option<String>,
}

async fn admin_list_rooms(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<ChatRoomSummary>>>, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    let rooms = state.store.run(|db| db.list_chat_rooms()).await?;
    Ok(Json(ApiResponse::ok(rooms)))
}

async fn admin_room_messages(
    headers: HeaderMap,
    State(state): State<AppState>,
    room_id: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<ChatMessage>>>, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    let room_id = room_id_param(room_id)?;
    let limit = history_limit(query_params(query)?.limit);

    let messages = state
        .store
        .run(move |db| {
            db.get_chat_room(room_id)?;
            db.list_chat_messages(room_id, limit)
        })
        .await
        .map_err(|e| room_not_found(e, room_id))?;

    Ok(Json(ApiResponse::ok(messages)))
}

async fn admin_post_message(
    headers: HeaderMap,
    State(state): State<AppState>,
    room_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<StaffReplyRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ChatMessage>>, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    let room_id = room_id_param(room_id)?;
    let req = json_body(payload)?;
    let text = validate_message(req.message.as_deref())?;

    let message = state
        .store
        .run(move |db| {
            db.append_to_room(room_id, &text, SenderType::Admin, MessageSource::HumanSupport)
        })
        .await
        .map_err(|e| room_not_found(e, room_id))?;

    info!(room = %room_id, "Staff reply saved");
    Ok(Json(ApiResponse::ok(message)))
}

fn room_not_found(e: ServerError, room_id: ChatRoomId) -> ServerError {
    match e {
        ServerError::Store(StoreError::NotFound) => {
            ServerError::NotFound(format!("Chat room {room_id} not found"))
        }
        other => other,
    }
}

// ─── Images ───

#[derive(Serialize)]
struct ImageUploadResponse {
    key: String,
}

async fn image_upload(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<ImageUploadResponse>>, ServerError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == "file" {
            let data = field
                .bytes()
                .await
                .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {}", e)))?;

            let key = state.images.put_image(&data).await?;

            info!(user = %user_id, key = %key, size = data.len(), "Image uploaded");

            return Ok(Json(ApiResponse::ok(ImageUploadResponse { key })));
        }
    }

    Err(ServerError::BadRequest(
        "Missing 'file' field in multipart form".to_string(),
    ))
}

async fn image_download(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let data = state.images.get_image(&key).await?;
    let content_type = sniff_content_type(&data);
    Ok(([(header::CONTENT_TYPE, content_type)], data))
}

async fn image_delete(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    let deleted = state.images.delete_image(&key).await?;
    Ok(Json(ApiResponse::ok(serde_json::json!({ "deleted": deleted }))))
}

fn sniff_content_type(data: &[u8]) -> &'static str {
    if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        "image/png"
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if data.starts_with(b"GIF8") {
        "image/gif"
    } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "application/octet-stream"
    }
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
