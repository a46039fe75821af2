//! Webhook HTTP handlers.
//!
//! Adapters only: each inbound text is handed to the conversation registry
//! and whatever string comes back is delivered to the sender. A failed reply
//! or delivery is never a webhook failure.

use axum::{
    Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use templar_conversation::ConversationRegistry;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::graph::ReplySink;
use crate::instagram::{Channel, Inbound, WebhookPayload};
use crate::rate_limit::RateLimiter;
use crate::x::{MentionSource, crc_response_token, process_mentions};

/// X integration: where mentions come from, and the secret keying CRC replies.
#[derive(Clone)]
pub struct XState {
    pub source: Arc<dyn MentionSource>,
    pub consumer_secret: String,
}

/// Shared state for webhook handlers
#[derive(Clone)]
pub struct WebhookState {
    /// Conversation(s) answering inbound texts
    pub registry: Arc<ConversationRegistry>,
    /// Delivery of replies back to Instagram
    pub sink: Arc<dyn ReplySink>,
    /// Token Meta echoes during subscription verification
    pub verify_token: String,
    /// Our own account id, used to ignore our own messages
    pub account_id: String,
    /// Bearer token required on `/chat` when set
    pub api_token: Option<String>,
    /// Requests per sender per minute, 0 for unlimited
    pub rate_limit_per_minute: u32,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
    /// Present when X mentions are answered
    pub x: Option<XState>,
}

impl WebhookState {
    pub fn new(
        registry: Arc<ConversationRegistry>,
        sink: Arc<dyn ReplySink>,
        verify_token: String,
        account_id: String,
    ) -> Self {
        Self {
            registry,
            sink,
            verify_token,
            account_id,
            api_token: None,
            rate_limit_per_minute: 0,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new())),
            x: None,
        }
    }

    #[must_use]
    pub fn with_x(mut self, source: Arc<dyn MentionSource>, consumer_secret: String) -> Self {
        self.x = Some(XState {
            source,
            consumer_secret,
        });
        self
    }

    #[must_use]
    pub fn with_api_token(mut self, api_token: Option<String>) -> Self {
        self.api_token = api_token;
        self
    }

    #[must_use]
    pub const fn with_rate_limit(mut self, per_minute: u32) -> Self {
        self.rate_limit_per_minute = per_minute;
        self
    }

    /// Bearer check for the operator endpoints; open when no token is set.
    fn authorized(&self, headers: &HeaderMap) -> bool {
        let Some(token) = &self.api_token else {
            return true;
        };
        let auth_header = headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        auth_header == format!("Bearer {token}")
    }

    async fn allow(&self, sender_id: &str) -> bool {
        self.rate_limiter
            .lock()
            .await
            .check_and_record(sender_id, self.rate_limit_per_minute)
    }
}

/// Create the webhook router
pub fn webhook_router(state: WebhookState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/webhook", get(verify_subscription).post(receive_events))
        .route("/chat", post(chat))
        .route("/x/webhook", get(x_crc_challenge))
        .route("/process_x_mentions", post(process_x_mentions))
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

#[derive(Debug, Deserialize)]
struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// Meta subscription handshake.
async fn verify_subscription(
    State(state): State<WebhookState>,
    Query(params): Query<VerifyParams>,
) -> (StatusCode, String) {
    let (Some(mode), Some(token)) = (params.mode, params.verify_token) else {
        warn!("Webhook verification request without hub.mode/hub.verify_token");
        return (StatusCode::BAD_REQUEST, "Missing parameters".to_string());
    };

    if mode == "subscribe" && !state.verify_token.is_empty() && token == state.verify_token {
        info!("Webhook verified");
        (StatusCode::OK, params.challenge.unwrap_or_default())
    } else {
        warn!("Webhook verification failed");
        (StatusCode::FORBIDDEN, "Forbidden".to_string())
    }
}

/// Instagram messaging and comment events.
async fn receive_events(
    State(state): State<WebhookState>,
    Json(payload): Json<WebhookPayload>,
) -> &'static str {
    let inbound = payload.inbound(&state.account_id);
    info!(
        object = %payload.object,
        count = inbound.len(),
        "Webhook events received"
    );

    for item in inbound {
        handle_inbound(&state, item).await;
    }

    "EVENT_RECEIVED"
}

async fn handle_inbound(state: &WebhookState, item: Inbound) {
    let Inbound {
        sender_id,
        text,
        channel,
    } = item;

    if !state.allow(&sender_id).await {
        warn!(%sender_id, "Rate limit exceeded, dropping message");
        return;
    }

    info!(%sender_id, text = %preview(&text), "Processing inbound message");
    let reply = state.registry.reply(&sender_id, &text).await;

    let delivered = match &channel {
        Channel::DirectMessage => state.sink.send_direct(&sender_id, &reply).await,
        Channel::Comment { comment_id } => state.sink.reply_to_comment(comment_id, &reply).await,
    };

    if let Err(e) = delivered {
        error!(%sender_id, ?channel, error = %e, "Failed to deliver reply");
    }
}

fn preview(text: &str) -> String {
    const MAX_CHARS: usize = 50;
    if text.chars().count() <= MAX_CHARS {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(MAX_CHARS).collect::<String>())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatPayload {
    pub sender_id: String,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
}

/// Platform-neutral entry point: `{sender_id, text}` in, `{reply}` out.
async fn chat(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    Json(payload): Json<ChatPayload>,
) -> Result<Json<ChatReply>, (StatusCode, String)> {
    if !state.authorized(&headers) {
        warn!("Invalid authorization token on /chat");
        return Err((
            StatusCode::UNAUTHORIZED,
            "Invalid authorization token".to_string(),
        ));
    }

    if !state.allow(&payload.sender_id).await {
        warn!(sender_id = %payload.sender_id, "Rate limit exceeded");
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            format!(
                "Rate limit exceeded ({} requests per minute)",
                state.rate_limit_per_minute
            ),
        ));
    }

    let reply = state
        .registry
        .reply(&payload.sender_id, &payload.text)
        .await;
    Ok(Json(ChatReply { reply }))
}

#[derive(Debug, Deserialize)]
struct CrcParams {
    crc_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CrcResponse {
    pub response_token: String,
}

/// X account activity challenge-response check.
async fn x_crc_challenge(
    State(state): State<WebhookState>,
    Query(params): Query<CrcParams>,
) -> Result<Json<CrcResponse>, (StatusCode, String)> {
    let Some(x) = &state.x else {
        return Err((StatusCode::NOT_FOUND, "X is not configured".to_string()));
    };
    let Some(crc_token) = params.crc_token.filter(|t| !t.is_empty()) else {
        warn!("CRC request without crc_token");
        return Err((StatusCode::BAD_REQUEST, "Missing crc_token".to_string()));
    };

    match crc_response_token(&x.consumer_secret, &crc_token) {
        Ok(response_token) => {
            info!("Answered X CRC challenge");
            Ok(Json(CrcResponse { response_token }))
        }
        Err(e) => {
            error!(error = %e, "Failed to compute CRC response");
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

/// Cursor sent to `/process_x_mentions`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MentionCursor {
    #[serde(default)]
    pub since_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MentionsProcessed {
    pub success: bool,
    /// Cursor to send next time
    pub since_id: Option<String>,
    #[serde(default)]
    pub answered: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Answer X mentions newer than the cursor and return the next cursor.
async fn process_x_mentions(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    Json(cursor): Json<MentionCursor>,
) -> (StatusCode, Json<MentionsProcessed>) {
    let failed = |status: StatusCode, since_id: Option<String>, error: String| {
        (
            status,
            Json(MentionsProcessed {
                success: false,
                since_id,
                answered: 0,
                error: Some(error),
            }),
        )
    };

    if !state.authorized(&headers) {
        warn!("Invalid authorization token on /process_x_mentions");
        return failed(
            StatusCode::UNAUTHORIZED,
            cursor.since_id,
            "Invalid authorization token".to_string(),
        );
    }
    let Some(x) = &state.x else {
        return failed(
            StatusCode::NOT_FOUND,
            cursor.since_id,
            "X is not configured".to_string(),
        );
    };

    let result =
        process_mentions(&state.registry, x.source.as_ref(), cursor.since_id.as_deref()).await;
    match result {
        Ok(run) => {
            info!(
                fetched = run.fetched,
                answered = run.answered,
                since_id = ?run.since_id,
                "Processed X mentions"
            );
            (
                StatusCode::OK,
                Json(MentionsProcessed {
                    success: true,
                    since_id: run.since_id,
                    answered: run.answered,
                    error: None,
                }),
            )
        }
        Err(e) => {
            error!(error = %e, "Failed to process X mentions");
            failed(StatusCode::BAD_GATEWAY, cursor.since_id, e.to_string())
        }
    }
}
