use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::{HeaderMap, StatusCode};
use axum::{Json, Router, extract::State, routing::post};
use serde_json::{Value, json};
use templar_core::{ChatMessage, ChatRequest, LLMProvider, SamplingParams};
use templar_providers::OpenAiProvider;

#[derive(Clone, Default)]
struct Seen {
    authorization: Arc<Mutex<Vec<String>>>,
    bodies: Arc<Mutex<Vec<Value>>>,
}

async fn spawn(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn provider(addr: SocketAddr) -> OpenAiProvider {
    OpenAiProvider::new("sk-test".to_string(), Duration::from_secs(5))
        .unwrap()
        .with_base_url(format!("http://{addr}/v1"))
}

fn request() -> ChatRequest {
    ChatRequest {
        model: "gpt-test".to_string(),
        messages: vec![ChatMessage::system("P"), ChatMessage::user("Who are you?")],
        sampling: SamplingParams::default(),
    }
}

async fn answer(
    State(seen): State<Seen>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    seen.authorization.lock().unwrap().push(auth);
    seen.bodies.lock().unwrap().push(body);

    Json(json!({
        "choices": [{"message": {"role": "assistant", "content": "  I am Adrian.  "}}],
        "usage": {"prompt_tokens": 20, "completion_tokens": 4, "total_tokens": 24}
    }))
}

async fn reject() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": {"message": "Incorrect API key provided"}})),
    )
}

#[tokio::test]
async fn chat_posts_request_and_reads_reply() {
    let seen = Seen::default();
    let router = Router::new()
        .route("/v1/chat/completions", post(answer))
        .with_state(seen.clone());
    let addr = spawn(router).await;

    let response = provider(addr).chat(&request()).await.unwrap();

    assert_eq!(response.content, "  I am Adrian.  ");
    assert_eq!(response.usage.unwrap().total_tokens, 24);

    assert_eq!(
        seen.authorization.lock().unwrap().as_slice(),
        ["Bearer sk-test"]
    );
    let bodies = seen.bodies.lock().unwrap();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["model"], "gpt-test");
    assert_eq!(bodies[0]["messages"][1]["content"], "Who are you?");
    assert_eq!(bodies[0]["max_tokens"], 300);
}

#[tokio::test]
async fn non_success_status_is_an_error_with_status_and_body() {
    let router = Router::new().route("/v1/chat/completions", post(reject));
    let addr = spawn(router).await;

    let err = provider(addr).chat(&request()).await.unwrap_err();
    let message = err.to_string();

    assert!(message.contains("401"), "{message}");
    assert!(message.contains("Incorrect API key provided"), "{message}");
}

#[tokio::test]
async fn unreachable_endpoint_is_an_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    assert!(provider(addr).chat(&request()).await.is_err());
}
