//! X (Twitter) API v2: mention polling and threaded replies.
//!
//! Requests are signed with OAuth 1.0a user context (HMAC-SHA1). Account
//! activity CRC challenges are answered with an HMAC-SHA256 token.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use reqwest::{Client, Response, header::AUTHORIZATION};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha1::Sha1;
use sha2::Sha256;
use std::time::Duration;
use templar_conversation::ConversationRegistry;
use templar_providers::{RetryPolicy, retry_with_backoff};
use tokio::sync::OnceCell;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{Error, Result};

/// Longest text a single post may carry.
pub const MAX_POST_CHARS: usize = 280;

/// OAuth 1.0a consumer and access credentials.
#[derive(Debug, Clone)]
pub struct XCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

/// A post that mentions the account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Mention {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub author_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MentionPage {
    #[serde(default)]
    data: Vec<Mention>,
}

/// Where mentions come from and where replies to them go.
#[async_trait]
pub trait MentionSource: Send + Sync {
    /// Mentions newer than `since_id`, newest first.
    async fn mentions(&self, since_id: Option<&str>) -> Result<Vec<Mention>>;
    async fn reply_to_post(&self, post_id: &str, text: &str) -> Result<()>;
}

/// Outcome of one mention-processing pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionRun {
    /// Cursor for the next pass
    pub since_id: Option<String>,
    pub fetched: usize,
    pub answered: usize,
}

/// Fetch new mentions, answer each through the registry and reply in thread.
///
/// Leading `@handle` words are removed before the knight sees the text.
/// Mentions are answered oldest first. A failed reply is logged and skipped;
/// only a failed fetch is an error.
pub async fn process_mentions(
    registry: &ConversationRegistry,
    source: &dyn MentionSource,
    since_id: Option<&str>,
) -> Result<MentionRun> {
    let mentions = source.mentions(since_id).await?;
    info!(count = mentions.len(), ?since_id, "Processing X mentions");

    let mut answered = 0;
    for mention in mentions.iter().rev() {
        let text = strip_handles(&mention.text);
        if text.is_empty() {
            debug!(post_id = %mention.id, "Mention has no text besides handles, skipping");
            continue;
        }

        let sender_id = format!(
            "x:{}",
            mention.author_id.as_deref().unwrap_or(mention.id.as_str())
        );
        let reply = registry.reply(&sender_id, &text).await;

        match source.reply_to_post(&mention.id, &fit_post(&reply)).await {
            Ok(()) => answered += 1,
            Err(e) => error!(post_id = %mention.id, error = %e, "Failed to reply to mention"),
        }
    }

    Ok(MentionRun {
        since_id: newest_id(&mentions, since_id),
        fetched: mentions.len(),
        answered,
    })
}

/// Drop every whitespace-separated word that starts with `@`.
#[must_use]
pub fn strip_handles(text: &str) -> String {
    text.split_whitespace()
        .filter(|word| !word.starts_with('@'))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Highest post id among `mentions`, falling back to `since_id`.
///
/// Ids are decimal strings, so a longer id is a newer one.
fn newest_id(mentions: &[Mention], since_id: Option<&str>) -> Option<String> {
    mentions
        .iter()
        .map(|m| m.id.as_str())
        .chain(since_id)
        .max_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
        .map(ToString::to_string)
}

fn fit_post(text: &str) -> String {
    if text.chars().count() <= MAX_POST_CHARS {
        return text.to_string();
    }
    let mut fitted: String = text.chars().take(MAX_POST_CHARS - 1).collect();
    fitted.push('…');
    fitted
}

/// `response_token` for an account activity CRC challenge.
pub fn crc_response_token(consumer_secret: &str, crc_token: &str) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(consumer_secret.as_bytes())
        .map_err(|e| Error::Config(format!("Invalid consumer secret: {e}")))?;
    mac.update(crc_token.as_bytes());
    Ok(format!("sha256={}", STANDARD.encode(mac.finalize().into_bytes())))
}

fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// HMAC-SHA1 signature over the OAuth signature base string.
fn oauth_signature(
    method: &str,
    url: &str,
    params: &[(&str, &str)],
    consumer_secret: &str,
    token_secret: &str,
) -> Result<String> {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();

    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let base = format!(
        "{}&{}&{}",
        method.to_uppercase(),
        percent_encode(url),
        percent_encode(&param_string)
    );
    let key = format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret)
    );

    let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())
        .map_err(|e| Error::Config(format!("Invalid signing key: {e}")))?;
    mac.update(base.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// `Authorization` header value for one request.
///
/// `request_params` are the query (or form) parameters that travel with the
/// request; JSON bodies are not signed.
fn oauth_header(
    credentials: &XCredentials,
    method: &str,
    url: &str,
    request_params: &[(&str, &str)],
    nonce: &str,
    timestamp: &str,
) -> Result<String> {
    let oauth_params = [
        ("oauth_consumer_key", credentials.consumer_key.as_str()),
        ("oauth_nonce", nonce),
        ("oauth_signature_method", "HMAC-SHA1"),
        ("oauth_timestamp", timestamp),
        ("oauth_token", credentials.access_token.as_str()),
        ("oauth_version", "1.0"),
    ];

    let mut all_params = request_params.to_vec();
    all_params.extend_from_slice(&oauth_params);
    let signature = oauth_signature(
        method,
        url,
        &all_params,
        &credentials.consumer_secret,
        &credentials.access_token_secret,
    )?;

    let fields = oauth_params
        .iter()
        .copied()
        .chain(std::iter::once(("oauth_signature", signature.as_str())))
        .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!("OAuth {fields}"))
}

/// X API v2 client acting as one user.
pub struct XClient {
    client: Client,
    credentials: XCredentials,
    base_url: String,
    user_id: OnceCell<String>,
    retry: RetryPolicy,
}

impl XClient {
    pub fn new(credentials: XCredentials, base_url: &str) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            credentials,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id: OnceCell::new(),
            retry: RetryPolicy::default(),
        })
    }

    /// Skip the `users/me` lookup by naming the account up front.
    #[must_use]
    pub fn with_user_id(mut self, user_id: String) -> Self {
        if !user_id.trim().is_empty() {
            self.user_id = OnceCell::new_with(Some(user_id));
        }
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Consumer secret, which also keys CRC responses.
    #[must_use]
    pub fn consumer_secret(&self) -> &str {
        &self.credentials.consumer_secret
    }

    async fn user_id(&self) -> Result<&str> {
        self.user_id
            .get_or_try_init(|| async {
                info!("Looking up authenticated X user");
                let me = self.get("users/me", &[]).await?;
                me["data"]["id"]
                    .as_str()
                    .map(ToString::to_string)
                    .ok_or_else(|| Error::InvalidResponse(format!("missing user id in {me}")))
            })
            .await
            .map(String::as_str)
    }

    fn authorization(&self, method: &str, url: &str, params: &[(&str, &str)]) -> Result<String> {
        let nonce = Uuid::now_v7().simple().to_string();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        oauth_header(&self.credentials, method, url, params, &nonce, &timestamp)
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<serde_json::Value> {
        retry_with_backoff(
            || self.get_once(path, query),
            &self.retry,
            Error::is_transient,
        )
        .await
    }

    async fn get_once(&self, path: &str, query: &[(&str, &str)]) -> Result<serde_json::Value> {
        let url = format!("{}/{path}", self.base_url);
        let auth = self.authorization("GET", &url, query)?;
        let response = self
            .client
            .get(&url)
            .query(query)
            .header(AUTHORIZATION, auth)
            .send()
            .await?;
        Self::read(response).await
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        retry_with_backoff(
            || self.post_once(path, body),
            &self.retry,
            Error::is_transient,
        )
        .await
    }

    async fn post_once(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let url = format!("{}/{path}", self.base_url);
        let auth = self.authorization("POST", &url, &[])?;
        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, auth)
            .json(body)
            .send()
            .await?;
        Self::read(response).await
    }

    async fn read(response: Response) -> Result<serde_json::Value> {
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string)
        };
        debug!(
            remaining = ?header("x-rate-limit-remaining"),
            reset = ?header("x-rate-limit-reset"),
            "X rate limit"
        );

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::X {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<serde_json::Value>().await?)
    }
}

#[async_trait]
impl MentionSource for XClient {
    async fn mentions(&self, since_id: Option<&str>) -> Result<Vec<Mention>> {
        let user_id = self.user_id().await?.to_string();

        let mut query = vec![
            ("tweet.fields", "author_id,conversation_id,created_at"),
            ("expansions", "author_id"),
        ];
        if let Some(since_id) = since_id {
            query.push(("since_id", since_id));
        }

        let value = self.get(&format!("users/{user_id}/mentions"), &query).await?;
        let page: MentionPage = serde_json::from_value(value)
            .map_err(|e| Error::InvalidResponse(format!("mentions: {e}")))?;
        info!(count = page.data.len(), "Fetched X mentions");
        Ok(page.data)
    }

    async fn reply_to_post(&self, post_id: &str, text: &str) -> Result<()> {
        info!(post_id, "Replying to X post");
        self.post(
            "tweets",
            &json!({
                "text": text,
                "reply": {"in_reply_to_tweet_id": post_id},
            }),
        )
        .await?;
        Ok(())
    }
}
