//! Outbound calls to the Instagram Graph API.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use templar_providers::{RetryPolicy, retry_with_backoff};
use tracing::info;

use crate::{Error, Result};

const GRAPH_BASE_URL: &str = "https://graph.facebook.com";

/// Where replies produced by the knight are delivered.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send_direct(&self, recipient_id: &str, text: &str) -> Result<()>;
    async fn reply_to_comment(&self, comment_id: &str, text: &str) -> Result<()>;
}

/// Instagram Graph API client for one business account.
#[derive(Clone)]
pub struct GraphClient {
    client: Client,
    access_token: String,
    account_id: String,
    base_url: String,
    retry: RetryPolicy,
}

impl GraphClient {
    pub fn new(access_token: String, account_id: String, graph_version: &str) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            access_token,
            account_id,
            base_url: format!("{GRAPH_BASE_URL}/{graph_version}"),
            retry: RetryPolicy::default(),
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// POST `body` to `{base_url}/{path}`, retrying transient failures.
    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        retry_with_backoff(
            || self.post_once(path, body),
            &self.retry,
            Error::is_transient,
        )
        .await
    }

    /// POST `body` to `{base_url}/{path}` once and return the JSON answer.
    async fn post_once(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let response = self
            .client
            .post(format!("{}/{path}", self.base_url))
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Graph {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<serde_json::Value>().await?)
    }

    /// Publish a photo: create a media container, then publish it.
    ///
    /// Neither step is retried, a repeated publish would post twice.
    /// Returns the published media id.
    pub async fn post_photo(&self, image_url: &str, caption: &str) -> Result<String> {
        info!(image_url, "Creating Instagram media container");
        let container = self
            .post_once(
                &format!("{}/media", self.account_id),
                &json!({"image_url": image_url, "caption": caption}),
            )
            .await?;
        let creation_id = id_field(&container)?;

        let published = self
            .post_once(
                &format!("{}/media_publish", self.account_id),
                &json!({"creation_id": creation_id}),
            )
            .await?;
        let media_id = id_field(&published)?;

        info!(media_id, "Image posted successfully");
        Ok(media_id)
    }
}

fn id_field(value: &serde_json::Value) -> Result<String> {
    value["id"]
        .as_str()
        .map(ToString::to_string)
        .ok_or_else(|| Error::InvalidResponse(format!("missing id in {value}")))
}

#[async_trait]
impl ReplySink for GraphClient {
    async fn send_direct(&self, recipient_id: &str, text: &str) -> Result<()> {
        info!(recipient_id, "Sending direct message");
        self.post(
            &format!("{}/messages", self.account_id),
            &json!({
                "recipient": {"id": recipient_id},
                "message": {"text": text},
            }),
        )
        .await?;
        Ok(())
    }

    async fn reply_to_comment(&self, comment_id: &str, text: &str) -> Result<()> {
        info!(comment_id, "Replying to comment");
        self.post(&format!("{comment_id}/replies"), &json!({"message": text}))
            .await?;
        Ok(())
    }
}
