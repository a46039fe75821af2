//! Instagram webhook payloads.
//!
//! Only the parts of the Graph API event shapes that carry a sender and a
//! text are modelled; everything else is ignored during deserialization.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Entry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub messaging: Vec<MessagingEvent>,
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessagingEvent {
    pub sender: Participant,
    #[serde(default)]
    pub recipient: Option<Participant>,
    #[serde(default)]
    pub message: Option<DirectMessage>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Participant {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DirectMessage {
    #[serde(default)]
    pub mid: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub is_echo: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Change {
    pub field: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
struct CommentValue {
    id: String,
    #[serde(default)]
    text: Option<String>,
    from: Participant,
}

/// Where an inbound text came from, and so where its reply goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Channel {
    DirectMessage,
    Comment { comment_id: String },
}

/// A `(sender, text)` pair ready for the responder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub sender_id: String,
    pub text: String,
    pub channel: Channel,
}

impl WebhookPayload {
    /// Collect answerable texts, skipping echoes and the account's own posts.
    #[must_use]
    pub fn inbound(&self, own_account_id: &str) -> Vec<Inbound> {
        let is_own = |id: &str| !own_account_id.is_empty() && id == own_account_id;
        let mut inbound = Vec::new();

        for entry in &self.entry {
            for event in &entry.messaging {
                let Some(message) = &event.message else {
                    continue;
                };
                if message.is_echo || is_own(&event.sender.id) {
                    continue;
                }
                if let Some(text) = non_blank(message.text.as_deref()) {
                    inbound.push(Inbound {
                        sender_id: event.sender.id.clone(),
                        text,
                        channel: Channel::DirectMessage,
                    });
                }
            }

            for change in entry.changes.iter().filter(|c| c.field == "comments") {
                let Ok(comment) = serde_json::from_value::<CommentValue>(change.value.clone())
                else {
                    continue;
                };
                if is_own(&comment.from.id) {
                    continue;
                }
                if let Some(text) = non_blank(comment.text.as_deref()) {
                    inbound.push(Inbound {
                        sender_id: comment.from.id,
                        text,
                        channel: Channel::Comment {
                            comment_id: comment.id,
                        },
                    });
                }
            }
        }

        inbound
    }
}

fn non_blank(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
}
