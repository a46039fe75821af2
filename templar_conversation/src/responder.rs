//! The Knight responder: one inbound utterance in, one reply out.
//!
//! Each `reply` appends the user turn, asks the remote model for a
//! completion over the current history and, when it answers, appends the
//! assistant turn. Every failure is folded into the returned text.

use std::sync::Arc;
use std::time::Duration;

use templar_core::{
    ChatMessage, ChatRequest, DEFAULT_MODEL, DEFAULT_PERSONA, LLMProvider, Role, SamplingParams,
};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::history::{ConversationHistory, DEFAULT_MAX_HISTORY, HistoryStats};

/// Marker that starts every non-answer reply.
pub const ERROR_INDICATOR: &str = "⚠";

/// Returned for blank input.
pub const PROMPT_FOR_INPUT: &str = "⚠ Please enter a question.";

/// Shown to end users when the model could not answer.
pub const FAILURE_APOLOGY: &str =
    "Forgive me, young sorcerer. The sacred tongue eludes me at this moment; ask again shortly.";

/// Configuration for the responder.
#[derive(Debug, Clone)]
pub struct ResponderConfig {
    /// Model identifier sent with every request
    pub model: String,
    /// System persona pinned at the head of the history
    pub persona: String,
    /// Dialogue turns kept behind the persona
    pub max_history: usize,
    /// Sampling parameters
    pub sampling: SamplingParams,
    /// Upper bound on a single completion call
    pub request_timeout: Duration,
    /// Append the raw failure reason to the apology
    pub expose_error_detail: bool,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            persona: DEFAULT_PERSONA.to_string(),
            max_history: DEFAULT_MAX_HISTORY,
            sampling: SamplingParams::default(),
            request_timeout: Duration::from_secs(60),
            expose_error_detail: false,
        }
    }
}

impl ResponderConfig {
    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    #[must_use]
    pub fn with_persona(mut self, persona: String) -> Self {
        self.persona = persona;
        self
    }

    #[must_use]
    pub const fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    #[must_use]
    pub const fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    #[must_use]
    pub const fn with_error_detail(mut self, expose: bool) -> Self {
        self.expose_error_detail = expose;
        self
    }

    /// Build the empty history this config describes.
    pub fn build_history(&self) -> Result<ConversationHistory> {
        ConversationHistory::with_max_history(&self.persona, self.max_history)
    }
}

/// Result of one remote completion attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Trimmed, non-empty reply text
    Answered(String),
    /// Description of what went wrong
    Failed(String),
}

/// Result of one `respond` call, before it is rendered as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// Input was blank; nothing was sent or recorded
    EmptyInput,
    Answered(String),
    Failed { reason: String },
}

impl ReplyOutcome {
    /// Render the outcome as the text handed back to adapters.
    #[must_use]
    pub fn into_text(self, expose_error_detail: bool) -> String {
        match self {
            Self::EmptyInput => PROMPT_FOR_INPUT.to_string(),
            Self::Answered(text) => text,
            Self::Failed { reason } if expose_error_detail => {
                format!("{ERROR_INDICATOR} An error occurred: {reason}")
            }
            Self::Failed { .. } => format!("{ERROR_INDICATOR} {FAILURE_APOLOGY}"),
        }
    }

    #[must_use]
    pub const fn is_answered(&self) -> bool {
        matches!(self, Self::Answered(_))
    }
}

/// Owns one conversation history and the provider used to continue it.
///
/// History mutations are serialized by an async mutex that is released
/// while the remote call is in flight, so concurrent `reply` calls append
/// their user turns in invocation order without blocking each other on the
/// network.
pub struct KnightResponder<P = Arc<dyn LLMProvider>>
where
    P: Send + Sync,
{
    provider: P,
    config: ResponderConfig,
    history: Mutex<ConversationHistory>,
}

impl<P> KnightResponder<P>
where
    P: LLMProvider + Send + Sync,
{
    /// Create a responder with a fresh history seeded from `config.persona`.
    pub fn new(provider: P, config: ResponderConfig) -> Result<Self> {
        let history = config.build_history()?;
        Ok(Self::with_history(provider, config, history))
    }

    /// Create a responder around an existing history.
    pub fn with_history(provider: P, config: ResponderConfig, history: ConversationHistory) -> Self {
        info!(
            model = %config.model,
            max_history = history.max_history(),
            "Creating knight responder"
        );

        Self {
            provider,
            config,
            history: Mutex::new(history),
        }
    }

    /// Answer one utterance. Never fails: problems come back as text.
    pub async fn reply(&self, user_text: &str) -> String {
        self.respond(user_text)
            .await
            .into_text(self.config.expose_error_detail)
    }

    /// Answer one utterance, keeping the outcome structured.
    pub async fn respond(&self, user_text: &str) -> ReplyOutcome {
        let text = user_text.trim();
        if text.is_empty() {
            return ReplyOutcome::EmptyInput;
        }

        let turn_id = Uuid::now_v7();

        let messages = {
            let mut history = self.history.lock().await;
            if let Err(e) = history.append(Role::User, text) {
                return ReplyOutcome::Failed {
                    reason: e.to_string(),
                };
            }
            history.snapshot()
        };

        debug!(%turn_id, turns = messages.len(), "Awaiting model response");

        match self.complete(messages).await {
            CompletionOutcome::Answered(reply) => {
                let mut history = self.history.lock().await;
                match history.append(Role::Assistant, &reply) {
                    Ok(()) => {
                        debug!(%turn_id, chars = reply.len(), "Turn answered");
                        ReplyOutcome::Answered(reply)
                    }
                    Err(e) => ReplyOutcome::Failed {
                        reason: e.to_string(),
                    },
                }
            }
            CompletionOutcome::Failed(reason) => {
                warn!(%turn_id, %reason, "Completion failed, leaving user turn unanswered");
                ReplyOutcome::Failed { reason }
            }
        }
    }

    /// Make exactly one bounded completion attempt.
    async fn complete(&self, messages: Vec<ChatMessage>) -> CompletionOutcome {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages,
            sampling: self.config.sampling,
        };

        match timeout(self.config.request_timeout, self.provider.chat(&request)).await {
            Ok(Ok(response)) => {
                let reply = response.content.trim();
                if reply.is_empty() {
                    CompletionOutcome::Failed("model returned an empty reply".to_string())
                } else {
                    CompletionOutcome::Answered(reply.to_string())
                }
            }
            Ok(Err(e)) => CompletionOutcome::Failed(format!("{e:#}")),
            Err(_) => CompletionOutcome::Failed(format!(
                "completion timed out after {}s",
                self.config.request_timeout.as_secs_f32()
            )),
        }
    }

    /// Current turns, persona first.
    pub async fn snapshot(&self) -> Vec<ChatMessage> {
        self.history.lock().await.snapshot()
    }

    pub async fn stats(&self) -> HistoryStats {
        self.history.lock().await.stats()
    }

    /// Forget the dialogue, keeping the persona.
    pub async fn reset(&self) {
        self.history.lock().await.reset();
        info!("Conversation history reset");
    }

    #[must_use]
    pub const fn config(&self) -> &ResponderConfig {
        &self.config
    }
}
