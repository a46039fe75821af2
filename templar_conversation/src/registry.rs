//! Routing of inbound senders to conversation histories.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use templar_core::LLMProvider;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::Result;
use crate::history::ConversationHistory;
use crate::responder::{KnightResponder, ResponderConfig};

/// How inbound senders map onto conversation histories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryScope {
    /// Every sender feeds one process-wide history.
    #[default]
    Shared,
    /// Each sender id gets its own history, created on first contact.
    PerSender,
}

/// Bounds on the per-sender histories kept in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderLimits {
    /// Live histories allowed at once, 0 for unlimited. The least recently
    /// active sender is dropped to make room.
    pub max_senders: usize,
    /// Histories untouched for this long are dropped by `evict_idle`.
    pub idle_timeout: Duration,
}

impl Default for SenderLimits {
    fn default() -> Self {
        Self {
            max_senders: 1000,
            idle_timeout: Duration::from_secs(60 * 60),
        }
    }
}

struct SenderSlot<P>
where
    P: Send + Sync,
{
    responder: Arc<KnightResponder<P>>,
    last_seen: Instant,
}

impl<P> SenderSlot<P>
where
    P: Send + Sync,
{
    /// A reply is running against this history.
    fn in_use(&self) -> bool {
        Arc::strong_count(&self.responder) > 1
    }
}

enum Conversations<P>
where
    P: Send + Sync,
{
    Shared(Arc<KnightResponder<P>>),
    PerSender {
        template: ConversationHistory,
        responders: Mutex<HashMap<String, SenderSlot<P>>>,
    },
}

/// Owns the responder(s) behind the adapters.
pub struct ConversationRegistry<P = Arc<dyn LLMProvider>>
where
    P: Send + Sync,
{
    provider: P,
    config: ResponderConfig,
    limits: SenderLimits,
    conversations: Conversations<P>,
}

impl<P> ConversationRegistry<P>
where
    P: LLMProvider + Clone + Send + Sync,
{
    /// Validate the persona and set up the configured scope.
    pub fn new(provider: P, config: ResponderConfig, scope: HistoryScope) -> Result<Self> {
        let template = config.build_history()?;
        info!(?scope, "Creating conversation registry");

        let conversations = match scope {
            HistoryScope::Shared => Conversations::Shared(Arc::new(KnightResponder::with_history(
                provider.clone(),
                config.clone(),
                template,
            ))),
            HistoryScope::PerSender => Conversations::PerSender {
                template,
                responders: Mutex::new(HashMap::new()),
            },
        };

        Ok(Self {
            provider,
            config,
            limits: SenderLimits::default(),
            conversations,
        })
    }

    #[must_use]
    pub const fn with_sender_limits(mut self, limits: SenderLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub const fn sender_limits(&self) -> SenderLimits {
        self.limits
    }

    #[must_use]
    pub const fn scope(&self) -> HistoryScope {
        match self.conversations {
            Conversations::Shared(_) => HistoryScope::Shared,
            Conversations::PerSender { .. } => HistoryScope::PerSender,
        }
    }

    /// The responder that answers `sender_id`.
    pub async fn responder_for(&self, sender_id: &str) -> Arc<KnightResponder<P>> {
        match &self.conversations {
            Conversations::Shared(responder) => Arc::clone(responder),
            Conversations::PerSender {
                template,
                responders,
            } => {
                let mut responders = responders.lock().await;
                let now = Instant::now();

                if let Some(slot) = responders.get_mut(sender_id) {
                    slot.last_seen = now;
                    return Arc::clone(&slot.responder);
                }

                if self.limits.max_senders > 0 && responders.len() >= self.limits.max_senders {
                    evict_least_recent(&mut responders);
                }

                info!(sender_id, "Starting conversation for new sender");
                let responder = Arc::new(KnightResponder::with_history(
                    self.provider.clone(),
                    self.config.clone(),
                    template.clone(),
                ));
                responders.insert(
                    sender_id.to_string(),
                    SenderSlot {
                        responder: Arc::clone(&responder),
                        last_seen: now,
                    },
                );
                responder
            }
        }
    }

    /// Answer `text` from `sender_id`. Never fails.
    pub async fn reply(&self, sender_id: &str, text: &str) -> String {
        // The map lock is released before the reply so senders don't queue on each other.
        let responder = self.responder_for(sender_id).await;
        responder.reply(text).await
    }

    /// Clear the history `sender_id` talks to.
    pub async fn reset(&self, sender_id: &str) {
        match &self.conversations {
            Conversations::Shared(responder) => responder.reset().await,
            Conversations::PerSender { responders, .. } => {
                let responder = responders
                    .lock()
                    .await
                    .get(sender_id)
                    .map(|slot| Arc::clone(&slot.responder));
                if let Some(responder) = responder {
                    responder.reset().await;
                }
            }
        }
    }

    /// Number of live histories.
    pub async fn active_conversations(&self) -> usize {
        match &self.conversations {
            Conversations::Shared(_) => 1,
            Conversations::PerSender { responders, .. } => responders.lock().await.len(),
        }
    }

    /// Drop per-sender histories idle for longer than the configured
    /// timeout. Returns how many were dropped.
    pub async fn evict_idle(&self) -> usize {
        let Conversations::PerSender { responders, .. } = &self.conversations else {
            return 0;
        };

        let idle_timeout = self.limits.idle_timeout;
        let mut responders = responders.lock().await;
        let before = responders.len();
        responders.retain(|_, slot| slot.in_use() || slot.last_seen.elapsed() < idle_timeout);

        let evicted = before - responders.len();
        if evicted > 0 {
            debug!(evicted, kept = responders.len(), "Evicted idle conversations");
        }
        evicted
    }

    #[must_use]
    pub const fn config(&self) -> &ResponderConfig {
        &self.config
    }
}

fn evict_least_recent<P>(responders: &mut HashMap<String, SenderSlot<P>>)
where
    P: Send + Sync,
{
    let oldest = responders
        .iter()
        .filter(|(_, slot)| !slot.in_use())
        .min_by_key(|(_, slot)| slot.last_seen)
        .map(|(sender_id, _)| sender_id.clone());

    if let Some(sender_id) = oldest {
        debug!(%sender_id, "Conversation limit reached, dropping least recent sender");
        responders.remove(&sender_id);
    }
}
