//! Scripted chat-completion provider for exercising the responder.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use templar_core::{ChatRequest, LLMProvider, LLMResponse, Role};

#[derive(Debug, Clone)]
pub enum Step {
    Reply(String),
    Fail(String),
    Slow(Duration, String),
}

#[derive(Default)]
struct Inner {
    script: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<ChatRequest>>,
}

/// Answers from a queue of steps; once the queue is empty it echoes the last
/// user turn as `re:<text>`.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    inner: Arc<Inner>,
}

impl ScriptedProvider {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        let provider = Self::default();
        provider
            .inner
            .script
            .lock()
            .unwrap()
            .extend(steps);
        provider
    }

    pub fn replying(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Step::Reply((*r).to_string())))
    }

    pub fn calls(&self) -> usize {
        self.inner.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.inner.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn chat(&self, request: &ChatRequest) -> anyhow::Result<LLMResponse> {
        self.inner.requests.lock().unwrap().push(request.clone());
        let step = self.inner.script.lock().unwrap().pop_front();

        let content = match step {
            Some(Step::Reply(text)) => text,
            Some(Step::Fail(reason)) => anyhow::bail!(reason),
            Some(Step::Slow(delay, text)) => {
                tokio::time::sleep(delay).await;
                text
            }
            None => {
                let last_user = request
                    .messages
                    .iter()
                    .rev()
                    .find(|m| m.role == Role::User)
                    .map(|m| m.content.clone())
                    .unwrap_or_default();
                format!("re:{last_user}")
            }
        };

        Ok(LLMResponse {
            content,
            usage: None,
        })
    }

    fn get_default_model(&self) -> &'static str {
        "scripted"
    }
}
