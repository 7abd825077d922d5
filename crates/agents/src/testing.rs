//! Scripted [`ChatClient`] for tests in this and dependent crates.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::llm::ChatClient;
use crate::schema::{AssistantMessage, ChatRequest};

/// Returns scripted replies in order and records every request.
pub struct ScriptedClient {
    replies: Mutex<Vec<AssistantMessage>>,
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedClient {
    pub fn new(replies: Vec<AssistantMessage>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().rev().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Text of the last message of request `i`
    pub fn last_message(&self, i: usize) -> String {
        let requests = self.requests.lock().unwrap();
        requests[i].messages.last().map(|m| m.content.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ChatClient for ScriptedClient {
    async fn complete(&self, request: ChatRequest) -> Result<AssistantMessage> {
        self.requests.lock().unwrap().push(request);
        self.replies.lock().unwrap().pop().context("no scripted reply left")
    }

    fn model(&self) -> &str {
        "scripted"
    }
}
