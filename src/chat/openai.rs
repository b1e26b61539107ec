// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Chat backend for an OpenAI-compatible completion endpoint

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::{ChatBackend, ChatError};

/// Messages of history sent upstream per turn (user + assistant pairs)
pub const MAX_HISTORY_MESSAGES: usize = 20;

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: ChatMessage,
}

pub struct OpenAiChatBackend {
    client: Client,
    endpoint: String,
    model_name: String,
    api_key: Option<String>,
    system_prompt: Option<String>,
    history: DashMap<String, Vec<ChatMessage>>,
}

impl OpenAiChatBackend {
    pub fn new(endpoint: &str, model_name: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        let endpoint = endpoint.trim_end_matches('/').to_string();
        info!(
            "Chat backend configured: endpoint={}, model={}",
            endpoint, model_name
        );

        Ok(Self {
            client,
            endpoint,
            model_name: model_name.to_string(),
            api_key: None,
            system_prompt: None,
            history: DashMap::new(),
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }

    pub fn history_len(&self, session_id: &str) -> usize {
        self.history
            .get(session_id)
            .map(|messages| messages.len())
            .unwrap_or(0)
    }

    fn build_messages(&self, session_id: &str, message: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::new();
        if let Some(prompt) = &self.system_prompt {
            messages.push(ChatMessage::new("system", prompt));
        }
        if let Some(history) = self.history.get(session_id) {
            messages.extend(history.iter().cloned());
        }
        messages.push(ChatMessage::new("user", message));
        messages
    }

    fn remember(&self, session_id: &str, message: &str, reply: &str) {
        let mut history = self.history.entry(session_id.to_string()).or_default();
        history.push(ChatMessage::new("user", message));
        history.push(ChatMessage::new("assistant", reply));
        let overflow = history.len().saturating_sub(MAX_HISTORY_MESSAGES);
        history.drain(..overflow);
    }
}

#[async_trait]
impl ChatBackend for OpenAiChatBackend {
    async fn chat(&self, session_id: &str, message: &str) -> Result<String, ChatError> {
        let request = CompletionRequest {
            model: &self.model_name,
            messages: self.build_messages(session_id, message),
        };

        let mut builder = self
            .client
            .post(format!("{}/v1/chat/completions", self.endpoint))
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ChatError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let completion: CompletionResponse = response.json().await?;
        let reply = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ChatError::EmptyReply)?;

        self.remember(session_id, message, &reply);
        debug!("Session {} history: {} messages", session_id, self.history_len(session_id));
        Ok(reply)
    }

    async fn clear_history(&self, session_id: &str) {
        self.history.remove(session_id);
    }
}
