// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! The conversational backend sitting behind admission control.

pub mod openai;

use async_trait::async_trait;
use thiserror::Error;

pub use openai::OpenAiChatBackend;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("upstream returned an empty reply")]
    EmptyReply,
}

/// Chat completion for one session's conversation.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send `message` in the context of `session_id` and return the reply.
    async fn chat(&self, session_id: &str, message: &str) -> Result<String, ChatError>;

    /// Forget any conversation history kept for `session_id`.
    async fn clear_history(&self, session_id: &str);
}
