// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Result};
use axum::http::HeaderName;
use clap::Args;
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use tracing::info;

use crate::admission::AdmissionPipeline;
use crate::api::{start_server, AppState, DEFAULT_SESSION_HEADER};
use crate::chat::OpenAiChatBackend;
use crate::clock::SystemClock;
use crate::config::AdmissionConfig;

/// Arguments for the serve command
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address the HTTP gateway binds to
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: SocketAddr,

    /// TOML file with an [admission] table
    #[arg(long, env = "ADMISSION_CONFIG")]
    pub config: Option<PathBuf>,

    /// Base URL of the OpenAI-compatible chat backend
    #[arg(long, env = "CHAT_UPSTREAM_URL", default_value = "http://localhost:8081")]
    pub upstream_url: String,

    /// Model name sent to the chat backend
    #[arg(long, env = "CHAT_MODEL", default_value = "default")]
    pub model: String,

    /// Bearer token for the chat backend
    #[arg(long, env = "CHAT_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// System prompt prepended to every conversation
    #[arg(long, env = "CHAT_SYSTEM_PROMPT")]
    pub system_prompt: Option<String>,

    /// Seconds between background sweeps of idle state (0 disables)
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value_t = 60)]
    pub sweep_interval_secs: u64,

    /// Header carrying the client's session id
    #[arg(long, env = "SESSION_HEADER", default_value = DEFAULT_SESSION_HEADER)]
    pub session_header: String,

    /// Comma-separated paths that consume rate-limit tokens
    #[arg(long, env = "PROTECTED_PATHS", value_delimiter = ',', default_value = "/api/chat")]
    pub protected_paths: Vec<String>,
}

pub async fn run(args: ServeArgs) -> Result<()> {
    let config = AdmissionConfig::load(args.config.as_deref())?;
    info!(
        "Admission limits: {}/min, {}/hour, {} conversations per session, ban after {}/min for {} min",
        config.max_requests_per_minute,
        config.max_requests_per_hour,
        config.max_conversations_per_session,
        config.ban_threshold,
        config.ban_duration_minutes
    );

    let session_header = HeaderName::from_bytes(args.session_header.to_lowercase().as_bytes())
        .map_err(|e| anyhow!("invalid session header {:?}: {}", args.session_header, e))?;

    let backend = OpenAiChatBackend::new(&args.upstream_url, &args.model)?
        .with_api_key(args.api_key)
        .with_system_prompt(args.system_prompt);

    let clock = SystemClock::shared();
    let pipeline = AdmissionPipeline::new(&config, clock.clone())
        .with_protected_paths(args.protected_paths.iter().map(|path| path.trim()));
    info!("Protected paths: {:?}", args.protected_paths);

    let state = Arc::new(
        AppState::new(config, clock, Arc::new(backend))?
            .with_pipeline(pipeline)
            .with_session_header(session_header),
    );

    let sweeper = (args.sweep_interval_secs > 0).then(|| {
        info!("Sweeping idle admission state every {}s", args.sweep_interval_secs);
        state
            .sweeper()
            .spawn(Duration::from_secs(args.sweep_interval_secs))
    });

    let result = start_server(state, args.listen_addr).await;
    if let Some(handle) = sweeper {
        handle.abort();
    }
    result
}
