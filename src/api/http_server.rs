// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderName},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::errors::ApiError;
use super::handlers::{
    challenge_handler, chat_handler, config_handler, health_handler, metrics_handler,
    remaining_handler, reset_session_handler, verify_handler, version_handler,
};
use crate::admission::identity::FORWARDED_FOR_HEADER;
use crate::admission::{
    client_identity, AdmissionPipeline, AdmissionRequest, ChallengeStore, SessionQuotaManager,
    Sweeper,
};
use crate::chat::ChatBackend;
use crate::clock::SharedClock;
use crate::config::AdmissionConfig;
use crate::monitoring::{AdmissionMetrics, StoreSizes};

pub const DEFAULT_SESSION_HEADER: &str = "x-session-id";

/// Shared state behind every route.
pub struct AppState {
    pub config: AdmissionConfig,
    pub pipeline: Arc<AdmissionPipeline>,
    pub quotas: Arc<SessionQuotaManager>,
    pub challenges: Arc<ChallengeStore>,
    pub chat: Arc<dyn ChatBackend>,
    pub metrics: Arc<AdmissionMetrics>,
    pub session_header: HeaderName,
}

impl AppState {
    pub fn new(
        config: AdmissionConfig,
        clock: SharedClock,
        chat: Arc<dyn ChatBackend>,
    ) -> prometheus::Result<Self> {
        Ok(Self {
            pipeline: Arc::new(AdmissionPipeline::new(&config, clock.clone())),
            quotas: Arc::new(SessionQuotaManager::new(&config, clock.clone())),
            challenges: Arc::new(ChallengeStore::new(clock)),
            chat,
            metrics: Arc::new(AdmissionMetrics::new()?),
            session_header: HeaderName::from_static(DEFAULT_SESSION_HEADER),
            config,
        })
    }

    pub fn with_pipeline(mut self, pipeline: AdmissionPipeline) -> Self {
        self.pipeline = Arc::new(pipeline);
        self
    }

    pub fn with_session_header(mut self, session_header: HeaderName) -> Self {
        self.session_header = session_header;
        self
    }

    /// Sweeper over the same stores the routes use.
    pub fn sweeper(&self) -> Sweeper {
        Sweeper::new(
            self.pipeline.clone(),
            self.quotas.clone(),
            self.challenges.clone(),
        )
    }

    pub fn store_sizes(&self) -> StoreSizes {
        StoreSizes {
            rate_buckets: self.pipeline.buckets().tracked_identities(),
            anomaly_counters: self.pipeline.anomalies().tracked_identities(),
            bans: self.pipeline.bans().len(),
            sessions: self.quotas.tracked_sessions(),
            challenges: self.challenges.pending(),
        }
    }
}

pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        // Chat and session quota
        .route("/api/chat", post(chat_handler))
        .route("/api/session/reset", post(reset_session_handler))
        .route("/api/session/remaining", get(remaining_handler))
        // Service info
        .route("/api/health", get(health_handler))
        .route("/api/config", get(config_handler))
        .route("/api/version", get(version_handler))
        // Human verification
        .route("/api/captcha/challenge", get(challenge_handler))
        .route("/api/captcha/verify", post(verify_handler))
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn_with_state(state.clone(), admission_layer))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Runs the admission pipeline ahead of every route.
async fn admission_layer(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let identity = client_identity(request.headers(), peer);
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok());

    let admission = state.pipeline.admit(&AdmissionRequest {
        identity: &identity,
        user_agent,
        path: request.uri().path(),
    });

    match admission {
        Ok(()) => {
            state.metrics.record_allowed();
            next.run(request).await
        }
        Err(denial) => {
            state.metrics.record_denial(&denial);
            ApiError::from(denial).into_response()
        }
    }
}

pub async fn start_server(state: Arc<AppState>, addr: SocketAddr) -> anyhow::Result<()> {
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("API server listening on {}", addr);
    info!(
        "Client identity taken from {} when present, otherwise the peer address",
        FORWARDED_FOR_HEADER
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
