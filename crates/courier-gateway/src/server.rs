// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use courier_config::model::ServerConfig;
use courier_core::{CourierError, StorageAdapter};
use courier_dispatch::{CampaignController, TransferQueue};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;
use crate::hub::Hub;
use crate::ws;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub storage: Arc<dyn StorageAdapter>,
    pub controller: Arc<CampaignController>,
    pub transfers: Arc<TransferQueue>,
    pub hub: Hub,
    pub auth: AuthConfig,
}

/// Build the full route tree.
///
/// - `GET /health` (public)
/// - `/v1/...` campaign, transfer and receipt routes (bearer auth)
/// - `GET /ws` (auth via query params at the handshake)
pub fn router(state: GatewayState) -> Router {
    let auth_state = state.auth.clone();

    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/campaigns", post(handlers::create_campaign))
        .route("/v1/campaigns/{id}", get(handlers::get_campaign))
        .route("/v1/campaigns/{id}/schedule", post(handlers::schedule_campaign))
        .route("/v1/campaigns/{id}/start", post(handlers::start_campaign))
        .route("/v1/campaigns/{id}/pause", post(handlers::pause_campaign))
        .route("/v1/campaigns/{id}/cancel", post(handlers::cancel_campaign))
        .route("/v1/transfers", post(handlers::create_transfer))
        .route("/v1/transfers/pick", post(handlers::pick_transfer))
        .route("/v1/transfers/{id}/assign", post(handlers::assign_transfer))
        .route("/v1/transfers/{id}/resume", post(handlers::resume_transfer))
        .route("/v1/receipts", post(handlers::post_receipt))
        .route_layer(axum_middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .with_state(state.clone());

    let ws_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .merge(ws_routes)
        .layer(CorsLayer::permissive())
}

/// Serve the gateway until `cancel` fires.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), CourierError> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CourierError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| CourierError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway stopped");
    Ok(())
}
