// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use courier_core::{
    AgentTransfer, Campaign, CourierError, HealthStatus, PluginAdapter, ReceiptStatus,
};
use courier_dispatch::NewCampaign;
use serde::{Deserialize, Serialize};

use crate::server::GatewayState;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A [`CourierError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub CourierError);

impl From<CourierError> for ApiError {
    fn from(e: CourierError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            CourierError::NotFound { .. } => StatusCode::NOT_FOUND,
            CourierError::InvalidTransition { .. } | CourierError::Conflict(_) => {
                StatusCode::CONFLICT
            }
            CourierError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = ErrorResponse {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub connections: usize,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    /// RFC 3339 start time.
    pub scheduled_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateTransferRequest {
    pub organization_id: String,
    pub contact_id: String,
    #[serde(default)]
    pub team_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PickTransferRequest {
    pub organization_id: String,
    pub agent_id: String,
    #[serde(default)]
    pub team_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignTransferRequest {
    pub agent_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ReceiptRequest {
    pub provider_message_id: String,
    pub status: ReceiptStatus,
}

#[derive(Debug, Serialize)]
pub struct ReceiptResponse {
    /// Whether the receipt moved a counter. Unknown and duplicate receipts do not.
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign: Option<Campaign>,
}

/// GET /health
///
/// Unauthenticated. Reports storage health and live connection count.
pub async fn get_health(State(state): State<GatewayState>) -> Response {
    let connections = state.hub.connection_count().await;
    let (code, status) = match state.storage.health_check().await {
        Ok(HealthStatus::Healthy) => (StatusCode::OK, "ok".to_string()),
        Ok(HealthStatus::Degraded(reason)) => (StatusCode::OK, format!("degraded: {reason}")),
        Ok(HealthStatus::Unhealthy(reason)) => {
            (StatusCode::SERVICE_UNAVAILABLE, format!("unhealthy: {reason}"))
        }
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, format!("unhealthy: {e}")),
    };
    let body = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        connections,
    };
    (code, Json(body)).into_response()
}

/// POST /v1/campaigns
pub async fn create_campaign(
    State(state): State<GatewayState>,
    Json(body): Json<NewCampaign>,
) -> ApiResult<(StatusCode, Json<Campaign>)> {
    let campaign = state.controller.create(body).await?;
    Ok((StatusCode::CREATED, Json(campaign)))
}

/// GET /v1/campaigns/{id}
pub async fn get_campaign(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Campaign>> {
    Ok(Json(state.controller.get(&id).await?))
}

/// POST /v1/campaigns/{id}/schedule
pub async fn schedule_campaign(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<ScheduleRequest>,
) -> ApiResult<Json<Campaign>> {
    let at = DateTime::parse_from_rfc3339(&body.scheduled_at)
        .map_err(|e| {
            CourierError::Validation(format!("invalid scheduled_at {:?}: {e}", body.scheduled_at))
        })?
        .with_timezone(&Utc);
    Ok(Json(state.controller.schedule(&id, at).await?))
}

/// POST /v1/campaigns/{id}/start
pub async fn start_campaign(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Campaign>> {
    Ok(Json(state.controller.start(&id).await?))
}

/// POST /v1/campaigns/{id}/pause
pub async fn pause_campaign(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Campaign>> {
    Ok(Json(state.controller.pause(&id).await?))
}

/// POST /v1/campaigns/{id}/cancel
pub async fn cancel_campaign(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Campaign>> {
    Ok(Json(state.controller.cancel(&id).await?))
}

/// POST /v1/transfers
pub async fn create_transfer(
    State(state): State<GatewayState>,
    Json(body): Json<CreateTransferRequest>,
) -> ApiResult<(StatusCode, Json<AgentTransfer>)> {
    let transfer = state
        .transfers
        .create(&body.organization_id, &body.contact_id, body.team_id.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(transfer)))
}

/// POST /v1/transfers/pick
///
/// 200 with the claimed transfer, 204 when nothing is waiting.
pub async fn pick_transfer(
    State(state): State<GatewayState>,
    Json(body): Json<PickTransferRequest>,
) -> ApiResult<Response> {
    let picked = state
        .transfers
        .pick_next(&body.organization_id, &body.agent_id, body.team_id.as_deref())
        .await?;
    Ok(match picked {
        Some(transfer) => Json(transfer).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

/// POST /v1/transfers/{id}/assign
pub async fn assign_transfer(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<AssignTransferRequest>,
) -> ApiResult<Json<AgentTransfer>> {
    Ok(Json(state.transfers.assign(&id, &body.agent_id).await?))
}

/// POST /v1/transfers/{id}/resume
pub async fn resume_transfer(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> ApiResult<Json<AgentTransfer>> {
    Ok(Json(state.transfers.resume(&id).await?))
}

/// POST /v1/receipts
pub async fn post_receipt(
    State(state): State<GatewayState>,
    Json(body): Json<ReceiptRequest>,
) -> ApiResult<Json<ReceiptResponse>> {
    let campaign = state
        .controller
        .apply_receipt(&body.provider_message_id, body.status)
        .await?;
    Ok(Json(ReceiptResponse {
        applied: campaign.is_some(),
        campaign,
    }))
}
