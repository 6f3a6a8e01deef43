//! Return request route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use sandpiper_core::{OrderId, ReturnRequestId, ReturnStatus, ReturnType};

use crate::error::Result;
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::{ReturnRequest, ReturnWithOrderTotal};
use crate::services::returns::ReturnService;
use crate::state::AppState;

/// Return request payload. The request always starts in `Requested`;
/// there is no status field to send.
#[derive(Debug, Deserialize)]
pub struct CreateReturnRequest {
    pub order_id: OrderId,
    pub return_type: ReturnType,
    pub reason: String,
}

/// Staff payload to advance a return request.
#[derive(Debug, Deserialize)]
pub struct UpdateReturnRequest {
    pub status: ReturnStatus,
    #[serde(default)]
    pub return_type: Option<ReturnType>,
}

/// `POST /api/returns` - File a return request for a delivered order.
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(req): Json<CreateReturnRequest>,
) -> Result<(StatusCode, Json<ReturnRequest>)> {
    let request = ReturnService::new(state.pool(), state.shipping())
        .create(&user, req.order_id, req.return_type, req.reason)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// `GET /api/returns/mine` - List the caller's return requests.
pub async fn list_mine(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<ReturnWithOrderTotal>>> {
    let requests = ReturnService::new(state.pool(), state.shipping())
        .list_mine(&user)
        .await?;
    Ok(Json(requests))
}

/// `GET /api/returns` - List every return request (staff).
pub async fn list_all(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<ReturnWithOrderTotal>>> {
    let requests = ReturnService::new(state.pool(), state.shipping())
        .list_all()
        .await?;
    Ok(Json(requests))
}

/// `PUT /api/returns/{id}` - Advance a return request (staff).
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<ReturnRequestId>,
    Json(req): Json<UpdateReturnRequest>,
) -> Result<Json<ReturnRequest>> {
    let request = ReturnService::new(state.pool(), state.shipping())
        .update_status(id, req.status, req.return_type)
        .await?;
    Ok(Json(request))
}
