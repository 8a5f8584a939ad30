//! Event timeline: append, list, and the composite verify flow

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use farmchain_core::{
    BatchAction, BatchId, Event, EventDetails, MockTransaction, SubmitReceipt,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendEventRequest {
    /// Action wire tag (PICKED_UP, IN_TRANSIT, ...)
    pub action: String,

    /// Structured payload; shape is validated against the action
    #[serde(default)]
    pub details: Option<EventDetails>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub event: Event,
    pub transaction: MockTransaction,
    pub receipt: SubmitReceipt,
}

/// POST /api/events/:batch_id/events
pub async fn append(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(batch_id): Path<String>,
    Json(req): Json<AppendEventRequest>,
) -> ApiResult<(StatusCode, Json<Event>)> {
    let action = BatchAction::from_str(&req.action)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown action: {}", req.action)))?;

    let event = state.ledger.append_event(
        &user,
        &BatchId::new(batch_id),
        action,
        req.details.unwrap_or_default(),
        None,
        false,
    )?;

    Ok((StatusCode::CREATED, Json(event)))
}

/// GET /api/events/:batch_id/events (public)
pub async fn list(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> ApiResult<Json<Vec<Event>>> {
    Ok(Json(state.ledger.list_events(&BatchId::new(batch_id))?))
}

/// POST /api/events/:batch_id/verify
///
/// The consumer "verify on chain" flow as one call: submit a mock
/// transaction, confirm it immediately, and anchor a `VERIFIED_ON_CHAIN`
/// event carrying the hash.
pub async fn verify(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(batch_id): Path<String>,
) -> ApiResult<(StatusCode, Json<VerifyResponse>)> {
    let batch_id = BatchId::new(batch_id);

    // 404 before any transaction is minted
    state.ledger.get_batch(&batch_id)?;

    let receipt = state
        .mockchain
        .submit(batch_id.clone(), BatchAction::VerifiedOnChain)
        .await?;
    let transaction = state.mockchain.force_confirm(receipt.tx_hash.as_str())?;

    let event = state.ledger.append_event(
        &user,
        &batch_id,
        BatchAction::VerifiedOnChain,
        EventDetails::empty(),
        Some(receipt.tx_hash.clone()),
        true,
    )?;

    Ok((
        StatusCode::CREATED,
        Json(VerifyResponse {
            event,
            transaction,
            receipt,
        }),
    ))
}
