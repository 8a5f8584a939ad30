//! Mock blockchain endpoints

use crate::{
    auth::{require_admin, AuthUser},
    error::{ApiError, ApiResult},
    AppState,
};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use farmchain_core::{BatchAction, BatchId, MockTransaction, SubmitReceipt};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTxRequest {
    pub batch_id: String,
    /// Action label recorded on the transaction
    pub action: String,
}

/// Transaction with its explorer link
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxView {
    #[serde(flatten)]
    pub transaction: MockTransaction,
    pub explorer_url: String,
}

/// POST /api/mock/tx
pub async fn submit(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Json(req): Json<SubmitTxRequest>,
) -> ApiResult<(StatusCode, Json<SubmitReceipt>)> {
    let action = BatchAction::from_str(&req.action)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown action: {}", req.action)))?;

    let receipt = state
        .mockchain
        .submit(BatchId::new(req.batch_id), action)
        .await?;

    Ok((StatusCode::ACCEPTED, Json(receipt)))
}

/// GET /api/mock/tx (admin-gated)
pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<TxView>>> {
    require_admin(&state, &headers)?;

    let txs = state
        .mockchain
        .list_transactions()?
        .into_iter()
        .map(|transaction| TxView {
            explorer_url: state.mockchain.explorer_url(&transaction.tx_hash),
            transaction,
        })
        .collect();

    Ok(Json(txs))
}

/// GET /api/mock/tx/:tx_hash (public)
pub async fn status(
    State(state): State<AppState>,
    Path(tx_hash): Path<String>,
) -> ApiResult<Json<TxView>> {
    let transaction = state.mockchain.get_status(&tx_hash)?;
    Ok(Json(TxView {
        explorer_url: state.mockchain.explorer_url(&transaction.tx_hash),
        transaction,
    }))
}

/// POST /api/mock/tx/:tx_hash/confirm (admin-gated)
pub async fn confirm(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tx_hash): Path<String>,
) -> ApiResult<Json<TxView>> {
    require_admin(&state, &headers)?;

    let transaction = state.mockchain.force_confirm(&tx_hash)?;
    Ok(Json(TxView {
        explorer_url: state.mockchain.explorer_url(&transaction.tx_hash),
        transaction,
    }))
}
