//! Batch CRUD and the public trace view

use crate::{
    auth::AuthUser,
    error::ApiResult,
    AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use farmchain_core::{
    build_trace, Batch, BatchId, BatchTrace, BatchUpdate, Event, NewBatch, Role,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBatchRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    pub variety: Option<String>,

    pub quantity: Decimal,

    #[validate(length(min = 1, max = 40))]
    pub unit: String,

    pub harvest_date: NaiveDate,

    pub location: Option<String>,

    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBatchRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub variety: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit: Option<String>,
    pub location: Option<String>,
    pub images: Option<Vec<String>>,
}

/// Batch listing entry: the batch plus its most recent event
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    #[serde(flatten)]
    pub batch: Batch,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_event: Option<Event>,
}

/// Batch detail: the batch plus its full ordered timeline
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDetail {
    #[serde(flatten)]
    pub batch: Batch,
    pub events: Vec<Event>,
    pub stage: String,
}

/// POST /api/batches
pub async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<CreateBatchRequest>,
) -> ApiResult<(StatusCode, Json<Batch>)> {
    req.validate()?;

    let batch = state.ledger.create_batch(
        &user,
        NewBatch {
            title: req.title,
            variety: req.variety,
            quantity: req.quantity,
            unit: req.unit,
            harvest_date: req.harvest_date,
            location: req.location,
            images: req.images,
        },
    )?;

    Ok((StatusCode::CREATED, Json(batch)))
}

/// GET /api/batches
///
/// Farmers see their own batches; every other role sees all of them.
pub async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<BatchSummary>>> {
    let batches = if user.role == Role::Farmer {
        state.ledger.list_batches_by_farmer(user.id)?
    } else {
        state.ledger.list_batches()?
    };

    let mut summaries = Vec::with_capacity(batches.len());
    for batch in batches {
        let latest_event = state.ledger.latest_event(&batch.batch_id)?;
        summaries.push(BatchSummary { batch, latest_event });
    }

    Ok(Json(summaries))
}

/// GET /api/batches/:batch_id (public)
pub async fn get(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> ApiResult<Json<BatchDetail>> {
    let batch_id = BatchId::new(batch_id);
    let batch = state.ledger.get_batch(&batch_id)?;
    let events = state.ledger.list_events(&batch_id)?;
    let stage = state.ledger.stage(&batch_id)?;

    Ok(Json(BatchDetail {
        batch,
        events,
        stage: stage.as_str().to_string(),
    }))
}

/// PUT /api/batches/:batch_id
pub async fn update(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(batch_id): Path<String>,
    Json(req): Json<UpdateBatchRequest>,
) -> ApiResult<Json<Batch>> {
    req.validate()?;

    let batch = state.ledger.update_batch(
        &user,
        &BatchId::new(batch_id),
        BatchUpdate {
            title: req.title,
            variety: req.variety,
            quantity: req.quantity,
            unit: req.unit,
            location: req.location,
            images: req.images,
        },
    )?;

    Ok(Json(batch))
}

/// GET /api/batches/:batch_id/trace (public)
pub async fn trace(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> ApiResult<Json<BatchTrace>> {
    let trace = build_trace(
        &state.storage,
        &state.config.trace_base_url,
        &BatchId::new(batch_id),
    )?;
    Ok(Json(trace))
}
