//! Consumer-facing trace projection
//!
//! Assembles the public view of a batch: its timeline enriched with actor
//! identities and human labels, the derived stage, a trust score, and the
//! trace URL that QR codes encode.

use crate::{
    lifecycle::BatchStage,
    storage::Storage,
    types::{Batch, BatchId, Event, UserProfile},
    Result,
};
use serde::Serialize;

/// Timeline entry enriched for display
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEvent {
    /// The underlying ledger event
    #[serde(flatten)]
    pub event: Event,

    /// Human label for the action
    pub label: &'static str,

    /// Acting user, if still registered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<UserProfile>,
}

/// Public trace view of a batch
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchTrace {
    pub batch: Batch,

    /// Owning farmer, if still registered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub farmer: Option<UserProfile>,

    /// Derived lifecycle stage tag
    pub stage: String,

    /// Full timeline, oldest first
    pub events: Vec<TraceEvent>,

    /// Verification trust score, 0-100
    pub trust_score: u32,

    /// URL the batch's QR code encodes
    pub trace_url: String,
}

/// Trust score: a base of 50, plus 10 per recorded event, plus 20 per
/// event anchored to a transaction hash, capped at 100.
pub fn trust_score(events: &[Event]) -> u32 {
    let recorded = events.len() as u32;
    let anchored = events.iter().filter(|e| e.tx_hash.is_some()).count() as u32;
    (50 + 10 * recorded + 20 * anchored).min(100)
}

/// Assemble the trace view for a batch
pub fn build_trace(storage: &Storage, trace_base_url: &str, batch_id: &BatchId) -> Result<BatchTrace> {
    let batch = storage.get_batch(batch_id)?;
    let events = storage.get_events(batch_id)?;

    let farmer = storage.get_user(batch.farmer_id).ok().map(|u| u.profile());
    let stage = BatchStage::replay(events.iter());
    let score = trust_score(&events);

    let trace_events = events
        .into_iter()
        .map(|event| {
            let actor = storage.get_user(event.actor_id).ok().map(|u| u.profile());
            TraceEvent {
                label: event.action.display_name(),
                actor,
                event,
            }
        })
        .collect();

    let trace_url = format!("{}/{}", trace_base_url.trim_end_matches('/'), batch_id);

    Ok(BatchTrace {
        batch,
        farmer,
        stage: stage.as_str().to_string(),
        events: trace_events,
        trust_score: score,
        trace_url,
    })
}
