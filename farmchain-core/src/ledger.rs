//! Batch ledger: validated writes over the append-only event log
//!
//! All mutations flow through here. The ledger enforces ownership and role
//! rules, derives the lifecycle stage by replay, and serializes appends per
//! batch so the check-then-append is atomic under concurrent writers.

use crate::{
    config::Config,
    lifecycle::{allowed_actions, check_transition, BatchStage},
    metrics::Metrics,
    storage::Storage,
    types::{Batch, BatchAction, BatchId, Event, EventDetails, Role, TxHash, User},
    Error, Result,
};
use chrono::{Datelike, NaiveDate, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Parameters for creating a batch
#[derive(Debug, Clone)]
pub struct NewBatch {
    pub title: String,
    pub variety: Option<String>,
    pub quantity: Decimal,
    pub unit: String,
    pub harvest_date: NaiveDate,
    pub location: Option<String>,
    pub images: Vec<String>,
}

/// Partial update to a batch's descriptive fields
///
/// Ownership and identity fields (`batch_id`, `farmer_id`) are immutable.
#[derive(Debug, Clone, Default)]
pub struct BatchUpdate {
    pub title: Option<String>,
    pub variety: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit: Option<String>,
    pub location: Option<String>,
    pub images: Option<Vec<String>>,
}

/// Validated ledger over batch and event storage
pub struct Ledger {
    storage: Arc<Storage>,
    metrics: Metrics,

    /// Per-batch append locks; check-then-append must not interleave
    append_locks: DashMap<BatchId, Arc<Mutex<()>>>,
}

impl Ledger {
    /// Create a ledger over opened storage
    pub fn new(storage: Arc<Storage>, metrics: Metrics) -> Self {
        Self {
            storage,
            metrics,
            append_locks: DashMap::new(),
        }
    }

    /// Open storage and build a ledger in one step
    pub fn open(config: &Config, metrics: Metrics) -> Result<Self> {
        let storage = Arc::new(Storage::open(config)?);
        Ok(Self::new(storage, metrics))
    }

    /// Underlying storage handle (shared with the confirmation engine)
    pub fn storage(&self) -> Arc<Storage> {
        Arc::clone(&self.storage)
    }

    fn append_lock(&self, batch_id: &BatchId) -> Arc<Mutex<()>> {
        self.append_locks
            .entry(batch_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // Batch operations

    /// Create a batch with its system-generated CREATED event
    ///
    /// Farmer-only. The batch ID is allocated from a monotonic counter, so
    /// concurrent creations never collide.
    pub fn create_batch(&self, actor: &User, params: NewBatch) -> Result<Batch> {
        if actor.role != Role::Farmer {
            return Err(Error::Authorization(
                "Only farmers can create batches".to_string(),
            ));
        }

        if params.title.trim().is_empty() {
            return Err(Error::Validation("Title must not be empty".to_string()));
        }
        if params.quantity <= Decimal::ZERO {
            return Err(Error::Validation("Quantity must be positive".to_string()));
        }
        if params.unit.trim().is_empty() {
            return Err(Error::Validation("Unit must not be empty".to_string()));
        }

        let now = Utc::now();
        let seq = self.storage.next_batch_seq()?;
        let batch_id = BatchId::from_parts(now.year(), seq);

        let batch = Batch {
            batch_id: batch_id.clone(),
            title: params.title,
            variety: params.variety,
            quantity: params.quantity,
            unit: params.unit,
            harvest_date: params.harvest_date,
            location: params.location,
            images: params.images,
            farmer_id: actor.id,
            created_at: now,
            updated_at: now,
        };

        let created_event = Event {
            event_id: Uuid::now_v7(),
            batch_id,
            actor_id: actor.id,
            actor_role: actor.role,
            action: BatchAction::Created,
            details: EventDetails::empty(),
            tx_hash: None,
            confirmed: false,
            seq: 1,
            timestamp: now,
        };

        self.storage.create_batch(&batch, &created_event)?;

        self.metrics.batches_total.inc();
        self.metrics.events_total.inc();

        tracing::info!(batch_id = %batch.batch_id, farmer = %actor.id, "Batch created");

        Ok(batch)
    }

    /// Update a batch's descriptive fields (owner only)
    pub fn update_batch(
        &self,
        actor: &User,
        batch_id: &BatchId,
        update: BatchUpdate,
    ) -> Result<Batch> {
        let mut batch = self.storage.get_batch(batch_id)?;

        if batch.farmer_id != actor.id {
            return Err(Error::Authorization(
                "Only the owning farmer can update a batch".to_string(),
            ));
        }

        if let Some(quantity) = update.quantity {
            if quantity <= Decimal::ZERO {
                return Err(Error::Validation("Quantity must be positive".to_string()));
            }
            batch.quantity = quantity;
        }
        if let Some(title) = update.title {
            if title.trim().is_empty() {
                return Err(Error::Validation("Title must not be empty".to_string()));
            }
            batch.title = title;
        }
        if let Some(variety) = update.variety {
            batch.variety = Some(variety);
        }
        if let Some(unit) = update.unit {
            batch.unit = unit;
        }
        if let Some(location) = update.location {
            batch.location = Some(location);
        }
        if let Some(images) = update.images {
            batch.images = images;
        }
        batch.updated_at = Utc::now();

        self.storage.put_batch(&batch)?;

        Ok(batch)
    }

    /// Get a batch by ID
    pub fn get_batch(&self, batch_id: &BatchId) -> Result<Batch> {
        self.storage.get_batch(batch_id)
    }

    /// All batches, newest first
    pub fn list_batches(&self) -> Result<Vec<Batch>> {
        self.storage.list_batches()
    }

    /// Batches owned by one farmer, newest first
    pub fn list_batches_by_farmer(&self, farmer_id: Uuid) -> Result<Vec<Batch>> {
        self.storage.list_batches_by_farmer(farmer_id)
    }

    // Event operations

    /// Append a custody/status event after lifecycle validation
    ///
    /// Holds the batch's append lock across derive-check-append, so two
    /// concurrent writers cannot both pass the same stage check.
    pub fn append_event(
        &self,
        actor: &User,
        batch_id: &BatchId,
        action: BatchAction,
        details: EventDetails,
        tx_hash: Option<TxHash>,
        confirmed: bool,
    ) -> Result<Event> {
        let lock = self.append_lock(batch_id);
        let _guard = lock.lock();

        if !self.storage.batch_exists(batch_id)? {
            return Err(Error::NotFound(format!("Batch {}", batch_id)));
        }

        details.validate_for(action)?;

        let events = self.storage.get_events(batch_id)?;
        let stage = BatchStage::replay(events.iter());

        if let Err(err) = check_transition(stage, actor.role, action) {
            if err.is_illegal_transition() {
                self.metrics.illegal_transitions_total.inc();
                tracing::warn!(
                    batch_id = %batch_id,
                    actor = %actor.id,
                    role = %actor.role,
                    action = %action,
                    stage = %stage,
                    "Rejected lifecycle transition"
                );
            }
            return Err(err);
        }

        let seq = events.last().map(|e| e.seq + 1).unwrap_or(1);

        let event = Event {
            event_id: Uuid::now_v7(),
            batch_id: batch_id.clone(),
            actor_id: actor.id,
            actor_role: actor.role,
            action,
            details,
            tx_hash,
            confirmed,
            seq,
            timestamp: Utc::now(),
        };

        // Rejected appends never reach the timer, so the histogram only
        // measures writes that happened
        let timer = self.metrics.append_duration.start_timer();
        self.storage.append_event(&event)?;
        timer.observe_duration();

        self.metrics.events_total.inc();

        tracing::info!(
            batch_id = %batch_id,
            action = %action,
            seq = event.seq,
            "Event appended"
        );

        Ok(event)
    }

    /// Ordered timeline for a batch
    pub fn list_events(&self, batch_id: &BatchId) -> Result<Vec<Event>> {
        if !self.storage.batch_exists(batch_id)? {
            return Err(Error::NotFound(format!("Batch {}", batch_id)));
        }
        self.storage.get_events(batch_id)
    }

    /// Most recent event for a batch
    pub fn latest_event(&self, batch_id: &BatchId) -> Result<Option<Event>> {
        self.storage.latest_event(batch_id)
    }

    /// Derived lifecycle stage for a batch
    pub fn stage(&self, batch_id: &BatchId) -> Result<BatchStage> {
        let events = self.list_events(batch_id)?;
        Ok(BatchStage::replay(events.iter()))
    }

    /// Actions `role` could append to the batch right now
    pub fn available_actions(&self, batch_id: &BatchId, role: Role) -> Result<Vec<BatchAction>> {
        Ok(allowed_actions(self.stage(batch_id)?, role).to_vec())
    }

    /// Attach a confirmed transaction hash to an event
    pub fn attach_tx(&self, event_id: Uuid, tx_hash: &TxHash) -> Result<Event> {
        self.storage.attach_tx(event_id, tx_hash)
    }
}
