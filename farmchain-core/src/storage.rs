//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `users` - Registered users (key: user_id)
//! - `emails` - Email uniqueness index (key: email, value: user_id)
//! - `batches` - Produce batches (key: batch_id)
//! - `events` - Append-only event log (key: batch_id || 0x00 || seq)
//! - `event_idx` - Event lookup index (key: event_id, value: event key)
//! - `txs` - Mock transactions (key: tx_hash)
//! - `meta` - Counters (batch sequence allocation)
//!
//! Events are stored as JSON because their details payload is an open
//! structure; fixed-shape records use bincode. Event keys embed the
//! per-batch sequence in big-endian so prefix iteration yields the
//! timeline in order.

use crate::{
    error::{Error, Result},
    types::{Batch, BatchId, Event, MockTransaction, TxHash, TxStatus, User},
    Config,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB};
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_USERS: &str = "users";
const CF_EMAILS: &str = "emails";
const CF_BATCHES: &str = "batches";
const CF_EVENTS: &str = "events";
const CF_EVENT_IDX: &str = "event_idx";
const CF_TXS: &str = "txs";
const CF_META: &str = "meta";

/// Meta key for the batch sequence counter
const META_BATCH_SEQ: &[u8] = b"batch_seq";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,

    /// Serializes batch-id allocation (read counter, bump, write)
    alloc_lock: Mutex<()>,
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_USERS, Options::default()),
            ColumnFamilyDescriptor::new(CF_EMAILS, Options::default()),
            ColumnFamilyDescriptor::new(CF_BATCHES, Options::default()),
            ColumnFamilyDescriptor::new(CF_EVENTS, Options::default()),
            ColumnFamilyDescriptor::new(CF_EVENT_IDX, Options::default()),
            ColumnFamilyDescriptor::new(CF_TXS, Options::default()),
            ColumnFamilyDescriptor::new(CF_META, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!("Opened RocksDB at {:?}", path);

        Ok(Self {
            db: Arc::new(db),
            alloc_lock: Mutex::new(()),
        })
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    /// Event key: batch_id || 0x00 || seq (big-endian)
    ///
    /// The 0x00 separator keeps `FARM-2025-0001` from matching as a prefix
    /// of `FARM-2025-00010`.
    fn event_key(batch_id: &BatchId, seq: u64) -> Vec<u8> {
        let mut key = batch_id.as_str().as_bytes().to_vec();
        key.push(0);
        key.extend_from_slice(&seq.to_be_bytes());
        key
    }

    fn event_prefix(batch_id: &BatchId) -> Vec<u8> {
        let mut prefix = batch_id.as_str().as_bytes().to_vec();
        prefix.push(0);
        prefix
    }

    // User operations

    /// Create user; fails with Conflict if the email is taken
    pub fn create_user(&self, user: &User) -> Result<()> {
        let cf_users = self.cf_handle(CF_USERS)?;
        let cf_emails = self.cf_handle(CF_EMAILS)?;

        if self.db.get_cf(cf_emails, user.email.as_bytes())?.is_some() {
            return Err(Error::Conflict(
                "User with this email already exists".to_string(),
            ));
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(cf_users, user.id.as_bytes(), bincode::serialize(user)?);
        batch.put_cf(cf_emails, user.email.as_bytes(), user.id.as_bytes());
        self.db.write(batch)?;

        tracing::debug!(user_id = %user.id, role = %user.role, "User created");

        Ok(())
    }

    /// Get user by ID
    pub fn get_user(&self, user_id: Uuid) -> Result<User> {
        let cf = self.cf_handle(CF_USERS)?;
        let value = self
            .db
            .get_cf(cf, user_id.as_bytes())?
            .ok_or_else(|| Error::NotFound(format!("User {}", user_id)))?;

        Ok(bincode::deserialize(&value)?)
    }

    /// Look up user by email
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let cf_emails = self.cf_handle(CF_EMAILS)?;

        let Some(id_bytes) = self.db.get_cf(cf_emails, email.as_bytes())? else {
            return Ok(None);
        };

        let id_bytes: [u8; 16] = id_bytes
            .as_slice()
            .try_into()
            .map_err(|_| Error::Storage("Corrupt email index entry".to_string()))?;

        Ok(Some(self.get_user(Uuid::from_bytes(id_bytes))?))
    }

    // Batch operations

    /// Allocate the next batch sequence number (atomic per process)
    ///
    /// The counter is monotonic per deployment; a crash between bump and
    /// batch creation leaves a gap, never a duplicate.
    pub fn next_batch_seq(&self) -> Result<u64> {
        let _guard = self.alloc_lock.lock();

        let cf = self.cf_handle(CF_META)?;
        let current = match self.db.get_cf(cf, META_BATCH_SEQ)? {
            Some(bytes) => {
                let bytes: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| Error::Storage("Corrupt batch counter".to_string()))?;
                u64::from_be_bytes(bytes)
            }
            None => 0,
        };

        let next = current + 1;
        self.db.put_cf(cf, META_BATCH_SEQ, next.to_be_bytes())?;

        Ok(next)
    }

    /// Create batch together with its initial event (atomic)
    pub fn create_batch(&self, batch: &Batch, initial_event: &Event) -> Result<()> {
        let cf_batches = self.cf_handle(CF_BATCHES)?;
        let cf_events = self.cf_handle(CF_EVENTS)?;
        let cf_event_idx = self.cf_handle(CF_EVENT_IDX)?;

        if self
            .db
            .get_cf(cf_batches, batch.batch_id.as_str().as_bytes())?
            .is_some()
        {
            return Err(Error::Conflict(format!(
                "Batch {} already exists",
                batch.batch_id
            )));
        }

        let event_key = Self::event_key(&initial_event.batch_id, initial_event.seq);

        let mut wb = WriteBatch::default();
        wb.put_cf(
            cf_batches,
            batch.batch_id.as_str().as_bytes(),
            bincode::serialize(batch)?,
        );
        wb.put_cf(cf_events, &event_key, serde_json::to_vec(initial_event)?);
        wb.put_cf(cf_event_idx, initial_event.event_id.as_bytes(), &event_key);
        self.db.write(wb)?;

        tracing::debug!(batch_id = %batch.batch_id, farmer_id = %batch.farmer_id, "Batch created");

        Ok(())
    }

    /// Get batch by ID
    pub fn get_batch(&self, batch_id: &BatchId) -> Result<Batch> {
        let cf = self.cf_handle(CF_BATCHES)?;
        let value = self
            .db
            .get_cf(cf, batch_id.as_str().as_bytes())?
            .ok_or_else(|| Error::NotFound(format!("Batch {}", batch_id)))?;

        Ok(bincode::deserialize(&value)?)
    }

    /// Check batch existence without deserializing
    pub fn batch_exists(&self, batch_id: &BatchId) -> Result<bool> {
        let cf = self.cf_handle(CF_BATCHES)?;
        Ok(self.db.get_cf(cf, batch_id.as_str().as_bytes())?.is_some())
    }

    /// Overwrite batch (owner checks happen in the ledger layer)
    pub fn put_batch(&self, batch: &Batch) -> Result<()> {
        let cf = self.cf_handle(CF_BATCHES)?;
        self.db.put_cf(
            cf,
            batch.batch_id.as_str().as_bytes(),
            bincode::serialize(batch)?,
        )?;
        Ok(())
    }

    /// All batches, newest first
    pub fn list_batches(&self) -> Result<Vec<Batch>> {
        let cf = self.cf_handle(CF_BATCHES)?;
        let mut batches = Vec::new();

        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            batches.push(bincode::deserialize::<Batch>(&value)?);
        }

        batches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(batches)
    }

    /// Batches owned by one farmer, newest first
    pub fn list_batches_by_farmer(&self, farmer_id: Uuid) -> Result<Vec<Batch>> {
        let mut batches = self.list_batches()?;
        batches.retain(|b| b.farmer_id == farmer_id);
        Ok(batches)
    }

    // Event operations

    /// Append event (validation happens in the ledger layer)
    pub fn append_event(&self, event: &Event) -> Result<()> {
        let cf_events = self.cf_handle(CF_EVENTS)?;
        let cf_event_idx = self.cf_handle(CF_EVENT_IDX)?;

        let key = Self::event_key(&event.batch_id, event.seq);

        let mut wb = WriteBatch::default();
        wb.put_cf(cf_events, &key, serde_json::to_vec(event)?);
        wb.put_cf(cf_event_idx, event.event_id.as_bytes(), &key);
        self.db.write(wb)?;

        tracing::debug!(
            event_id = %event.event_id,
            batch_id = %event.batch_id,
            action = %event.action,
            "Event appended"
        );

        Ok(())
    }

    /// Events for a batch, ordered by insertion (timestamp ascending)
    pub fn get_events(&self, batch_id: &BatchId) -> Result<Vec<Event>> {
        let cf = self.cf_handle(CF_EVENTS)?;
        let prefix = Self::event_prefix(batch_id);

        let mut events = Vec::new();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));

        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            events.push(serde_json::from_slice::<Event>(&value)?);
        }

        Ok(events)
    }

    /// Latest event for a batch, or None
    pub fn latest_event(&self, batch_id: &BatchId) -> Result<Option<Event>> {
        Ok(self.get_events(batch_id)?.pop())
    }

    /// Attach a transaction hash to an existing event
    ///
    /// This is the single permitted post-creation mutation of an event.
    pub fn attach_tx(&self, event_id: Uuid, tx_hash: &TxHash) -> Result<Event> {
        let cf_events = self.cf_handle(CF_EVENTS)?;
        let cf_event_idx = self.cf_handle(CF_EVENT_IDX)?;

        let key = self
            .db
            .get_cf(cf_event_idx, event_id.as_bytes())?
            .ok_or_else(|| Error::NotFound(format!("Event {}", event_id)))?;

        let value = self
            .db
            .get_cf(cf_events, &key)?
            .ok_or_else(|| Error::NotFound(format!("Event {}", event_id)))?;

        let mut event: Event = serde_json::from_slice(&value)?;
        event.tx_hash = Some(tx_hash.clone());
        event.confirmed = true;

        self.db.put_cf(cf_events, &key, serde_json::to_vec(&event)?)?;

        Ok(event)
    }

    // Mock transaction operations

    /// Store a newly submitted transaction
    pub fn put_transaction(&self, tx: &MockTransaction) -> Result<()> {
        let cf = self.cf_handle(CF_TXS)?;
        self.db
            .put_cf(cf, tx.tx_hash.as_str().as_bytes(), bincode::serialize(tx)?)?;
        Ok(())
    }

    /// Get transaction by hash
    pub fn get_transaction(&self, tx_hash: &str) -> Result<MockTransaction> {
        let cf = self.cf_handle(CF_TXS)?;
        let value = self
            .db
            .get_cf(cf, tx_hash.as_bytes())?
            .ok_or_else(|| Error::NotFound(format!("Transaction {}", tx_hash)))?;

        Ok(bincode::deserialize(&value)?)
    }

    /// Finalize a pending transaction (exactly-once)
    ///
    /// Returns the updated transaction, or None if it was no longer
    /// pending (already finalized by a force-confirm).
    pub fn finalize_transaction(
        &self,
        tx_hash: &str,
        status: TxStatus,
        confirmed_at: Option<DateTime<Utc>>,
    ) -> Result<Option<MockTransaction>> {
        let cf = self.cf_handle(CF_TXS)?;

        let mut tx = self.get_transaction(tx_hash)?;
        if tx.status != TxStatus::Pending {
            return Ok(None);
        }

        tx.status = status;
        tx.confirmed_at = confirmed_at;
        self.db
            .put_cf(cf, tx.tx_hash.as_str().as_bytes(), bincode::serialize(&tx)?)?;

        Ok(Some(tx))
    }

    /// Administrative override: confirm regardless of current state
    pub fn force_confirm_transaction(&self, tx_hash: &str) -> Result<MockTransaction> {
        let cf = self.cf_handle(CF_TXS)?;

        let mut tx = self.get_transaction(tx_hash)?;
        tx.status = TxStatus::Confirmed;
        tx.confirmed_at = Some(Utc::now());
        self.db
            .put_cf(cf, tx.tx_hash.as_str().as_bytes(), bincode::serialize(&tx)?)?;

        Ok(tx)
    }

    /// All transactions, newest first
    pub fn list_transactions(&self) -> Result<Vec<MockTransaction>> {
        let cf = self.cf_handle(CF_TXS)?;
        let mut txs = Vec::new();

        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            txs.push(bincode::deserialize::<MockTransaction>(&value)?);
        }

        txs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(txs)
    }
}
