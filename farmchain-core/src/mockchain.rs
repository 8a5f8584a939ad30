//! Simulated blockchain confirmation engine
//!
//! Submissions return immediately as `pending` with a random hash; a
//! background task settles each one exactly once after a randomized delay,
//! confirming with the configured probability and failing otherwise.
//! Settlement failures are logged and swallowed: a lost confirmation leaves
//! the transaction pending rather than poisoning the caller.

use crate::{
    config::MockChainConfig,
    metrics::Metrics,
    storage::Storage,
    types::{BatchAction, BatchId, MockTransaction, TxHash, TxStatus},
    Error, Result,
};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Response to a transaction submission
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    /// Assigned transaction hash
    pub tx_hash: TxHash,

    /// Always `pending` at submission time
    pub status: TxStatus,

    /// Explorer link for the hash
    pub explorer_url: String,

    /// Submission timestamp
    pub submitted_at: DateTime<Utc>,
}

/// Mock chain: submission intake plus background settlement
pub struct MockChain {
    storage: Arc<Storage>,
    policy: MockChainConfig,
    metrics: Metrics,

    /// Registry of in-flight settlement tasks
    tasks: tokio::sync::Mutex<JoinSet<()>>,
}

impl MockChain {
    /// Create an engine over shared storage
    pub fn new(storage: Arc<Storage>, policy: MockChainConfig, metrics: Metrics) -> Self {
        Self {
            storage,
            policy,
            metrics,
            tasks: tokio::sync::Mutex::new(JoinSet::new()),
        }
    }

    /// Explorer link for a hash
    pub fn explorer_url(&self, tx_hash: &TxHash) -> String {
        format!("{}/{}", self.policy.explorer_base_url, tx_hash)
    }

    /// Submit a transaction and schedule its settlement
    ///
    /// The delay and outcome are drawn up front; only the timer and the
    /// status write happen on the background task.
    pub async fn submit(&self, batch_id: BatchId, action: BatchAction) -> Result<SubmitReceipt> {
        if !self.storage.batch_exists(&batch_id)? {
            return Err(Error::NotFound(format!("Batch {}", batch_id)));
        }

        let now = Utc::now();

        let (tx_hash, delay_ms, confirms) = {
            let mut rng = rand::thread_rng();
            let tx_hash = TxHash::generate(&mut rng);
            let delay_ms = rng.gen_range(self.policy.min_delay_ms..self.policy.max_delay_ms);
            let confirms = rng.gen_bool(self.policy.confirm_probability);
            (tx_hash, delay_ms, confirms)
        };

        let tx = MockTransaction {
            tx_hash: tx_hash.clone(),
            batch_id: batch_id.clone(),
            action,
            status: TxStatus::Pending,
            created_at: now,
            confirmed_at: None,
        };
        self.storage.put_transaction(&tx)?;
        self.metrics.tx_submitted_total.inc();

        tracing::info!(
            tx_hash = %tx_hash,
            batch_id = %batch_id,
            action = %action,
            delay_ms,
            "Transaction submitted"
        );

        let storage = Arc::clone(&self.storage);
        let metrics = self.metrics.clone();
        let hash = tx_hash.clone();

        self.tasks.lock().await.spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;

            let (status, confirmed_at) = if confirms {
                (TxStatus::Confirmed, Some(Utc::now()))
            } else {
                (TxStatus::Failed, None)
            };

            match storage.finalize_transaction(hash.as_str(), status, confirmed_at) {
                Ok(Some(_)) => {
                    match status {
                        TxStatus::Confirmed => metrics.tx_confirmed_total.inc(),
                        TxStatus::Failed => metrics.tx_failed_total.inc(),
                        TxStatus::Pending => {}
                    }
                    tracing::info!(tx_hash = %hash, status = %status, "Transaction settled");
                }
                Ok(None) => {
                    // Already finalized through the override path
                    tracing::debug!(tx_hash = %hash, "Settlement skipped, not pending");
                }
                Err(err) => {
                    tracing::error!(tx_hash = %hash, error = %err, "Settlement failed");
                }
            }
        });

        Ok(SubmitReceipt {
            tx_hash,
            status: TxStatus::Pending,
            explorer_url: self.explorer_url(&tx.tx_hash),
            submitted_at: now,
        })
    }

    /// Current status of a transaction
    pub fn get_status(&self, tx_hash: &str) -> Result<MockTransaction> {
        self.storage.get_transaction(tx_hash)
    }

    /// Administrative override: confirm immediately, regardless of state
    pub fn force_confirm(&self, tx_hash: &str) -> Result<MockTransaction> {
        let tx = self.storage.force_confirm_transaction(tx_hash)?;
        self.metrics.tx_confirmed_total.inc();
        tracing::info!(tx_hash = %tx_hash, "Transaction force-confirmed");
        Ok(tx)
    }

    /// All transactions, newest first
    pub fn list_transactions(&self) -> Result<Vec<MockTransaction>> {
        self.storage.list_transactions()
    }

    /// Wait for every scheduled settlement to run (used in tests and
    /// graceful shutdown)
    pub async fn drain(&self) {
        let mut tasks = self.tasks.lock().await;
        while tasks.join_next().await.is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Batch, Event, EventDetails, Role};
    use crate::Config;
    use rust_decimal::Decimal;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn seed_batch(storage: &Storage, batch_id: &str) {
        let farmer_id = Uuid::new_v4();
        let batch = Batch {
            batch_id: BatchId::new(batch_id),
            title: "Organic Tomatoes".to_string(),
            variety: None,
            quantity: Decimal::from(100),
            unit: "kg".to_string(),
            harvest_date: chrono::NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            location: None,
            images: vec![],
            farmer_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let created = Event {
            event_id: Uuid::now_v7(),
            batch_id: BatchId::new(batch_id),
            actor_id: farmer_id,
            actor_role: Role::Farmer,
            action: BatchAction::Created,
            details: EventDetails::empty(),
            tx_hash: None,
            confirmed: false,
            seq: 1,
            timestamp: Utc::now(),
        };
        storage.create_batch(&batch, &created).unwrap();
    }

    fn engine_with(policy: MockChainConfig) -> (MockChain, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        let storage = Arc::new(Storage::open(&config).unwrap());
        seed_batch(&storage, "FARM-2025-0001");
        seed_batch(&storage, "FARM-2025-0002");
        (MockChain::new(storage, policy, Metrics::default()), temp_dir)
    }

    fn always_confirms() -> MockChainConfig {
        MockChainConfig {
            confirm_probability: 1.0,
            ..Default::default()
        }
    }

    fn always_fails() -> MockChainConfig {
        MockChainConfig {
            confirm_probability: 0.0,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_starts_pending() {
        let (engine, _temp) = engine_with(always_confirms());

        let receipt = engine
            .submit(BatchId::new("FARM-2025-0001"), BatchAction::Delivered)
            .await
            .unwrap();

        assert_eq!(receipt.status, TxStatus::Pending);
        assert!(TxHash::is_valid_format(receipt.tx_hash.as_str()));
        assert!(receipt.explorer_url.ends_with(receipt.tx_hash.as_str()));

        let tx = engine.get_status(receipt.tx_hash.as_str()).unwrap();
        assert_eq!(tx.status, TxStatus::Pending);
        assert!(tx.confirmed_at.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_still_pending_before_min_delay() {
        let (engine, _temp) = engine_with(always_confirms());

        let receipt = engine
            .submit(BatchId::new("FARM-2025-0001"), BatchAction::Delivered)
            .await
            .unwrap();

        // Settlement delay is at least min_delay_ms
        tokio::time::sleep(Duration::from_millis(4_999)).await;

        let tx = engine.get_status(receipt.tx_hash.as_str()).unwrap();
        assert_eq!(tx.status, TxStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settles_confirmed() {
        let (engine, _temp) = engine_with(always_confirms());

        let receipt = engine
            .submit(BatchId::new("FARM-2025-0001"), BatchAction::Delivered)
            .await
            .unwrap();

        engine.drain().await;

        let tx = engine.get_status(receipt.tx_hash.as_str()).unwrap();
        assert_eq!(tx.status, TxStatus::Confirmed);
        assert!(tx.confirmed_at.is_some());
        assert_eq!(engine.metrics.tx_confirmed_total.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settles_failed_without_confirmed_at() {
        let (engine, _temp) = engine_with(always_fails());

        let receipt = engine
            .submit(BatchId::new("FARM-2025-0001"), BatchAction::Delivered)
            .await
            .unwrap();

        engine.drain().await;

        let tx = engine.get_status(receipt.tx_hash.as_str()).unwrap();
        assert_eq!(tx.status, TxStatus::Failed);
        assert!(tx.confirmed_at.is_none());
        assert_eq!(engine.metrics.tx_failed_total.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_confirm_wins_over_settlement() {
        let (engine, _temp) = engine_with(always_fails());

        let receipt = engine
            .submit(BatchId::new("FARM-2025-0001"), BatchAction::VerifiedOnChain)
            .await
            .unwrap();

        let forced = engine.force_confirm(receipt.tx_hash.as_str()).unwrap();
        assert_eq!(forced.status, TxStatus::Confirmed);

        // The scheduled settlement is a no-op on a finalized transaction
        engine.drain().await;

        let tx = engine.get_status(receipt.tx_hash.as_str()).unwrap();
        assert_eq!(tx.status, TxStatus::Confirmed);
        assert!(tx.confirmed_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_confirm_overrides_failed() {
        let (engine, _temp) = engine_with(always_fails());

        let receipt = engine
            .submit(BatchId::new("FARM-2025-0001"), BatchAction::Delivered)
            .await
            .unwrap();
        engine.drain().await;
        assert_eq!(
            engine.get_status(receipt.tx_hash.as_str()).unwrap().status,
            TxStatus::Failed
        );

        let forced = engine.force_confirm(receipt.tx_hash.as_str()).unwrap();
        assert_eq!(forced.status, TxStatus::Confirmed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_unknown_batch_rejected() {
        let (engine, _temp) = engine_with(always_confirms());

        let err = engine
            .submit(BatchId::new("FARM-2099-9999"), BatchAction::Delivered)
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        // Nothing was persisted for the phantom batch
        assert!(engine.list_transactions().unwrap().is_empty());
        assert_eq!(engine.metrics.tx_submitted_total.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_hash() {
        let (engine, _temp) = engine_with(always_confirms());
        let err = engine.get_status("0xdoesnotexist").unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_transactions_newest_first() {
        let (engine, _temp) = engine_with(always_confirms());

        let first = engine
            .submit(BatchId::new("FARM-2025-0001"), BatchAction::Delivered)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = engine
            .submit(BatchId::new("FARM-2025-0002"), BatchAction::PickedUp)
            .await
            .unwrap();

        let txs = engine.list_transactions().unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].tx_hash, second.tx_hash);
        assert_eq!(txs[1].tx_hash, first.tx_hash);
    }
}
