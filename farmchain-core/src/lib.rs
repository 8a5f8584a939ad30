//! FarmChain Core
//!
//! Farm-to-consumer supply chain ledger: produce batches, an append-only
//! custody event log, and a simulated blockchain anchoring layer.
//!
//! # Architecture
//!
//! - **Event Sourcing**: A batch's lifecycle stage is derived by replaying
//!   its events, never stored
//! - **Data-driven transitions**: Legal moves live in one auditable table
//!   keyed by (stage, role)
//! - **Per-batch append locks**: Check-then-append is atomic under
//!   concurrent writers
//! - **Mock settlement**: Submissions confirm or fail in the background
//!   after a randomized delay
//!
//! # Invariants
//!
//! - Append-only: Events are never modified or deleted, except attaching a
//!   transaction hash
//! - Deterministic replay: Same timeline derives the same stage
//! - Exactly-once settlement: A pending transaction finalizes once and
//!   never reverts

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications, clippy::all)]

pub mod config;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod metrics;
pub mod mockchain;
pub mod storage;
pub mod trace;
pub mod types;

// Re-exports
pub use config::{AuthConfig, Config, MockChainConfig};
pub use error::{Error, Result};
pub use ledger::{BatchUpdate, Ledger, NewBatch};
pub use lifecycle::{allowed_actions, check_transition, BatchStage, StageKey};
pub use metrics::Metrics;
pub use mockchain::{MockChain, SubmitReceipt};
pub use storage::Storage;
pub use trace::{build_trace, trust_score, BatchTrace};
pub use types::{
    Batch, BatchAction, BatchId, Event, EventDetails, MockTransaction, Role, TxHash, TxStatus,
    User, UserProfile,
};
