//! Core types for the supply chain
//!
//! All types are designed for:
//! - Stable wire formats (camelCase JSON, SCREAMING_SNAKE action tags)
//! - Exact arithmetic (Decimal for quantities and prices)
//! - Append-only history (events are immutable records)

use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Actor role, fixed at registration and never reassigned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Creates and owns batches
    Farmer,
    /// Moves batches through pickup/transit/delivery
    Distributor,
    /// Receives, prices, and sells batches
    Retailer,
    /// Traces batches and triggers on-chain verification
    Consumer,
}

impl Role {
    /// Wire tag
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Farmer => "FARMER",
            Role::Distributor => "DISTRIBUTOR",
            Role::Retailer => "RETAILER",
            Role::Consumer => "CONSUMER",
        }
    }

    /// Parse from wire tag
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "FARMER" => Some(Role::Farmer),
            "DISTRIBUTOR" => Some(Role::Distributor),
            "RETAILER" => Some(Role::Retailer),
            "CONSUMER" => Some(Role::Consumer),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Unique email (login identifier)
    pub email: String,

    /// Argon2 PHC hash; never exposed to clients, use [`UserProfile`]
    pub password_hash: String,

    /// Role, immutable once created
    pub role: Role,

    /// Registration timestamp
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Client-facing projection without credentials
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// Displayable user identity (what event timelines and batch views embed)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Human-readable batch identifier (`FARM-<year>-<sequence>`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(String);

impl BatchId {
    /// Wrap an existing identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build from a year and an allocated sequence number
    pub fn from_parts(year: i32, seq: u64) -> Self {
        Self(format!("FARM-{}-{:04}", year, seq))
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check `FARM-<year>-<4+ digit sequence>` shape
    pub fn is_valid_format(s: &str) -> bool {
        let mut parts = s.split('-');
        let (prefix, year, seq) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(p), Some(y), Some(q), None) => (p, y, q),
            _ => return false,
        };

        prefix == "FARM"
            && year.len() == 4
            && year.chars().all(|c| c.is_ascii_digit())
            && seq.len() >= 4
            && seq.chars().all(|c| c.is_ascii_digit())
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Produce batch, owned by the creating farmer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    /// Globally unique, never reassigned
    pub batch_id: BatchId,

    /// Produce title (e.g. "Organic Tomatoes")
    pub title: String,

    /// Optional variety
    pub variety: Option<String>,

    /// Positive quantity
    pub quantity: Decimal,

    /// Quantity unit (kg, crates, ...)
    pub unit: String,

    /// Harvest date
    pub harvest_date: NaiveDate,

    /// Optional origin location
    pub location: Option<String>,

    /// Opaque image URLs (file storage is an external collaborator)
    pub images: Vec<String>,

    /// Owning farmer, immutable after creation
    pub farmer_id: Uuid,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Action tag recorded on an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchAction {
    /// Batch created (system-generated, exactly once)
    Created,
    /// Picked up from the farm
    PickedUp,
    /// In transit to retail
    InTransit,
    /// Arrived at retail, or sold to consumer (see lifecycle stages)
    Delivered,
    /// Retail price set
    PriceSet,
    /// Quality inspection recorded
    QualityCheck,
    /// Linked to a confirmed mock transaction
    VerifiedOnChain,
}

impl BatchAction {
    /// Wire tag
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchAction::Created => "CREATED",
            BatchAction::PickedUp => "PICKED_UP",
            BatchAction::InTransit => "IN_TRANSIT",
            BatchAction::Delivered => "DELIVERED",
            BatchAction::PriceSet => "PRICE_SET",
            BatchAction::QualityCheck => "QUALITY_CHECK",
            BatchAction::VerifiedOnChain => "VERIFIED_ON_CHAIN",
        }
    }

    /// Parse from wire tag
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "CREATED" => Some(BatchAction::Created),
            "PICKED_UP" => Some(BatchAction::PickedUp),
            "IN_TRANSIT" => Some(BatchAction::InTransit),
            "DELIVERED" => Some(BatchAction::Delivered),
            "PRICE_SET" => Some(BatchAction::PriceSet),
            "QUALITY_CHECK" => Some(BatchAction::QualityCheck),
            "VERIFIED_ON_CHAIN" => Some(BatchAction::VerifiedOnChain),
            _ => None,
        }
    }

    /// Human label for timelines
    pub fn display_name(&self) -> &'static str {
        match self {
            BatchAction::Created => "Batch Created",
            BatchAction::PickedUp => "Picked Up",
            BatchAction::InTransit => "In Transit",
            BatchAction::Delivered => "Delivered",
            BatchAction::PriceSet => "Price Updated",
            BatchAction::QualityCheck => "Quality Checked",
            BatchAction::VerifiedOnChain => "Blockchain Verified",
        }
    }

    /// Whether the action advances the primary lifecycle
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            BatchAction::Created
                | BatchAction::PickedUp
                | BatchAction::InTransit
                | BatchAction::Delivered
        )
    }
}

impl fmt::Display for BatchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured event payload, one schema per action with an open fallback
///
/// Untagged: the JSON shape picks the variant, so existing clients that
/// post `{"price": 2.5}` or free-form objects keep working.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventDetails {
    /// `PRICE_SET` payload
    Price(PriceDetails),
    /// `QUALITY_CHECK` payload
    Quality(QualityDetails),
    /// Location update payload
    Location(LocationDetails),
    /// Forward-compatible open payload for anything else
    Open(serde_json::Map<String, serde_json::Value>),
}

/// Retail price payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceDetails {
    /// Price per unit
    pub price: Decimal,
}

/// Quality inspection payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityDetails {
    /// Rating on a 1-5 scale
    pub rating: u8,

    /// Free-form inspection notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Location update payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationDetails {
    pub location: String,
}

impl EventDetails {
    /// Empty open payload
    pub fn empty() -> Self {
        EventDetails::Open(serde_json::Map::new())
    }

    /// Open payload from a JSON object
    pub fn open(map: serde_json::Map<String, serde_json::Value>) -> Self {
        EventDetails::Open(map)
    }

    /// Validate the payload schema against the action it accompanies
    pub fn validate_for(&self, action: BatchAction) -> crate::Result<()> {
        match action {
            BatchAction::PriceSet => match self {
                EventDetails::Price(p) if p.price > Decimal::ZERO => Ok(()),
                EventDetails::Price(_) => Err(crate::Error::Validation(
                    "Price must be positive".to_string(),
                )),
                _ => Err(crate::Error::Validation(
                    "PRICE_SET requires a price".to_string(),
                )),
            },
            BatchAction::QualityCheck => match self {
                EventDetails::Quality(q) if (1..=5).contains(&q.rating) => Ok(()),
                EventDetails::Quality(_) => Err(crate::Error::Validation(
                    "Rating must be between 1 and 5".to_string(),
                )),
                _ => Err(crate::Error::Validation(
                    "QUALITY_CHECK requires a rating".to_string(),
                )),
            },
            _ => Ok(()),
        }
    }
}

impl Default for EventDetails {
    fn default() -> Self {
        Self::empty()
    }
}

/// Immutable custody/status record on a batch's timeline
///
/// Ordering is by `(timestamp, seq)` ascending; `seq` is the per-batch
/// insertion order and breaks timestamp ties. The only permitted mutation
/// after creation is attaching a transaction hash and confirmation flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Unique event ID (UUIDv7 for time-ordering)
    pub event_id: Uuid,

    /// Batch this event belongs to
    pub batch_id: BatchId,

    /// Acting user
    pub actor_id: Uuid,

    /// Role the actor held at event time (not their current role)
    pub actor_role: Role,

    /// Action tag
    pub action: BatchAction,

    /// Structured payload
    pub details: EventDetails,

    /// Linked mock transaction hash, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<TxHash>,

    /// Whether the linked transaction was confirmed
    pub confirmed: bool,

    /// Per-batch insertion order
    pub seq: u64,

    /// Server-assigned timestamp
    pub timestamp: DateTime<Utc>,
}

/// Mock transaction hash: `0x` + 64 lowercase hex characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash(String);

impl TxHash {
    /// Wrap an existing hash
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Generate a random hash
    pub fn generate<R: Rng>(rng: &mut R) -> Self {
        const CHARS: &[u8] = b"0123456789abcdef";
        let mut hash = String::with_capacity(66);
        hash.push_str("0x");
        for _ in 0..64 {
            hash.push(CHARS[rng.gen_range(0..CHARS.len())] as char);
        }
        Self(hash)
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check `0x` + 64 hex digit shape
    pub fn is_valid_format(s: &str) -> bool {
        s.len() == 66
            && s.starts_with("0x")
            && s[2..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Simulated ledger submission status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    /// Submitted, awaiting the randomized confirmation
    Pending,
    /// Confirmed (terminal)
    Confirmed,
    /// Failed (terminal)
    Failed,
}

impl TxStatus {
    /// Wire tag
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Pending => "pending",
            TxStatus::Confirmed => "confirmed",
            TxStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Simulated ledger submission
///
/// Created once as `pending`; transitions status exactly once, never
/// reverts. `confirmed_at` is set if and only if status is `confirmed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockTransaction {
    /// Unique transaction hash
    pub tx_hash: TxHash,

    /// Linked batch
    pub batch_id: BatchId,

    /// Action label the submission describes
    pub action: BatchAction,

    /// Current status
    pub status: TxStatus,

    /// Submission time
    pub created_at: DateTime<Utc>,

    /// Confirmation time (confirmed transactions only)
    ///
    /// Always serialized: this record round-trips through bincode, which
    /// cannot tolerate omitted fields.
    pub confirmed_at: Option<DateTime<Utc>>,
}
