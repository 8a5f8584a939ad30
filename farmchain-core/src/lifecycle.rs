//! Batch lifecycle state machine
//!
//! The stage of a batch is derived by replaying its ordered events, never
//! stored. Legality of the next action is looked up in [`TRANSITIONS`], a
//! pure data table keyed by (stage key, requesting role), so the whole
//! machine is auditable and testable in isolation.
//!
//! `DELIVERED` is deliberately dual-keyed: appended from `IN_TRANSIT` it
//! means "arrived at retail"; appended again by a retailer it means "sold
//! to consumer". The two are distinct stages even though the action tag on
//! the wire is identical.

use crate::types::{BatchAction, Event, Role};
use crate::{Error, Result};
use std::fmt;

/// Derived lifecycle stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStage {
    /// Batch exists, awaiting pickup
    Created,
    /// Picked up from the farm
    PickedUp,
    /// On the way to retail
    InTransit,
    /// Arrived at retail; `by` records who closed the transit leg
    Delivered {
        /// Role of the actor whose `DELIVERED` event produced this stage
        by: Role,
    },
    /// Sold to consumer (terminal)
    Sold,
}

/// Payload-free stage tag used to key the transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKey {
    Created,
    PickedUp,
    InTransit,
    DeliveredByDistributor,
    DeliveredByRetailer,
    Sold,
}

impl BatchStage {
    /// Table key for this stage
    pub fn key(&self) -> StageKey {
        match self {
            BatchStage::Created => StageKey::Created,
            BatchStage::PickedUp => StageKey::PickedUp,
            BatchStage::InTransit => StageKey::InTransit,
            BatchStage::Delivered { by: Role::Retailer } => StageKey::DeliveredByRetailer,
            BatchStage::Delivered { .. } => StageKey::DeliveredByDistributor,
            BatchStage::Sold => StageKey::Sold,
        }
    }

    /// Wire tag
    pub fn as_str(&self) -> &'static str {
        match self.key() {
            StageKey::Created => "CREATED",
            StageKey::PickedUp => "PICKED_UP",
            StageKey::InTransit => "IN_TRANSIT",
            StageKey::DeliveredByDistributor => "DELIVERED_BY_DISTRIBUTOR",
            StageKey::DeliveredByRetailer => "DELIVERED_BY_RETAILER",
            StageKey::Sold => "SOLD",
        }
    }

    /// Whether no further lifecycle actions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchStage::Sold)
    }

    /// Fold one event into the stage
    ///
    /// Side-branch actions (`PRICE_SET`, `QUALITY_CHECK`,
    /// `VERIFIED_ON_CHAIN`) never advance the stage.
    pub fn apply(self, action: BatchAction, actor_role: Role) -> Self {
        match action {
            BatchAction::Created => BatchStage::Created,
            BatchAction::PickedUp => BatchStage::PickedUp,
            BatchAction::InTransit => BatchStage::InTransit,
            BatchAction::Delivered => match self {
                BatchStage::Delivered { .. } => BatchStage::Sold,
                BatchStage::Sold => BatchStage::Sold,
                _ => BatchStage::Delivered { by: actor_role },
            },
            BatchAction::PriceSet | BatchAction::QualityCheck | BatchAction::VerifiedOnChain => {
                self
            }
        }
    }

    /// Derive the stage from an ordered event timeline
    ///
    /// An empty timeline derives `Created` (a batch with no events yet is
    /// treated the same as a freshly created one).
    pub fn replay<'a>(events: impl IntoIterator<Item = &'a Event>) -> Self {
        events
            .into_iter()
            .fold(BatchStage::Created, |stage, event| {
                stage.apply(event.action, event.actor_role)
            })
    }
}

impl fmt::Display for BatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transition table: (stage key, requesting role) -> allowed actions
///
/// Rows absent from the table allow nothing. Farmers and Consumers have no
/// rows: they never append lifecycle-advancing events.
pub const TRANSITIONS: &[(StageKey, Role, &[BatchAction])] = &[
    (StageKey::Created, Role::Distributor, &[BatchAction::PickedUp]),
    (StageKey::PickedUp, Role::Distributor, &[BatchAction::InTransit]),
    (StageKey::InTransit, Role::Distributor, &[BatchAction::Delivered]),
    (StageKey::InTransit, Role::Retailer, &[BatchAction::Delivered]),
    (
        StageKey::DeliveredByDistributor,
        Role::Retailer,
        &[
            BatchAction::PriceSet,
            BatchAction::QualityCheck,
            BatchAction::Delivered,
        ],
    ),
    (
        StageKey::DeliveredByRetailer,
        Role::Retailer,
        &[
            BatchAction::PriceSet,
            BatchAction::QualityCheck,
            BatchAction::Delivered,
        ],
    ),
];

/// Actions a role may append at a stage, straight from the table
pub fn allowed_actions(stage: BatchStage, role: Role) -> &'static [BatchAction] {
    let key = stage.key();
    TRANSITIONS
        .iter()
        .find(|(k, r, _)| *k == key && *r == role)
        .map(|(_, _, actions)| *actions)
        .unwrap_or(&[])
}

/// Check whether `role` may append `action` to a batch at `stage`
///
/// `VERIFIED_ON_CHAIN` is a side-branch any authenticated role may append
/// (the only event Consumers may trigger). `CREATED` is system-generated
/// at batch creation and never legal through the append path.
pub fn check_transition(stage: BatchStage, role: Role, action: BatchAction) -> Result<()> {
    if action == BatchAction::VerifiedOnChain {
        return Ok(());
    }

    if action == BatchAction::Created {
        return Err(Error::Validation(
            "CREATED is recorded automatically at batch creation".to_string(),
        ));
    }

    if allowed_actions(stage, role).contains(&action) {
        Ok(())
    } else {
        Err(Error::IllegalTransition {
            action,
            role,
            stage: stage.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BatchId, EventDetails};
    use chrono::Utc;
    use uuid::Uuid;

    fn ev(action: BatchAction, actor_role: Role) -> Event {
        Event {
            event_id: Uuid::now_v7(),
            batch_id: BatchId::new("FARM-2025-0001"),
            actor_id: Uuid::new_v4(),
            actor_role,
            action,
            details: EventDetails::empty(),
            tx_hash: None,
            confirmed: false,
            seq: 0,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_happy_path_stages() {
        let stage = BatchStage::Created;
        let stage = stage.apply(BatchAction::PickedUp, Role::Distributor);
        assert_eq!(stage, BatchStage::PickedUp);
        let stage = stage.apply(BatchAction::InTransit, Role::Distributor);
        assert_eq!(stage, BatchStage::InTransit);
        let stage = stage.apply(BatchAction::Delivered, Role::Distributor);
        assert_eq!(stage, BatchStage::Delivered { by: Role::Distributor });
        let stage = stage.apply(BatchAction::Delivered, Role::Retailer);
        assert_eq!(stage, BatchStage::Sold);
        assert!(stage.is_terminal());
    }

    #[test]
    fn test_side_branch_actions_do_not_advance() {
        let stage = BatchStage::Delivered { by: Role::Distributor };
        assert_eq!(stage.apply(BatchAction::PriceSet, Role::Retailer), stage);
        assert_eq!(stage.apply(BatchAction::QualityCheck, Role::Retailer), stage);
        assert_eq!(stage.apply(BatchAction::VerifiedOnChain, Role::Consumer), stage);
    }

    #[test]
    fn test_replay_empty_timeline() {
        assert_eq!(
            BatchStage::replay(std::iter::empty::<&Event>()),
            BatchStage::Created
        );
    }

    #[test]
    fn test_replay_end_to_end_scenario() {
        // The full retail journey, including a price-set between the two
        // DELIVERED events: the side branch must not lose the sale.
        let events = vec![
            ev(BatchAction::Created, Role::Farmer),
            ev(BatchAction::PickedUp, Role::Distributor),
            ev(BatchAction::InTransit, Role::Distributor),
            ev(BatchAction::Delivered, Role::Retailer),
            ev(BatchAction::PriceSet, Role::Retailer),
            ev(BatchAction::Delivered, Role::Retailer),
        ];

        assert_eq!(BatchStage::replay(events.iter()), BatchStage::Sold);

        // Stage after the receive, before the sale
        assert_eq!(
            BatchStage::replay(events[..4].iter()),
            BatchStage::Delivered { by: Role::Retailer }
        );
    }

    #[test]
    fn test_distributor_cannot_skip_pickup() {
        let err = check_transition(BatchStage::Created, Role::Distributor, BatchAction::InTransit)
            .unwrap_err();
        assert!(err.is_illegal_transition());
    }

    #[test]
    fn test_duplicate_pickup_rejected() {
        let err = check_transition(BatchStage::PickedUp, Role::Distributor, BatchAction::PickedUp)
            .unwrap_err();
        assert!(err.is_illegal_transition());
    }

    #[test]
    fn test_retailer_receives_then_prices_then_sells() {
        let stage = BatchStage::Delivered { by: Role::Retailer };
        assert!(check_transition(stage, Role::Retailer, BatchAction::PriceSet).is_ok());
        assert!(check_transition(stage, Role::Retailer, BatchAction::QualityCheck).is_ok());
        assert!(check_transition(stage, Role::Retailer, BatchAction::Delivered).is_ok());
    }

    #[test]
    fn test_retailer_actions_after_distributor_delivery() {
        let stage = BatchStage::Delivered { by: Role::Distributor };
        assert!(check_transition(stage, Role::Retailer, BatchAction::PriceSet).is_ok());
        assert!(check_transition(stage, Role::Distributor, BatchAction::Delivered).is_err());
    }

    #[test]
    fn test_sold_is_terminal() {
        let err = check_transition(BatchStage::Sold, Role::Retailer, BatchAction::PriceSet)
            .unwrap_err();
        assert!(err.is_illegal_transition());

        let err = check_transition(BatchStage::Sold, Role::Retailer, BatchAction::Delivered)
            .unwrap_err();
        assert!(err.is_illegal_transition());
    }

    #[test]
    fn test_farmers_and_consumers_never_advance_lifecycle() {
        let stages = [
            BatchStage::Created,
            BatchStage::PickedUp,
            BatchStage::InTransit,
            BatchStage::Delivered { by: Role::Distributor },
            BatchStage::Delivered { by: Role::Retailer },
            BatchStage::Sold,
        ];

        for stage in stages {
            assert!(allowed_actions(stage, Role::Farmer).is_empty());
            assert!(allowed_actions(stage, Role::Consumer).is_empty());
        }
    }

    #[test]
    fn test_verify_on_chain_open_to_all_roles() {
        for role in [Role::Farmer, Role::Distributor, Role::Retailer, Role::Consumer] {
            assert!(
                check_transition(BatchStage::Sold, role, BatchAction::VerifiedOnChain).is_ok()
            );
        }
    }

    #[test]
    fn test_created_never_legal_through_append() {
        let result = check_transition(BatchStage::Created, Role::Farmer, BatchAction::Created);
        assert!(matches!(result, Err(Error::Validation(_))));
    }
}
