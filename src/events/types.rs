//! Engine event types.

use serde::{Deserialize, Serialize};

use crate::core::collateral::AssetId;
use crate::utils::address::Address;

/// Observable effect of a committed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineEvent {
    /// Collateral credited to an account
    CollateralDeposited {
        /// Depositor
        user: Address,
        /// Asset deposited
        asset: AssetId,
        /// Amount deposited
        amount: u128,
    },

    /// Collateral debited from an account and sent out
    CollateralRedeemed {
        /// Account debited
        from: Address,
        /// Recipient
        to: Address,
        /// Asset redeemed
        asset: AssetId,
        /// Amount redeemed
        amount: u128,
    },
}

impl EngineEvent {
    /// Event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            EngineEvent::CollateralDeposited { .. } => "CollateralDeposited",
            EngineEvent::CollateralRedeemed { .. } => "CollateralRedeemed",
        }
    }

    /// A redemption routed to someone other than the debited account is a
    /// liquidation seizure
    pub fn is_liquidation(&self) -> bool {
        matches!(self, EngineEvent::CollateralRedeemed { from, to, .. } if from != to)
    }

    /// Whether `account` appears in this event
    pub fn involves(&self, account: &Address) -> bool {
        match self {
            EngineEvent::CollateralDeposited { user, .. } => user == account,
            EngineEvent::CollateralRedeemed { from, to, .. } => from == account || to == account,
        }
    }

    /// Asset the event refers to
    pub fn asset(&self) -> AssetId {
        match self {
            EngineEvent::CollateralDeposited { asset, .. }
            | EngineEvent::CollateralRedeemed { asset, .. } => *asset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_liquidation_signal() {
        let user = Address::from_label("user");
        let liquidator = Address::from_label("liquidator");
        let asset = Address::from_label("asset:WETH");

        let redeem = EngineEvent::CollateralRedeemed { from: user, to: user, asset, amount: 1 };
        let seize = EngineEvent::CollateralRedeemed { from: user, to: liquidator, asset, amount: 1 };
        let deposit = EngineEvent::CollateralDeposited { user, asset, amount: 1 };

        assert!(!redeem.is_liquidation());
        assert!(seize.is_liquidation());
        assert!(!deposit.is_liquidation());
        assert!(seize.involves(&liquidator));
        assert!(!deposit.involves(&liquidator));
        assert_eq!(seize.event_type(), "CollateralRedeemed");
    }

    #[test]
    fn test_encoding() {
        let event = EngineEvent::CollateralDeposited {
            user: Address::from_label("user"),
            asset: Address::from_label("asset:WETH"),
            amount: 5,
        };
        let json = serde_json::to_value(event).unwrap();
        assert_eq!(json["CollateralDeposited"]["amount"], 5);

        let bytes = bincode::serialize(&event).unwrap();
        assert_eq!(bincode::deserialize::<EngineEvent>(&bytes).unwrap(), event);
    }
}
