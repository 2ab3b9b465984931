//! Audit events recorded by the engine.
//!
//! Events are appended to the launchpad's log inside the same transaction as
//! the state change they describe, so a rolled-back call leaves no events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sale::FinalizeReport;
use crate::types::{Address, Amount, AssetId, LockId, SaleId, WhitelistId};

/// Something that happened in the launchpad.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchpadEvent {
    SaleCreated {
        sale: SaleId,
        owner: Address,
        sale_asset: AssetId,
        fund_asset: AssetId,
        total_tokens: Amount,
        whitelist: Option<WhitelistId>,
    },
    FeePaid {
        payer: Address,
        asset: AssetId,
        amount: Amount,
    },
    Deposited {
        sale: SaleId,
        contributor: Address,
        amount: Amount,
    },
    /// Native value sent to a sale before start, passed to the router.
    Forwarded {
        sale: SaleId,
        from: Address,
        amount: Amount,
    },
    /// One wallet added to or removed from a whitelist.
    WhitelistUpdated {
        whitelist: WhitelistId,
        added: bool,
        user: Address,
        timestamp: DateTime<Utc>,
    },
    WhitelistCreated {
        whitelist: WhitelistId,
        owner: Address,
    },
    WhitelistAttached {
        sale: SaleId,
        whitelist: WhitelistId,
    },
    Canceled {
        sale: SaleId,
    },
    Finalized {
        sale: SaleId,
        report: FinalizeReport,
    },
    Withdrawn {
        sale: SaleId,
        contributor: Address,
        tokens: Amount,
    },
    Refunded {
        sale: SaleId,
        contributor: Address,
        amount: Amount,
    },
    EmergencyWithdrawn {
        sale: SaleId,
        contributor: Address,
        refund: Amount,
        penalty: Amount,
    },
    TokensReclaimed {
        sale: SaleId,
        amount: Amount,
    },
    LiquidityWithdrawn {
        sale: SaleId,
        lock: LockId,
        amount: Amount,
    },
    Locked {
        lock: LockId,
        asset: AssetId,
        amount: Amount,
        beneficiary: Address,
        unlock_at: DateTime<Utc>,
    },
    Unlocked {
        lock: LockId,
        beneficiary: Address,
        amount: Amount,
    },
    LockTransferred {
        lock: LockId,
        from: Address,
        to: Address,
    },
    PartnerTokenSet {
        asset: AssetId,
        valid: bool,
        discount_bps: u32,
    },
    /// A governance parameter changed.
    SettingsUpdated {
        field: String,
    },
}

impl LaunchpadEvent {
    /// Sale this event concerns, if any.
    pub fn sale(&self) -> Option<SaleId> {
        match self {
            LaunchpadEvent::SaleCreated { sale, .. }
            | LaunchpadEvent::Deposited { sale, .. }
            | LaunchpadEvent::Forwarded { sale, .. }
            | LaunchpadEvent::WhitelistAttached { sale, .. }
            | LaunchpadEvent::Canceled { sale }
            | LaunchpadEvent::Finalized { sale, .. }
            | LaunchpadEvent::Withdrawn { sale, .. }
            | LaunchpadEvent::Refunded { sale, .. }
            | LaunchpadEvent::EmergencyWithdrawn { sale, .. }
            | LaunchpadEvent::TokensReclaimed { sale, .. }
            | LaunchpadEvent::LiquidityWithdrawn { sale, .. } => Some(*sale),
            _ => None,
        }
    }
}
