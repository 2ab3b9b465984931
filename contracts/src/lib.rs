//! # Bifrost Launchpad Contracts
//!
//! The crowdsale lifecycle engine of the Bifrost launchpad. Project owners
//! run time-boxed token sales with escrow, optional whitelisting and tiered
//! fee payment; successful sales seed a liquidity pool and lock the pool
//! shares for the owner.
//!
//! - **Router**: sale factory and fee gate, flat or discounted in a partner
//!   asset.
//! - **Settings**: global tunables, governance roles and template upgrades.
//! - **Sale**: the per-project state machine from Pending to Finalized.
//! - **Whitelist**: capped, paginated allow-list.
//! - **PriceFeed**: listing-fee conversion into partner assets.
//!
//! The asset ledger and the liquidity pool are external collaborators behind
//! the [`ledger::AssetLedger`] and [`pool::LiquidityPool`] traits, with
//! in-memory reference implementations. Pool shares are held by the
//! [`lock::LockRegistry`].
//!
//! ## Design Principles
//!
//! 1. All monetary arithmetic is checked. Overflow is an error, never a wrap.
//! 2. Every call through [`launchpad::Launchpad`] is all-or-nothing.
//! 3. Effects are booked before value moves.
//! 4. Time is an input. Nothing reads the wall clock.
//! 5. Every public record is serializable (serde).

pub mod config;
pub mod error;
pub mod events;
pub mod journal;
pub mod launchpad;
pub mod ledger;
pub mod lock;
pub mod logging;
pub mod math;
pub mod pool;
pub mod price_feed;
pub mod router;
pub mod sale;
pub mod settings;
pub mod shared;
pub mod types;
pub mod whitelist;

/// The types most callers need.
pub mod prelude {
    pub use crate::config::{SettingsConfig, TemplateRef};
    pub use crate::error::{ErrorKind, LaunchpadError};
    pub use crate::events::LaunchpadEvent;
    pub use crate::journal::Journaled;
    pub use crate::launchpad::Launchpad;
    pub use crate::ledger::{AssetIssuer, AssetLedger, InMemoryLedger};
    pub use crate::pool::{ConstantProductPool, LiquidityPool};
    pub use crate::sale::{FinalizeReport, Phase, Receipt, SaleParameters, Withdrawal};
    pub use crate::shared::SharedLaunchpad;
    pub use crate::types::{Address, Amount, AssetId, CallContext, LockId, SaleId, WhitelistId};
    pub use crate::whitelist::WhitelistEntry;
}
