//! # Liquidity Pool
//!
//! Finalized sales seed a trading pair with part of the raised funds and
//! part of the sale tokens. The engine only needs two things from a pool:
//! create a pair, and deposit into it for shares. [`LiquidityPool`] is that
//! seam; [`ConstantProductPool`] is the reference implementation.
//!
//! Shares are ordinary ledger assets issued by the pool account, so they can
//! be approved and locked like any other asset.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{MINIMUM_LIQUIDITY, NATIVE_DECIMALS, POOL_ACCOUNT, RETIREMENT_SINK};
use crate::journal::{Journaled, UndoLog};
use crate::ledger::{AssetIssuer, LedgerError};
use crate::math::{mul_div, sqrt_product};
use crate::types::{Address, Amount, AssetId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by pool operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// A pair needs two distinct assets.
    #[error("identical assets: {0}")]
    IdenticalAssets(AssetId),

    /// The pair was already created.
    #[error("pair already exists: {0}")]
    PairExists(AssetId),

    /// No pair exists for these assets.
    #[error("no pair for {0}/{1}")]
    PairNotFound(AssetId, AssetId),

    /// One side of a deposit delivered nothing.
    #[error("zero amount deposited")]
    ZeroAmount,

    /// The deposit is too small to mint any shares.
    #[error("insufficient liquidity minted: {0} shares")]
    InsufficientLiquidityMinted(Amount),

    /// Reserve or share arithmetic overflowed.
    #[error("pool arithmetic overflow")]
    Overflow,

    /// The ledger refused a transfer or mint.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Pair creation and liquidity provision.
pub trait LiquidityPool {
    /// Account that spends the allowances providers grant before
    /// `add_liquidity`.
    fn spender(&self) -> Address;

    /// Share asset of the pair for `a` and `b`, in either order, if it exists.
    fn pair_of(&self, a: &AssetId, b: &AssetId) -> Option<AssetId>;

    /// Creates the pair and registers its share asset. Returns the share asset.
    fn create_pair<L: AssetIssuer>(
        &mut self,
        ledger: &mut L,
        a: &AssetId,
        b: &AssetId,
    ) -> Result<AssetId, PoolError>;

    /// Pulls `amount_a` and `amount_b` from `provider` against allowances
    /// granted to the pool account, and mints shares to `provider`.
    /// Returns the number of shares minted.
    #[allow(clippy::too_many_arguments)]
    fn add_liquidity<L: AssetIssuer>(
        &mut self,
        ledger: &mut L,
        provider: &Address,
        a: &AssetId,
        b: &AssetId,
        amount_a: Amount,
        amount_b: Amount,
    ) -> Result<Amount, PoolError>;
}

// ---------------------------------------------------------------------------
// Constant-product reference pool
// ---------------------------------------------------------------------------

/// State of one trading pair. Assets are stored in sorted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    /// Lower-sorting asset.
    pub asset_a: AssetId,
    /// Higher-sorting asset.
    pub asset_b: AssetId,
    /// Ledger asset representing pool shares.
    pub share_asset: AssetId,
    /// Reserve of `asset_a`.
    pub reserve_a: Amount,
    /// Reserve of `asset_b`.
    pub reserve_b: Amount,
    /// Shares outstanding, including the retired minimum.
    pub total_shares: Amount,
}

/// A constant-product pool with one custody account for all pairs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstantProductPool {
    /// Pairs keyed by share asset.
    pairs: BTreeMap<AssetId, Pair>,
    #[serde(skip)]
    journal: UndoLog<AssetId, Pair>,
}

impl ConstantProductPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// The custody account holding every pair's reserves.
    pub fn account() -> Address {
        Address::from(POOL_ACCOUNT)
    }

    /// Pair state for `a` and `b`, in either order.
    pub fn pair(&self, a: &AssetId, b: &AssetId) -> Option<&Pair> {
        self.pairs.get(&share_asset_id(a, b))
    }
}

fn sorted<'a>(a: &'a AssetId, b: &'a AssetId) -> (&'a AssetId, &'a AssetId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn share_asset_id(a: &AssetId, b: &AssetId) -> AssetId {
    let (lo, hi) = sorted(a, b);
    AssetId::new(format!("LP:{lo}/{hi}"))
}

/// Moves `amount` from `provider` into the pool and returns what arrived.
fn pull<L: AssetIssuer>(
    ledger: &mut L,
    asset: &AssetId,
    provider: &Address,
    amount: Amount,
) -> Result<Amount, PoolError> {
    let pool = ConstantProductPool::account();
    let before = ledger.balance_of(asset, &pool);
    ledger.transfer_from(asset, &pool, provider, &pool, amount)?;
    let after = ledger.balance_of(asset, &pool);
    after.checked_sub(before).ok_or(PoolError::Overflow)
}

impl Journaled for ConstantProductPool {
    fn begin(&mut self) {
        self.journal.begin();
    }

    fn commit(&mut self) {
        self.journal.commit();
    }

    fn rollback(&mut self) {
        self.journal.rollback_into(&mut self.pairs);
    }
}

impl LiquidityPool for ConstantProductPool {
    fn spender(&self) -> Address {
        Self::account()
    }

    fn pair_of(&self, a: &AssetId, b: &AssetId) -> Option<AssetId> {
        let id = share_asset_id(a, b);
        self.pairs.contains_key(&id).then_some(id)
    }

    fn create_pair<L: AssetIssuer>(
        &mut self,
        ledger: &mut L,
        a: &AssetId,
        b: &AssetId,
    ) -> Result<AssetId, PoolError> {
        if a == b {
            return Err(PoolError::IdenticalAssets(a.clone()));
        }
        let share_asset = share_asset_id(a, b);
        if self.pairs.contains_key(&share_asset) {
            return Err(PoolError::PairExists(share_asset));
        }
        ledger.create_asset(&share_asset, NATIVE_DECIMALS, &Self::account())?;

        let (lo, hi) = sorted(a, b);
        self.journal.record(&share_asset, || None);
        self.pairs.insert(
            share_asset.clone(),
            Pair {
                asset_a: lo.clone(),
                asset_b: hi.clone(),
                share_asset: share_asset.clone(),
                reserve_a: 0,
                reserve_b: 0,
                total_shares: 0,
            },
        );
        tracing::debug!(pair = %share_asset, "pair created");
        Ok(share_asset)
    }

    fn add_liquidity<L: AssetIssuer>(
        &mut self,
        ledger: &mut L,
        provider: &Address,
        a: &AssetId,
        b: &AssetId,
        amount_a: Amount,
        amount_b: Amount,
    ) -> Result<Amount, PoolError> {
        let share_asset = share_asset_id(a, b);
        let pair = self
            .pairs
            .get_mut(&share_asset)
            .ok_or_else(|| PoolError::PairNotFound(a.clone(), b.clone()))?;
        self.journal.record(&share_asset, || Some(pair.clone()));

        // Normalize argument order to the pair's sorted order.
        let (amount_lo, amount_hi) = if a <= b {
            (amount_a, amount_b)
        } else {
            (amount_b, amount_a)
        };
        let received_a = pull(ledger, &pair.asset_a, provider, amount_lo)?;
        let received_b = pull(ledger, &pair.asset_b, provider, amount_hi)?;
        if received_a == 0 || received_b == 0 {
            return Err(PoolError::ZeroAmount);
        }

        let pool = Self::account();
        let shares = if pair.total_shares == 0 {
            let root = sqrt_product(received_a, received_b);
            if root <= MINIMUM_LIQUIDITY {
                return Err(PoolError::InsufficientLiquidityMinted(0));
            }
            ledger.mint(
                &share_asset,
                &pool,
                &Address::from(RETIREMENT_SINK),
                MINIMUM_LIQUIDITY,
            )?;
            pair.total_shares = MINIMUM_LIQUIDITY;
            root - MINIMUM_LIQUIDITY
        } else {
            let by_a = mul_div(received_a, pair.total_shares, pair.reserve_a)
                .map_err(|_| PoolError::Overflow)?;
            let by_b = mul_div(received_b, pair.total_shares, pair.reserve_b)
                .map_err(|_| PoolError::Overflow)?;
            by_a.min(by_b)
        };
        if shares == 0 {
            return Err(PoolError::InsufficientLiquidityMinted(0));
        }

        ledger.mint(&share_asset, &pool, provider, shares)?;
        pair.reserve_a = pair
            .reserve_a
            .checked_add(received_a)
            .ok_or(PoolError::Overflow)?;
        pair.reserve_b = pair
            .reserve_b
            .checked_add(received_b)
            .ok_or(PoolError::Overflow)?;
        pair.total_shares = pair
            .total_shares
            .checked_add(shares)
            .ok_or(PoolError::Overflow)?;

        tracing::debug!(pair = %share_asset, %provider, shares, "liquidity added");
        Ok(shares)
    }
}
