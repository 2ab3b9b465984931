//! # Asset Ledger
//!
//! The launchpad never owns token logic. It moves value through the
//! [`AssetLedger`] trait (balances, allowances, transfers) and, for pool
//! shares, through [`AssetIssuer`] (asset creation and minting).
//!
//! [`InMemoryLedger`] is the reference implementation used by tests,
//! benchmarks and simulations. It supports what real assets do to a
//! launchpad in practice:
//!
//! - **Allowances**: `transfer_from` spends an allowance granted by `approve`.
//! - **Transfer fees**: an asset may skim a bps fee on every transfer, sent
//!   to the retirement sink, unless either side is fee-exempt. Callers that
//!   need the exact received amount must re-read balances.
//! - **Issuer-gated minting**: only the account that created an asset can
//!   mint more of it.
//!
//! Writes made inside a launchpad call are journaled per entry (see
//! [`Journaled`]) so a failed call can be undone.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{NATIVE_DECIMALS, RETIREMENT_SINK};
use crate::journal::{Journaled, UndoLog};
use crate::math::apply_bps;
use crate::types::{Address, Amount, AssetId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The referenced asset does not exist.
    #[error("asset not found: {0}")]
    AssetNotFound(AssetId),

    /// An asset with this identifier already exists.
    #[error("duplicate asset: {0}")]
    DuplicateAsset(AssetId),

    /// The sender does not hold enough of the asset.
    #[error("insufficient {asset} balance: {account} has {balance}, needs {amount}")]
    InsufficientBalance {
        /// Asset being moved.
        asset: AssetId,
        /// Account being debited.
        account: Address,
        /// Its current balance.
        balance: Amount,
        /// Amount requested.
        amount: Amount,
    },

    /// The spender's allowance is too small.
    #[error("insufficient {asset} allowance: {spender} may spend {allowance} of {owner}, needs {amount}")]
    InsufficientAllowance {
        /// Asset being moved.
        asset: AssetId,
        /// Account whose funds are spent.
        owner: Address,
        /// Account spending them.
        spender: Address,
        /// Remaining allowance.
        allowance: Amount,
        /// Amount requested.
        amount: Amount,
    },

    /// Only the issuer may mint.
    #[error("unauthorized: {0} is not the issuer of {1}")]
    UnauthorizedMint(Address, AssetId),

    /// A balance or supply would exceed `u128::MAX`.
    #[error("overflow: {0}")]
    Overflow(AssetId),
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Balance, allowance and transfer semantics of a fungible-asset ledger.
///
/// `transfer` moves funds owned by the authorizing account; `transfer_from`
/// moves someone else's funds against an allowance. Either may deliver less
/// than `amount` to the recipient if the asset charges a transfer fee.
pub trait AssetLedger {
    /// Decimal precision of `asset`.
    fn decimals(&self, asset: &AssetId) -> Result<u8, LedgerError>;

    /// Balance of `account`, zero for unknown accounts or assets.
    fn balance_of(&self, asset: &AssetId, account: &Address) -> Amount;

    /// Remaining amount `spender` may move out of `owner`'s balance.
    fn allowance(&self, asset: &AssetId, owner: &Address, spender: &Address) -> Amount;

    /// Moves `amount` from `from` (the authorizing account) to `to`.
    fn transfer(
        &mut self,
        asset: &AssetId,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError>;

    /// Moves `amount` from `from` to `to`, spending `spender`'s allowance.
    fn transfer_from(
        &mut self,
        asset: &AssetId,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError>;

    /// Sets the allowance of `spender` over `owner`'s balance to `amount`.
    fn approve(
        &mut self,
        asset: &AssetId,
        owner: &Address,
        spender: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError>;
}

/// Asset creation and minting, needed by collaborators that issue shares.
pub trait AssetIssuer: AssetLedger {
    /// Registers a new asset issued by `issuer`.
    fn create_asset(
        &mut self,
        asset: &AssetId,
        decimals: u8,
        issuer: &Address,
    ) -> Result<(), LedgerError>;

    /// Mints `amount` of `asset` to `to`. `minter` must be the issuer.
    fn mint(
        &mut self,
        asset: &AssetId,
        minter: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError>;
}

// ---------------------------------------------------------------------------
// In-memory reference ledger
// ---------------------------------------------------------------------------

/// Metadata and fee policy of one asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetInfo {
    /// Asset identifier.
    pub id: AssetId,
    /// Decimal precision.
    pub decimals: u8,
    /// Account allowed to mint.
    pub issuer: Address,
    /// Current total supply.
    pub total_supply: Amount,
    /// Fee skimmed on every non-exempt transfer, in bps.
    pub transfer_fee_bps: u32,
    /// Accounts for which transfers are fee-free in either direction.
    pub fee_exempt: HashSet<Address>,
}

/// Undo logs of the ledger's three tables.
#[derive(Debug, Clone, Default)]
struct LedgerJournal {
    assets: UndoLog<AssetId, AssetInfo>,
    balances: UndoLog<(AssetId, Address), Amount>,
    allowances: UndoLog<(AssetId, Address, Address), Amount>,
}

/// Multi-asset ledger held entirely in memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InMemoryLedger {
    assets: HashMap<AssetId, AssetInfo>,
    /// `asset -> (account -> balance)`.
    balances: HashMap<AssetId, HashMap<Address, Amount>>,
    /// `asset -> (owner -> (spender -> allowance))`.
    allowances: HashMap<AssetId, HashMap<Address, HashMap<Address, Amount>>>,
    #[serde(skip)]
    journal: LedgerJournal,
}

impl InMemoryLedger {
    /// Creates a ledger that knows only the native asset.
    pub fn new() -> Self {
        let mut ledger = Self {
            assets: HashMap::new(),
            balances: HashMap::new(),
            allowances: HashMap::new(),
            journal: LedgerJournal::default(),
        };
        ledger.register(AssetId::native(), NATIVE_DECIMALS, Address::from("genesis"));
        ledger
    }

    fn register(&mut self, id: AssetId, decimals: u8, issuer: Address) {
        self.journal.assets.record(&id, || None);
        self.balances.insert(id.clone(), HashMap::new());
        self.allowances.insert(id.clone(), HashMap::new());
        self.assets.insert(
            id.clone(),
            AssetInfo {
                id,
                decimals,
                issuer,
                total_supply: 0,
                transfer_fee_bps: 0,
                fee_exempt: HashSet::new(),
            },
        );
    }

    /// Credits `amount` of `asset` to `account` out of thin air, bypassing
    /// issuer checks. Used to seed genesis balances.
    pub fn credit(
        &mut self,
        asset: &AssetId,
        account: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let issuer = self.info(asset)?.issuer.clone();
        self.mint(asset, &issuer, account, amount)
    }

    /// Sets the transfer fee of `asset`.
    pub fn set_transfer_fee(&mut self, asset: &AssetId, bps: u32) -> Result<(), LedgerError> {
        self.info_mut(asset)?.transfer_fee_bps = bps;
        Ok(())
    }

    /// Makes transfers to or from `account` fee-free for `asset`.
    pub fn exclude_from_fee(&mut self, asset: &AssetId, account: &Address) -> Result<(), LedgerError> {
        self.info_mut(asset)?.fee_exempt.insert(account.clone());
        Ok(())
    }

    /// Returns metadata for an asset, or `None` if it does not exist.
    pub fn asset_info(&self, asset: &AssetId) -> Option<&AssetInfo> {
        self.assets.get(asset)
    }

    /// Total supply of `asset`, or 0 if it does not exist.
    pub fn total_supply(&self, asset: &AssetId) -> Amount {
        self.assets.get(asset).map(|a| a.total_supply).unwrap_or(0)
    }

    fn info(&self, asset: &AssetId) -> Result<&AssetInfo, LedgerError> {
        self.assets
            .get(asset)
            .ok_or_else(|| LedgerError::AssetNotFound(asset.clone()))
    }

    fn info_mut(&mut self, asset: &AssetId) -> Result<&mut AssetInfo, LedgerError> {
        let info = self
            .assets
            .get_mut(asset)
            .ok_or_else(|| LedgerError::AssetNotFound(asset.clone()))?;
        self.journal.assets.record(asset, || Some(info.clone()));
        Ok(info)
    }

    fn note_balance(&mut self, asset: &AssetId, account: &Address) {
        if !self.journal.balances.is_open() {
            return;
        }
        let balances = &self.balances;
        self.journal.balances.record(&(asset.clone(), account.clone()), || {
            balances.get(asset).and_then(|b| b.get(account)).copied()
        });
    }

    fn note_allowance(&mut self, asset: &AssetId, owner: &Address, spender: &Address) {
        if !self.journal.allowances.is_open() {
            return;
        }
        let allowances = &self.allowances;
        self.journal
            .allowances
            .record(&(asset.clone(), owner.clone(), spender.clone()), || {
                allowances
                    .get(asset)
                    .and_then(|a| a.get(owner))
                    .and_then(|a| a.get(spender))
                    .copied()
            });
    }

    /// Debits `from`, credits `to` net of the transfer fee, credits the fee
    /// to the retirement sink.
    fn move_balance(
        &mut self,
        asset: &AssetId,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let info = self.info(asset)?;
        let exempt = info.fee_exempt.contains(from) || info.fee_exempt.contains(to);
        let fee = if exempt || info.transfer_fee_bps == 0 {
            0
        } else {
            apply_bps(amount, info.transfer_fee_bps)
                .map_err(|_| LedgerError::Overflow(asset.clone()))?
        };

        let sink = Address::from(RETIREMENT_SINK);
        self.note_balance(asset, from);
        self.note_balance(asset, to);
        if fee > 0 {
            self.note_balance(asset, &sink);
        }
        let balances = self
            .balances
            .get_mut(asset)
            .ok_or_else(|| LedgerError::AssetNotFound(asset.clone()))?;

        let balance = balances.get(from).copied().unwrap_or(0);
        if balance < amount {
            return Err(LedgerError::InsufficientBalance {
                asset: asset.clone(),
                account: from.clone(),
                balance,
                amount,
            });
        }
        balances.insert(from.clone(), balance - amount);

        let received = balances.entry(to.clone()).or_insert(0);
        *received = received
            .checked_add(amount - fee)
            .ok_or_else(|| LedgerError::Overflow(asset.clone()))?;

        if fee > 0 {
            let sunk = balances.entry(sink).or_insert(0);
            *sunk = sunk
                .checked_add(fee)
                .ok_or_else(|| LedgerError::Overflow(asset.clone()))?;
        }
        Ok(())
    }
}

impl Journaled for InMemoryLedger {
    fn begin(&mut self) {
        self.journal.assets.begin();
        self.journal.balances.begin();
        self.journal.allowances.begin();
    }

    fn commit(&mut self) {
        self.journal.assets.commit();
        self.journal.balances.commit();
        self.journal.allowances.commit();
    }

    fn rollback(&mut self) {
        for ((asset, account), prior) in self.journal.balances.drain() {
            let balances = self.balances.entry(asset).or_default();
            match prior {
                Some(amount) => {
                    balances.insert(account, amount);
                }
                None => {
                    balances.remove(&account);
                }
            }
        }
        for ((asset, owner, spender), prior) in self.journal.allowances.drain() {
            let granted = self.allowances.entry(asset).or_default().entry(owner).or_default();
            match prior {
                Some(amount) => {
                    granted.insert(spender, amount);
                }
                None => {
                    granted.remove(&spender);
                }
            }
        }
        // Assets created in the call disappear with their tables.
        for (asset, prior) in self.journal.assets.drain() {
            match prior {
                Some(info) => {
                    self.assets.insert(asset, info);
                }
                None => {
                    self.assets.remove(&asset);
                    self.balances.remove(&asset);
                    self.allowances.remove(&asset);
                }
            }
        }
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetLedger for InMemoryLedger {
    fn decimals(&self, asset: &AssetId) -> Result<u8, LedgerError> {
        Ok(self.info(asset)?.decimals)
    }

    fn balance_of(&self, asset: &AssetId, account: &Address) -> Amount {
        self.balances
            .get(asset)
            .and_then(|b| b.get(account))
            .copied()
            .unwrap_or(0)
    }

    fn allowance(&self, asset: &AssetId, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(asset)
            .and_then(|a| a.get(owner))
            .and_then(|a| a.get(spender))
            .copied()
            .unwrap_or(0)
    }

    fn transfer(
        &mut self,
        asset: &AssetId,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.move_balance(asset, from, to, amount)
    }

    fn transfer_from(
        &mut self,
        asset: &AssetId,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let allowance = self.allowance(asset, from, spender);
        if allowance < amount {
            return Err(LedgerError::InsufficientAllowance {
                asset: asset.clone(),
                owner: from.clone(),
                spender: spender.clone(),
                allowance,
                amount,
            });
        }
        self.move_balance(asset, from, to, amount)?;
        // Unlimited approvals are never decremented.
        if allowance != Amount::MAX {
            self.approve(asset, from, spender, allowance - amount)?;
        }
        Ok(())
    }

    fn approve(
        &mut self,
        asset: &AssetId,
        owner: &Address,
        spender: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.note_allowance(asset, owner, spender);
        let allowances = self
            .allowances
            .get_mut(asset)
            .ok_or_else(|| LedgerError::AssetNotFound(asset.clone()))?;
        allowances
            .entry(owner.clone())
            .or_default()
            .insert(spender.clone(), amount);
        Ok(())
    }
}

impl AssetIssuer for InMemoryLedger {
    fn create_asset(
        &mut self,
        asset: &AssetId,
        decimals: u8,
        issuer: &Address,
    ) -> Result<(), LedgerError> {
        if self.assets.contains_key(asset) {
            return Err(LedgerError::DuplicateAsset(asset.clone()));
        }
        self.register(asset.clone(), decimals, issuer.clone());
        Ok(())
    }

    fn mint(
        &mut self,
        asset: &AssetId,
        minter: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let info = self.info(asset)?;
        if &info.issuer != minter {
            return Err(LedgerError::UnauthorizedMint(minter.clone(), asset.clone()));
        }
        let new_supply = info
            .total_supply
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow(asset.clone()))?;

        self.note_balance(asset, to);
        let balances = self
            .balances
            .get_mut(asset)
            .ok_or_else(|| LedgerError::AssetNotFound(asset.clone()))?;
        let balance = balances.entry(to.clone()).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow(asset.clone()))?;

        self.info_mut(asset)?.total_supply = new_supply;
        Ok(())
    }
}
