//! Identifiers and the per-call execution context shared by every component.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{NATIVE_ASSET, SALE_ACCOUNT_PREFIX};

/// Smallest-unit amount of any asset.
pub type Amount = u128;

/// An account on the ledger: a user, a sale escrow, or a protocol account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    /// Wraps an account name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the account name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Address {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a fungible asset held in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(String);

impl AssetId {
    /// Wraps an asset symbol or contract identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The chain's native asset, in which listing fees are quoted.
    pub fn native() -> Self {
        Self::new(NATIVE_ASSET)
    }

    /// Returns `true` for the native asset.
    pub fn is_native(&self) -> bool {
        self.0 == NATIVE_ASSET
    }

    /// Returns the identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AssetId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque handle of a sale record in the router's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SaleId(Uuid);

impl SaleId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Escrow account holding this sale's assets.
    pub fn escrow_account(&self) -> Address {
        Address::new(format!("{SALE_ACCOUNT_PREFIX}{}", self.0))
    }
}

impl std::fmt::Display for SaleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle of a whitelist record in the router's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WhitelistId(Uuid);

impl WhitelistId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for WhitelistId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a lock certificate. Issued sequentially starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LockId(pub u64);

impl std::fmt::Display for LockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lock#{}", self.0)
    }
}

/// Who is calling, and when.
///
/// The clock is observed by the execution environment and handed in with
/// every call; no component reads the wall clock itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    /// The account that authorized the call.
    pub caller: Address,
    /// Block time at which the call executes.
    pub now: DateTime<Utc>,
}

impl CallContext {
    /// Builds a context for `caller` at time `now`.
    pub fn new(caller: impl Into<Address>, now: DateTime<Utc>) -> Self {
        Self {
            caller: caller.into(),
            now,
        }
    }

    /// Same time, different caller.
    pub fn with_caller(&self, caller: &Address) -> Self {
        Self {
            caller: caller.clone(),
            now: self.now,
        }
    }
}
