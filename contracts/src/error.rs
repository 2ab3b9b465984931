//! # Errors
//!
//! Every fallible launchpad operation returns [`LaunchpadError`]. The
//! variants are specific enough to tell failures apart, and [`ErrorKind`]
//! groups them into the categories callers branch on.
//!
//! A returned error always means the call had no effect: the
//! [`Launchpad`](crate::launchpad::Launchpad) facade restores its pre-call
//! state before handing the error back.

use thiserror::Error;

use crate::ledger::LedgerError;
use crate::math::MathError;
use crate::pool::PoolError;
use crate::sale::Phase;
use crate::types::{Address, Amount};

/// Coarse classification of a [`LaunchpadError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Parameters violate configured bounds or are malformed.
    Validation,
    /// Caller lacks the required role.
    Authorization,
    /// Operation is invalid for the current phase or record state.
    State,
    /// A batch bound, per-address cap, or hard cap would be exceeded.
    Capacity,
    /// Overflow, underflow, or a conversion that rounds to nothing.
    Arithmetic,
    /// A referenced sale, whitelist, lock or price does not exist.
    NotFound,
    /// The asset ledger or liquidity pool rejected an operation.
    Collaborator,
}

/// Errors produced by the launchpad engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LaunchpadError {
    /// Malformed input or a violation of a configured bound.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The caller does not hold the role this operation requires.
    #[error("unauthorized: {caller} is not the {role}")]
    Unauthorized {
        /// The account that attempted the call.
        caller: Address,
        /// The role that was required.
        role: &'static str,
    },

    /// The sale's phase does not allow this operation.
    #[error("invalid sale state: sale is {phase}, {reason}")]
    SaleState {
        /// Phase at the time of the call.
        phase: Phase,
        /// Why the operation was refused.
        reason: String,
    },

    /// A non-sale record (lock, fee flag, claim) is in the wrong state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A bound on quantity would be exceeded.
    #[error("capacity exceeded: {what} limit {limit}, attempted {attempted}")]
    CapacityExceeded {
        /// The bound that was hit.
        what: &'static str,
        /// The configured limit.
        limit: Amount,
        /// The value the call would have produced.
        attempted: Amount,
    },

    /// Checked arithmetic failed.
    #[error(transparent)]
    Math(#[from] MathError),

    /// A conversion produced nothing, or a transfer delivered less than required.
    #[error("arithmetic error: {0}")]
    Arithmetic(String),

    /// A referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The asset ledger refused a transfer or approval.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// The liquidity pool refused a deposit.
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),
}

impl LaunchpadError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LaunchpadError::Validation(_) => ErrorKind::Validation,
            LaunchpadError::Unauthorized { .. } => ErrorKind::Authorization,
            LaunchpadError::SaleState { .. } | LaunchpadError::InvalidState(_) => ErrorKind::State,
            LaunchpadError::CapacityExceeded { .. } => ErrorKind::Capacity,
            LaunchpadError::Math(_) | LaunchpadError::Arithmetic(_) => ErrorKind::Arithmetic,
            LaunchpadError::NotFound(_) => ErrorKind::NotFound,
            LaunchpadError::Ledger(_) | LaunchpadError::Pool(_) => ErrorKind::Collaborator,
        }
    }

    pub(crate) fn unauthorized(caller: &Address, role: &'static str) -> Self {
        LaunchpadError::Unauthorized {
            caller: caller.clone(),
            role,
        }
    }

    pub(crate) fn sale_state(phase: Phase, reason: impl Into<String>) -> Self {
        LaunchpadError::SaleState {
            phase,
            reason: reason.into(),
        }
    }
}
