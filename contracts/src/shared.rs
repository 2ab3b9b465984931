//! Shared handle for hosting one engine behind many callers.
//!
//! Every mutator takes the write lock for its whole duration, so calls are
//! totally ordered and none can observe another half-done. Readers share the
//! read lock.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::journal::Journaled;
use crate::launchpad::Launchpad;
use crate::ledger::{AssetIssuer, InMemoryLedger};
use crate::pool::{ConstantProductPool, LiquidityPool};

/// Cloneable, thread-safe handle to a [`Launchpad`].
pub struct SharedLaunchpad<L = InMemoryLedger, P = ConstantProductPool> {
    inner: Arc<RwLock<Launchpad<L, P>>>,
}

impl<L, P> Clone for SharedLaunchpad<L, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L, P> SharedLaunchpad<L, P>
where
    L: AssetIssuer + Journaled,
    P: LiquidityPool + Journaled,
{
    /// Wraps an engine.
    pub fn new(launchpad: Launchpad<L, P>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(launchpad)),
        }
    }

    /// Runs a mutating call under the write lock.
    pub fn execute<T>(&self, call: impl FnOnce(&mut Launchpad<L, P>) -> T) -> T {
        let mut guard = self.inner.write();
        call(&mut guard)
    }

    /// Runs a read-only query under the read lock.
    pub fn query<T>(&self, read: impl FnOnce(&Launchpad<L, P>) -> T) -> T {
        let guard = self.inner.read();
        read(&guard)
    }
}
