//! # Lock Registry
//!
//! Custody of assets until a fixed expiry. Each lock is a certificate: the
//! record, not an address-keyed balance, says who may claim it, and the
//! certificate can change hands without touching the locked funds.
//!
//! Finalized sales lock their pool shares here with the sale owner as
//! beneficiary.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::LOCK_REGISTRY_ACCOUNT;
use crate::error::LaunchpadError;
use crate::journal::{Journaled, UndoLog};
use crate::ledger::AssetLedger;
use crate::types::{Address, Amount, AssetId, LockId};

/// A time-locked custody certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Certificate identifier.
    pub id: LockId,
    /// Locked asset.
    pub asset: AssetId,
    /// Amount held in custody.
    pub amount: Amount,
    /// Current certificate holder.
    pub beneficiary: Address,
    /// Earliest time the holder may claim.
    pub unlock_at: DateTime<Utc>,
    /// Set once the funds have been released.
    pub claimed: bool,
    /// When the lock was created.
    pub created_at: DateTime<Utc>,
}

/// Undo state of one call: touched records and the id counter at `begin`.
#[derive(Debug, Clone, Default)]
struct LockJournal {
    records: UndoLog<LockId, LockRecord>,
    next_id: Option<u64>,
}

/// Registry of all lock certificates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockRegistry {
    next_id: u64,
    records: BTreeMap<LockId, LockRecord>,
    #[serde(skip)]
    journal: LockJournal,
}

impl Default for LockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Journaled for LockRegistry {
    fn begin(&mut self) {
        self.journal.records.begin();
        self.journal.next_id = Some(self.next_id);
    }

    fn commit(&mut self) {
        self.journal.records.commit();
        self.journal.next_id = None;
    }

    fn rollback(&mut self) {
        self.journal.records.rollback_into(&mut self.records);
        if let Some(next_id) = self.journal.next_id.take() {
            self.next_id = next_id;
        }
    }
}

impl LockRegistry {
    /// Creates an empty registry. The first lock gets id 1.
    pub fn new() -> Self {
        Self {
            next_id: 1,
            records: BTreeMap::new(),
            journal: LockJournal::default(),
        }
    }

    /// Custody account holding every locked amount.
    pub fn account() -> Address {
        Address::from(LOCK_REGISTRY_ACCOUNT)
    }

    /// Pulls `amount` of `asset` from `depositor` and issues a certificate to
    /// `beneficiary`, claimable `period_secs` after `now`.
    ///
    /// The depositor must have approved the registry account. The recorded
    /// amount is what actually arrived in custody.
    #[allow(clippy::too_many_arguments)]
    pub fn lock<L: AssetLedger>(
        &mut self,
        ledger: &mut L,
        depositor: &Address,
        beneficiary: &Address,
        asset: &AssetId,
        amount: Amount,
        period_secs: u64,
        now: DateTime<Utc>,
    ) -> Result<LockId, LaunchpadError> {
        if amount == 0 {
            return Err(LaunchpadError::Validation("cannot lock a zero amount".into()));
        }
        let period = i64::try_from(period_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| LaunchpadError::Validation(format!("lock period {period_secs}s out of range")))?;
        let unlock_at = now
            .checked_add_signed(period)
            .ok_or_else(|| LaunchpadError::Validation(format!("lock period {period_secs}s out of range")))?;

        let custody = Self::account();
        let before = ledger.balance_of(asset, &custody);
        ledger.transfer_from(asset, &custody, depositor, &custody, amount)?;
        let received = ledger
            .balance_of(asset, &custody)
            .checked_sub(before)
            .ok_or_else(|| LaunchpadError::Arithmetic("custody balance decreased".into()))?;

        let id = LockId(self.next_id);
        self.next_id = self
            .next_id
            .checked_add(1)
            .ok_or_else(|| LaunchpadError::Arithmetic("lock id space exhausted".into()))?;
        self.journal.records.record(&id, || None);
        self.records.insert(
            id,
            LockRecord {
                id,
                asset: asset.clone(),
                amount: received,
                beneficiary: beneficiary.clone(),
                unlock_at,
                claimed: false,
                created_at: now,
            },
        );

        tracing::info!(%id, %asset, amount = received, %beneficiary, %unlock_at, "lock created");
        Ok(id)
    }

    /// Releases the locked amount to the certificate holder.
    ///
    /// Fails unless `caller` holds the certificate, `now` is at or past
    /// expiry, and the lock has not been claimed.
    pub fn unlock<L: AssetLedger>(
        &mut self,
        ledger: &mut L,
        caller: &Address,
        id: LockId,
        now: DateTime<Utc>,
    ) -> Result<Amount, LaunchpadError> {
        let record = self
            .records
            .get_mut(&id)
            .ok_or_else(|| LaunchpadError::NotFound(format!("{id}")))?;
        self.journal.records.record(&id, || Some(record.clone()));
        if &record.beneficiary != caller {
            return Err(LaunchpadError::unauthorized(caller, "lock owner"));
        }
        if record.claimed {
            return Err(LaunchpadError::InvalidState(format!("{id} already claimed")));
        }
        if now < record.unlock_at {
            return Err(LaunchpadError::InvalidState(format!(
                "{id} still in the lock period until {}",
                record.unlock_at
            )));
        }

        record.claimed = true;
        let amount = record.amount;
        let asset = record.asset.clone();
        ledger.transfer(&asset, &Self::account(), caller, amount)?;

        tracing::info!(%id, %asset, amount, beneficiary = %caller, "lock released");
        Ok(amount)
    }

    /// Hands the certificate to `to`. Only the current holder may do this,
    /// and only while the lock is unclaimed.
    pub fn transfer_certificate(
        &mut self,
        caller: &Address,
        id: LockId,
        to: &Address,
    ) -> Result<(), LaunchpadError> {
        let record = self
            .records
            .get_mut(&id)
            .ok_or_else(|| LaunchpadError::NotFound(format!("{id}")))?;
        self.journal.records.record(&id, || Some(record.clone()));
        if &record.beneficiary != caller {
            return Err(LaunchpadError::unauthorized(caller, "lock owner"));
        }
        if record.claimed {
            return Err(LaunchpadError::InvalidState(format!("{id} already claimed")));
        }
        record.beneficiary = to.clone();
        tracing::debug!(%id, from = %caller, %to, "lock certificate transferred");
        Ok(())
    }

    /// Returns the record for `id`.
    pub fn record(&self, id: LockId) -> Option<&LockRecord> {
        self.records.get(&id)
    }

    /// Current holder of certificate `id`.
    pub fn owner_of(&self, id: LockId) -> Option<&Address> {
        self.records.get(&id).map(|r| &r.beneficiary)
    }

    /// Number of certificates ever issued.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no lock was ever created.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::ledger::{AssetIssuer, InMemoryLedger};

    fn funded() -> (InMemoryLedger, AssetId, Address) {
        let mut ledger = InMemoryLedger::new();
        let asset = AssetId::from("LP");
        let owner = Address::from("owner");
        ledger.create_asset(&asset, 18, &owner).unwrap();
        ledger.mint(&asset, &owner, &owner, 5_000).unwrap();
        ledger
            .approve(&asset, &owner, &LockRegistry::account(), 5_000)
            .unwrap();
        (ledger, asset, owner)
    }

    #[test]
    fn ids_start_at_one() {
        let (mut ledger, asset, owner) = funded();
        let mut registry = LockRegistry::new();
        let now = Utc::now();
        let first = registry
            .lock(&mut ledger, &owner, &owner, &asset, 1_000, 60, now)
            .unwrap();
        let second = registry
            .lock(&mut ledger, &owner, &owner, &asset, 1_000, 60, now)
            .unwrap();
        assert_eq!(first, LockId(1));
        assert_eq!(second, LockId(2));
        assert_eq!(ledger.balance_of(&asset, &LockRegistry::account()), 2_000);
    }

    #[test]
    fn unlock_respects_expiry_and_owner() {
        let (mut ledger, asset, owner) = funded();
        let mut registry = LockRegistry::new();
        let now = Utc::now();
        let id = registry
            .lock(&mut ledger, &owner, &owner, &asset, 5_000, 3_600, now)
            .unwrap();

        let early = registry.unlock(&mut ledger, &owner, id, now + Duration::seconds(3_599));
        assert_eq!(early.unwrap_err().kind(), ErrorKind::State);

        let stranger = registry.unlock(&mut ledger, &Address::from("eve"), id, now + Duration::hours(2));
        assert_eq!(stranger.unwrap_err().kind(), ErrorKind::Authorization);

        let amount = registry
            .unlock(&mut ledger, &owner, id, now + Duration::seconds(3_600))
            .unwrap();
        assert_eq!(amount, 5_000);
        assert_eq!(ledger.balance_of(&asset, &owner), 5_000);
        assert!(registry.record(id).unwrap().claimed);

        let again = registry.unlock(&mut ledger, &owner, id, now + Duration::hours(3));
        assert_eq!(again.unwrap_err().kind(), ErrorKind::State);
    }

    #[test]
    fn certificate_transfer_moves_claim_right() {
        let (mut ledger, asset, owner) = funded();
        let mut registry = LockRegistry::new();
        let now = Utc::now();
        let id = registry
            .lock(&mut ledger, &owner, &owner, &asset, 100, 10, now)
            .unwrap();
        let heir = Address::from("heir");
        registry.transfer_certificate(&owner, id, &heir).unwrap();
        assert_eq!(registry.owner_of(id), Some(&heir));

        let later = now + Duration::seconds(10);
        assert!(registry.unlock(&mut ledger, &owner, id, later).is_err());
        registry.unlock(&mut ledger, &heir, id, later).unwrap();
        assert_eq!(ledger.balance_of(&asset, &heir), 100);
    }

    #[test]
    fn lock_without_allowance_fails() {
        let (mut ledger, asset, _) = funded();
        let mut registry = LockRegistry::new();
        let stranger = Address::from("stranger");
        let result = registry.lock(&mut ledger, &stranger, &stranger, &asset, 1, 1, Utc::now());
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Collaborator);
        assert!(registry.is_empty());
    }

    #[test]
    fn rollback_reissues_ids_and_reopens_claims() {
        let (mut ledger, asset, owner) = funded();
        let mut registry = LockRegistry::new();
        let now = Utc::now();
        let kept = registry
            .lock(&mut ledger, &owner, &owner, &asset, 100, 10, now)
            .unwrap();

        registry.begin();
        let dropped = registry
            .lock(&mut ledger, &owner, &owner, &asset, 100, 10, now)
            .unwrap();
        registry
            .unlock(&mut ledger, &owner, kept, now + Duration::seconds(10))
            .unwrap();
        registry.rollback();

        assert!(registry.record(dropped).is_none());
        assert!(!registry.record(kept).unwrap().claimed);
        let reissued = registry
            .lock(&mut ledger, &owner, &owner, &asset, 100, 10, now)
            .unwrap();
        assert_eq!(reissued, dropped);
    }
}
