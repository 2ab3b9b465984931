//! # Whitelist
//!
//! An owner-managed allow-list with optional per-address allocation caps.
//!
//! Entries live in a dense vector with a reverse index, so membership checks,
//! insertion and removal are all O(1): removal swaps the last entry into the
//! vacated slot. Enumeration order is therefore insertion order only until the
//! first removal. Pagination slices the dense vector directly.
//!
//! Add and remove calls are bounded to [`MAX_WHITELIST_BATCH`] entries.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::{TemplateRef, MAX_WHITELIST_BATCH};
use crate::error::LaunchpadError;
use crate::types::{Address, Amount, WhitelistId};

/// One allow-listed wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistEntry {
    /// The allowed wallet.
    pub wallet: Address,
    /// Cumulative contribution cap, or `None` for no per-address cap.
    pub max_allocation: Option<Amount>,
}

impl WhitelistEntry {
    /// Entry with a cap.
    pub fn capped(wallet: impl Into<Address>, max_allocation: Amount) -> Self {
        Self {
            wallet: wallet.into(),
            max_allocation: Some(max_allocation),
        }
    }

    /// Entry without a cap.
    pub fn uncapped(wallet: impl Into<Address>) -> Self {
        Self {
            wallet: wallet.into(),
            max_allocation: None,
        }
    }
}

/// A whitelist record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Whitelist {
    /// Arena handle.
    pub id: WhitelistId,
    /// Account allowed to edit the list.
    pub owner: Address,
    /// Template the record was instantiated from.
    pub template: TemplateRef,
    users: Vec<WhitelistEntry>,
    index: HashMap<Address, usize>,
}

impl Whitelist {
    /// Creates an empty whitelist owned by `owner`.
    pub fn new(id: WhitelistId, owner: Address, template: TemplateRef) -> Self {
        Self {
            id,
            owner,
            template,
            users: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Adds or updates entries. Returns the wallets that were newly added;
    /// wallets already present only have their allocation updated.
    pub fn add(
        &mut self,
        caller: &Address,
        entries: Vec<WhitelistEntry>,
    ) -> Result<Vec<Address>, LaunchpadError> {
        self.ensure_owner(caller)?;
        check_batch(entries.len())?;

        let mut added = Vec::new();
        for entry in entries {
            match self.index.get(&entry.wallet) {
                Some(&slot) => self.users[slot].max_allocation = entry.max_allocation,
                None => {
                    self.index.insert(entry.wallet.clone(), self.users.len());
                    added.push(entry.wallet.clone());
                    self.users.push(entry);
                }
            }
        }
        tracing::debug!(whitelist = %self.id, added = added.len(), total = self.users.len(), "whitelist entries added");
        Ok(added)
    }

    /// Removes wallets. Absent wallets are skipped. Returns the wallets that
    /// were actually removed.
    pub fn remove(
        &mut self,
        caller: &Address,
        wallets: &[Address],
    ) -> Result<Vec<Address>, LaunchpadError> {
        self.ensure_owner(caller)?;
        check_batch(wallets.len())?;

        let mut removed = Vec::new();
        for wallet in wallets {
            let Some(slot) = self.index.remove(wallet) else {
                continue;
            };
            self.users.swap_remove(slot);
            if let Some(moved) = self.users.get(slot) {
                self.index.insert(moved.wallet.clone(), slot);
            }
            removed.push(wallet.clone());
        }
        tracing::debug!(whitelist = %self.id, removed = removed.len(), total = self.users.len(), "whitelist entries removed");
        Ok(removed)
    }

    /// Returns `true` if `wallet` is on the list.
    pub fn is_whitelisted(&self, wallet: &Address) -> bool {
        self.index.contains_key(wallet)
    }

    /// Number of wallets on the list.
    pub fn total_users(&self) -> usize {
        self.users.len()
    }

    /// Number of wallets in the reverse index. Always equal to
    /// [`total_users`](Self::total_users).
    pub fn users_count(&self) -> usize {
        self.index.len()
    }

    /// Wallets in `[page * per_page, page * per_page + per_page)`, clamped to
    /// the list size.
    pub fn get_users(&self, page: usize, per_page: usize) -> Vec<Address> {
        let start = page.saturating_mul(per_page).min(self.users.len());
        let end = start.saturating_add(per_page).min(self.users.len());
        self.users[start..end]
            .iter()
            .map(|entry| entry.wallet.clone())
            .collect()
    }

    /// The entry for `wallet`, if present.
    pub fn get_user(&self, wallet: &Address) -> Option<&WhitelistEntry> {
        self.index.get(wallet).map(|&slot| &self.users[slot])
    }

    /// Hands ownership of the list to `new_owner`.
    pub fn transfer_ownership(&mut self, caller: &Address, new_owner: Address) -> Result<(), LaunchpadError> {
        self.ensure_owner(caller)?;
        tracing::debug!(whitelist = %self.id, from = %self.owner, to = %new_owner, "whitelist ownership transferred");
        self.owner = new_owner;
        Ok(())
    }

    fn ensure_owner(&self, caller: &Address) -> Result<(), LaunchpadError> {
        if caller != &self.owner {
            return Err(LaunchpadError::unauthorized(caller, "whitelist owner"));
        }
        Ok(())
    }
}

fn check_batch(len: usize) -> Result<(), LaunchpadError> {
    if len > MAX_WHITELIST_BATCH {
        return Err(LaunchpadError::CapacityExceeded {
            what: "whitelist batch",
            limit: MAX_WHITELIST_BATCH as Amount,
            attempted: len as Amount,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn list() -> (Whitelist, Address) {
        let owner = Address::from("owner");
        let wl = Whitelist::new(
            WhitelistId::generate(),
            owner.clone(),
            TemplateRef::new("bifrost-whitelist", 1, 1),
        );
        (wl, owner)
    }

    fn users(n: usize) -> Vec<WhitelistEntry> {
        (0..n)
            .map(|i| WhitelistEntry::capped(Address::new(format!("user{i}")), (i as Amount + 1) * 10))
            .collect()
    }

    #[test]
    fn only_owner_edits() {
        let (mut wl, _) = list();
        let err = wl.add(&Address::from("eve"), users(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
        let err = wl.remove(&Address::from("eve"), &[Address::from("user0")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
    }

    #[test]
    fn batch_bound_is_inclusive() {
        let (mut wl, owner) = list();
        let err = wl.add(&owner, users(MAX_WHITELIST_BATCH + 1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Capacity);
        assert_eq!(wl.total_users(), 0);

        wl.add(&owner, users(MAX_WHITELIST_BATCH)).unwrap();
        assert_eq!(wl.total_users(), MAX_WHITELIST_BATCH);
    }

    #[test]
    fn readd_updates_allocation_without_duplicate() {
        let (mut wl, owner) = list();
        wl.add(&owner, vec![WhitelistEntry::capped("alice", 100)]).unwrap();
        let added = wl.add(&owner, vec![WhitelistEntry::capped("alice", 250)]).unwrap();
        assert!(added.is_empty());
        assert_eq!(wl.total_users(), 1);
        assert_eq!(wl.get_user(&Address::from("alice")).unwrap().max_allocation, Some(250));
    }

    #[test]
    fn pagination_slices_dense_set() {
        let (mut wl, owner) = list();
        wl.add(&owner, users(10)).unwrap();
        let names = |v: Vec<Address>| v.into_iter().map(|a| a.as_str().to_string()).collect::<Vec<_>>();

        assert_eq!(names(wl.get_users(1, 3)), ["user3", "user4", "user5"]);
        assert_eq!(names(wl.get_users(1, 4)), ["user4", "user5", "user6", "user7"]);
        assert_eq!(names(wl.get_users(2, 4)), ["user8", "user9"]);
        assert!(wl.get_users(5, 4).is_empty());
    }

    #[test]
    fn removal_swaps_last_into_slot() {
        let (mut wl, owner) = list();
        wl.add(&owner, users(10)).unwrap();

        // Removing an absent user a second time is a no-op.
        for _ in 0..3 {
            wl.remove(&owner, &[Address::from("user3")]).unwrap();
        }
        let page: Vec<_> = wl.get_users(1, 3).into_iter().map(|a| a.to_string()).collect();
        assert_eq!(page, ["user9", "user4", "user5"]);

        wl.remove(&owner, &[Address::from("user4")]).unwrap();
        let page: Vec<_> = wl.get_users(1, 4).into_iter().map(|a| a.to_string()).collect();
        assert_eq!(page, ["user8", "user5", "user6", "user7"]);

        assert_eq!(wl.total_users(), 8);
        assert_eq!(wl.users_count(), 8);
        assert!(wl.get_user(&Address::from("user3")).is_none());
        assert!(wl.is_whitelisted(&Address::from("user8")));
    }

    #[test]
    fn remove_reports_only_present_wallets() {
        let (mut wl, owner) = list();
        wl.add(&owner, users(2)).unwrap();
        let removed = wl
            .remove(&owner, &[Address::from("user1"), Address::from("ghost")])
            .unwrap();
        assert_eq!(removed, vec![Address::from("user1")]);
    }

    #[test]
    fn ownership_transfer() {
        let (mut wl, owner) = list();
        let sale = Address::from("bifrost-sale-x");
        wl.transfer_ownership(&owner, sale.clone()).unwrap();
        assert!(wl.add(&owner, users(1)).is_err());
        wl.add(&sale, users(1)).unwrap();
    }
}
