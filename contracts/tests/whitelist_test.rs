//! Integration tests for whitelisted sales.
//!
//! A whitelisted sale only accepts deposits from listed wallets, each within
//! its own allocation. The list is editable by the sale owner until the sale
//! starts, and a standalone list can be handed to a sale before it starts.

mod common;

use bifrost_contracts::prelude::*;
use common::{assert_kind, params, World, OWNER, UNIT};

fn whitelisted_sale(w: &mut World) -> SaleId {
    let mut p = params(w.genesis);
    p.whitelisted = true;
    w.create_sale(p)
}

// ---------------------------------------------------------------------------
// Membership and allocations
// ---------------------------------------------------------------------------

#[test]
fn sale_creates_list_owned_by_escrow() {
    let mut w = World::new();
    let sale = whitelisted_sale(&mut w);
    let record = w.lp.sale(sale).unwrap();
    let list = w.lp.whitelist(record.whitelist().unwrap()).unwrap();
    assert_eq!(list.owner, record.escrow());
    assert_eq!(list.total_users(), 0);
    assert!(record.params().whitelisted);
}

#[test]
fn only_listed_wallets_may_deposit_within_allocation() {
    let mut w = World::new();
    let sale = whitelisted_sale(&mut w);
    let added = w
        .lp
        .add_to_whitelist(
            &w.at(OWNER, 60),
            sale,
            vec![WhitelistEntry::capped("alice", 10 * UNIT), WhitelistEntry::uncapped("bob")],
        )
        .unwrap();
    assert_eq!(added, vec![Address::from("alice"), Address::from("bob")]);

    assert_kind(
        w.lp.deposit(&w.after_start(sale, "carol", 0), sale, UNIT),
        ErrorKind::Authorization,
    );

    w.lp.deposit(&w.after_start(sale, "alice", 0), sale, 10 * UNIT).unwrap();
    assert_kind(
        w.lp.deposit(&w.after_start(sale, "alice", 1), sale, UNIT / 10),
        ErrorKind::Capacity,
    );
    w.lp.deposit(&w.after_start(sale, "bob", 2), sale, 60 * UNIT).unwrap();
    assert_eq!(w.lp.sale(sale).unwrap().raised(), 70 * UNIT);
}

#[test]
fn allocation_overflow_is_rejected_whole() {
    let mut w = World::new();
    let mut p = params(w.genesis);
    p.whitelisted = true;
    p.soft_cap = 100 * UNIT;
    p.hard_cap = 200 * UNIT;
    p.max_contribution = 150 * UNIT;
    let sale = w.create_sale(p);
    w.lp.add_to_whitelist(&w.at(OWNER, 60), sale, vec![WhitelistEntry::capped("alice", 100 * UNIT)])
        .unwrap();

    w.lp.deposit(&w.after_start(sale, "alice", 0), sale, 60 * UNIT).unwrap();
    let balance = w.native("alice");
    assert_kind(
        w.lp.deposit(&w.after_start(sale, "alice", 1), sale, 41 * UNIT),
        ErrorKind::Capacity,
    );
    assert_eq!(w.native("alice"), balance);
    assert_eq!(w.lp.sale(sale).unwrap().deposited(&Address::from("alice")), 60 * UNIT);

    w.lp.deposit(&w.after_start(sale, "alice", 2), sale, 40 * UNIT).unwrap();
    assert_eq!(w.lp.sale(sale).unwrap().raised(), 100 * UNIT);
}

#[test]
fn readding_updates_allocation_without_duplicating() {
    let mut w = World::new();
    let sale = whitelisted_sale(&mut w);
    let owner = w.at(OWNER, 60);
    w.lp.add_to_whitelist(&owner, sale, vec![WhitelistEntry::capped("alice", UNIT)]).unwrap();
    let added = w
        .lp
        .add_to_whitelist(&owner, sale, vec![WhitelistEntry::capped("alice", 20 * UNIT)])
        .unwrap();
    assert!(added.is_empty());

    let list = w.lp.whitelist(w.lp.sale(sale).unwrap().whitelist().unwrap()).unwrap();
    assert_eq!(list.total_users(), 1);
    assert_eq!(list.get_user(&Address::from("alice")).unwrap().max_allocation, Some(20 * UNIT));

    w.lp.deposit(&w.after_start(sale, "alice", 0), sale, 15 * UNIT).unwrap();
}

#[test]
fn removed_wallet_can_no_longer_deposit() {
    let mut w = World::new();
    let sale = whitelisted_sale(&mut w);
    let owner = w.at(OWNER, 60);
    w.lp.add_to_whitelist(&owner, sale, vec![WhitelistEntry::uncapped("alice")]).unwrap();
    let removed = w
        .lp
        .remove_from_whitelist(&owner, sale, &[Address::from("alice"), Address::from("nobody")])
        .unwrap();
    assert_eq!(removed, vec![Address::from("alice")]);

    assert_kind(
        w.lp.deposit(&w.after_start(sale, "alice", 0), sale, UNIT),
        ErrorKind::Authorization,
    );
}

// ---------------------------------------------------------------------------
// Edit window
// ---------------------------------------------------------------------------

#[test]
fn edits_close_when_the_sale_starts() {
    let mut w = World::new();
    let sale = whitelisted_sale(&mut w);
    let entry = || vec![WhitelistEntry::uncapped("alice")];

    assert_kind(
        w.lp.add_to_whitelist(&w.at("alice", 60), sale, entry()),
        ErrorKind::Authorization,
    );
    assert_kind(
        w.lp.add_to_whitelist(&w.after_start(sale, OWNER, 0), sale, entry()),
        ErrorKind::State,
    );
    assert_kind(
        w.lp.remove_from_whitelist(&w.after_start(sale, OWNER, 0), sale, &[Address::from("alice")]),
        ErrorKind::State,
    );
    assert_kind(
        w.lp.add_to_whitelist(&w.after_end(sale, OWNER, 0), sale, entry()),
        ErrorKind::State,
    );

    w.lp.add_to_whitelist(&w.after_start(sale, OWNER, -1), sale, entry()).unwrap();
}

#[test]
fn batches_are_bounded() {
    let mut w = World::new();
    let sale = whitelisted_sale(&mut w);
    let batch = |n: usize| -> Vec<WhitelistEntry> {
        (0..n)
            .map(|i| WhitelistEntry::uncapped(Address::new(format!("wallet-{i}"))))
            .collect()
    };

    assert_kind(
        w.lp.add_to_whitelist(&w.at(OWNER, 60), sale, batch(51)),
        ErrorKind::Capacity,
    );
    w.lp.add_to_whitelist(&w.at(OWNER, 60), sale, batch(50)).unwrap();

    let list = w.lp.whitelist(w.lp.sale(sale).unwrap().whitelist().unwrap()).unwrap();
    assert_eq!(list.total_users(), 50);
    assert_eq!(list.get_users(0, 20).len(), 20);
    assert_eq!(list.get_users(2, 20).len(), 10);
    assert!(list.get_users(3, 20).is_empty());
    assert_eq!(list.get_users(0, 1), vec![Address::from("wallet-0")]);
}

#[test]
fn edits_emit_one_event_per_user() {
    let mut w = World::new();
    let sale = whitelisted_sale(&mut w);
    w.lp.take_events();

    let owner = w.at(OWNER, 90);
    w.lp.add_to_whitelist(
        &owner,
        sale,
        vec![WhitelistEntry::uncapped("alice"), WhitelistEntry::uncapped("bob")],
    )
    .unwrap();
    w.lp.remove_from_whitelist(&owner, sale, &[Address::from("bob")]).unwrap();

    let updates: Vec<(bool, Address)> = w
        .lp
        .events()
        .iter()
        .filter_map(|e| match e {
            LaunchpadEvent::WhitelistUpdated { added, user, timestamp, .. } => {
                assert_eq!(*timestamp, owner.now);
                Some((*added, user.clone()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        updates,
        vec![
            (true, Address::from("alice")),
            (true, Address::from("bob")),
            (false, Address::from("bob")),
        ]
    );
}

// ---------------------------------------------------------------------------
// Standalone lists
// ---------------------------------------------------------------------------

#[test]
fn standalone_list_can_be_attached_before_start() {
    let mut w = World::new();
    let sale = whitelisted_sale(&mut w);
    let escrow = w.lp.sale(sale).unwrap().escrow();

    let owner = w.at(OWNER, 60);
    let list = w.lp.create_whitelist(&owner).unwrap();
    w.lp.whitelist_add(&owner, list, vec![WhitelistEntry::capped("carol", 5 * UNIT)]).unwrap();
    assert_kind(
        w.lp.whitelist_add(&w.at("alice", 60), list, vec![WhitelistEntry::uncapped("alice")]),
        ErrorKind::Authorization,
    );

    // Still owned by the project owner, not the escrow.
    assert_kind(w.lp.set_whitelist(&owner, sale, list), ErrorKind::Validation);

    w.lp.transfer_whitelist(&owner, list, escrow).unwrap();
    w.lp.set_whitelist(&owner, sale, list).unwrap();
    assert_eq!(w.lp.sale(sale).unwrap().whitelist(), Some(list));
    assert!(w
        .lp
        .events()
        .contains(&LaunchpadEvent::WhitelistAttached { sale, whitelist: list }));

    w.lp.deposit(&w.after_start(sale, "carol", 0), sale, 5 * UNIT).unwrap();
    assert_kind(
        w.lp.deposit(&w.after_start(sale, "alice", 0), sale, UNIT),
        ErrorKind::Authorization,
    );
}

#[test]
fn list_cannot_be_attached_to_open_sale() {
    let mut w = World::new();
    let sale = w.create_sale(params(w.genesis));
    let escrow = w.lp.sale(sale).unwrap().escrow();

    let owner = w.at(OWNER, 60);
    let list = w.lp.create_whitelist(&owner).unwrap();
    w.lp.transfer_whitelist(&owner, list, escrow).unwrap();
    assert_kind(w.lp.set_whitelist(&owner, sale, list), ErrorKind::State);

    // Open sales accept anyone.
    w.lp.deposit(&w.after_start(sale, "carol", 0), sale, UNIT).unwrap();
}

#[test]
fn list_cannot_be_swapped_after_start() {
    let mut w = World::new();
    let sale = whitelisted_sale(&mut w);
    let escrow = w.lp.sale(sale).unwrap().escrow();

    let owner = w.at(OWNER, 60);
    let list = w.lp.create_whitelist(&owner).unwrap();
    w.lp.transfer_whitelist(&owner, list, escrow).unwrap();
    assert_kind(
        w.lp.set_whitelist(&w.after_start(sale, OWNER, 0), sale, list),
        ErrorKind::State,
    );
}
