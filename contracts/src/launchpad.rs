//! # Launchpad
//!
//! The engine facade. It owns the settings, the router arenas, the lock
//! registry and the two external collaborators (asset ledger and liquidity
//! pool), and exposes every operation as a single all-or-nothing call.
//!
//! ## Atomicity
//!
//! Each mutating call opens a transaction on every [`Journaled`] component.
//! Components record the prior value of each entry on its first write; if
//! the call returns an error they put those entries back and the event log
//! is cut to its length before the call. Governance calls additionally
//! snapshot the settings, which only they write.
//!
//! ## Re-entrancy
//!
//! Collaborators only ever receive `&mut` access to the ledger or pool, never
//! to the engine, so no external call can re-enter a mutator mid-flight.

use serde::{Deserialize, Serialize};

use crate::config::SettingsConfig;
use crate::error::LaunchpadError;
use crate::events::LaunchpadEvent;
use crate::journal::Journaled;
use crate::ledger::{AssetIssuer, InMemoryLedger};
use crate::lock::{LockRecord, LockRegistry};
use crate::pool::{ConstantProductPool, LiquidityPool};
use crate::price_feed::PriceRate;
use crate::router::{PartnerToken, Router, SaleInfo};
use crate::sale::{FinalizeReport, Receipt, Sale, SaleParameters, Withdrawal};
use crate::settings::Settings;
use crate::types::{Address, Amount, AssetId, CallContext, LockId, SaleId, WhitelistId};
use crate::whitelist::{Whitelist, WhitelistEntry};

/// The launchpad engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Launchpad<L = InMemoryLedger, P = ConstantProductPool> {
    settings: Settings,
    router: Router,
    locks: LockRegistry,
    ledger: L,
    pool: P,
    events: Vec<LaunchpadEvent>,
}

impl<L, P> Launchpad<L, P>
where
    L: AssetIssuer + Journaled,
    P: LiquidityPool + Journaled,
{
    /// Assembles an engine from its parts.
    pub fn new(settings: Settings, ledger: L, pool: P) -> Self {
        Self {
            settings,
            router: Router::new(),
            locks: LockRegistry::new(),
            ledger,
            pool,
            events: Vec::new(),
        }
    }

    /// Builds settings from `config` and assembles an engine.
    pub fn from_config(
        admin: Address,
        treasury: Address,
        config: SettingsConfig,
        ledger: L,
        pool: P,
    ) -> Result<Self, LaunchpadError> {
        let settings = Settings::new(admin, treasury, config)?;
        Ok(Self::new(settings, ledger, pool))
    }

    // -- accessors ----------------------------------------------------------

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn locks(&self) -> &LockRegistry {
        &self.locks
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Direct ledger access, for the environment to seed balances and
    /// grant allowances. Changes made here are not transactional.
    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }

    /// Events recorded so far.
    pub fn events(&self) -> &[LaunchpadEvent] {
        &self.events
    }

    /// Drains the event log.
    pub fn take_events(&mut self) -> Vec<LaunchpadEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn sale(&self, id: SaleId) -> Result<&Sale, LaunchpadError> {
        self.router.sale(id)
    }

    pub fn whitelist(&self, id: WhitelistId) -> Result<&Whitelist, LaunchpadError> {
        self.router.whitelist(id)
    }

    pub fn lock_record(&self, id: LockId) -> Option<&LockRecord> {
        self.locks.record(id)
    }

    /// Current sale of `owner`, with its phase at `ctx.now`.
    pub fn get_sale(&self, ctx: &CallContext, owner: &Address) -> Option<SaleInfo> {
        self.router.get_sale(owner, ctx.now)
    }

    pub fn partner_token(&self, asset: &AssetId) -> PartnerToken {
        self.router.partner_token(asset)
    }

    pub fn fee_paid(&self, account: &Address) -> bool {
        self.router.fee_paid(account)
    }

    /// Listing fee in `asset` after the partner discount.
    pub fn partner_fee(&self, asset: &AssetId) -> Result<Amount, LaunchpadError> {
        self.router.partner_fee(&self.settings, asset)
    }

    // -- transactions -------------------------------------------------------

    /// Runs `op` in a transaction, undoing its writes if `op` fails.
    fn atomically<T>(
        &mut self,
        name: &'static str,
        op: impl FnOnce(&mut Self) -> Result<T, LaunchpadError>,
    ) -> Result<T, LaunchpadError> {
        let events = self.events.len();
        self.router.begin();
        self.locks.begin();
        self.ledger.begin();
        self.pool.begin();

        match op(self) {
            Ok(value) => {
                self.router.commit();
                self.locks.commit();
                self.ledger.commit();
                self.pool.commit();
                Ok(value)
            }
            Err(err) => {
                self.router.rollback();
                self.locks.rollback();
                self.ledger.rollback();
                self.pool.rollback();
                self.events.truncate(events);
                tracing::warn!(call = name, kind = ?err.kind(), error = %err, "call rolled back");
                Err(err)
            }
        }
    }

    /// [`atomically`](Self::atomically), plus a settings snapshot.
    fn governed(
        &mut self,
        name: &'static str,
        op: impl FnOnce(&mut Self) -> Result<(), LaunchpadError>,
    ) -> Result<(), LaunchpadError> {
        let snapshot = self.settings.clone();
        let result = self.atomically(name, op);
        if result.is_err() {
            self.settings = snapshot;
        }
        result
    }

    // -- governance ---------------------------------------------------------

    /// Applies an admin-gated settings change. `field` names the change in
    /// the event log.
    ///
    /// ```
    /// # use bifrost_contracts::prelude::*;
    /// # let mut lp: Launchpad = Launchpad::from_config(
    /// #     Address::from("admin"), Address::from("treasury"),
    /// #     SettingsConfig::default(), InMemoryLedger::new(), ConstantProductPool::new()).unwrap();
    /// # let ctx = CallContext::new("admin", chrono::Utc::now());
    /// lp.update_settings(&ctx, "listing_fee", |s, caller| s.set_listing_fee(caller, 42)).unwrap();
    /// assert_eq!(lp.settings().listing_fee(), 42);
    /// ```
    pub fn update_settings(
        &mut self,
        ctx: &CallContext,
        field: &str,
        update: impl FnOnce(&mut Settings, &Address) -> Result<(), LaunchpadError>,
    ) -> Result<(), LaunchpadError> {
        self.governed("update_settings", |lp| {
            update(&mut lp.settings, &ctx.caller)?;
            lp.events.push(LaunchpadEvent::SettingsUpdated {
                field: field.to_string(),
            });
            Ok(())
        })
    }

    /// Records the price of `asset` in the feed. Its decimals are read from
    /// the ledger.
    pub fn set_price(
        &mut self,
        ctx: &CallContext,
        asset: &AssetId,
        rate: Amount,
        rate_decimals: u8,
    ) -> Result<(), LaunchpadError> {
        self.governed("set_price", |lp| {
            let asset_decimals = lp.ledger.decimals(asset)?;
            lp.settings.price_feed_mut().set_rate(
                &ctx.caller,
                asset.clone(),
                PriceRate {
                    rate,
                    rate_decimals,
                    asset_decimals,
                },
            )?;
            lp.events.push(LaunchpadEvent::SettingsUpdated {
                field: format!("price:{asset}"),
            });
            Ok(())
        })
    }

    pub fn set_partner_token(
        &mut self,
        ctx: &CallContext,
        asset: AssetId,
        valid: bool,
        discount_bps: u32,
    ) -> Result<(), LaunchpadError> {
        self.atomically("set_partner_token", |lp| {
            lp.router
                .set_partner_token(&lp.settings, &ctx.caller, asset.clone(), valid, discount_bps)?;
            lp.events.push(LaunchpadEvent::PartnerTokenSet {
                asset,
                valid,
                discount_bps,
            });
            Ok(())
        })
    }

    // -- router -------------------------------------------------------------

    /// Prepays the listing fee in a partner asset. Returns the amount charged.
    pub fn pay_fee(&mut self, ctx: &CallContext, asset: &AssetId) -> Result<Amount, LaunchpadError> {
        self.atomically("pay_fee", |lp| {
            let Launchpad { settings, router, ledger, events, .. } = lp;
            let amount = router.pay_fee(ledger, settings, ctx, asset)?;
            events.push(LaunchpadEvent::FeePaid {
                payer: ctx.caller.clone(),
                asset: asset.clone(),
                amount,
            });
            Ok(amount)
        })
    }

    /// Creates a sale owned by the caller. `fee_payment` is the native value
    /// attached to the call.
    pub fn create_sale(
        &mut self,
        ctx: &CallContext,
        sale_asset: AssetId,
        fund_asset: AssetId,
        params: SaleParameters,
        fee_payment: Amount,
    ) -> Result<SaleId, LaunchpadError> {
        self.atomically("create_sale", |lp| {
            let Launchpad { settings, router, ledger, events, .. } = lp;
            let id = router.create_sale(
                ledger,
                settings,
                ctx,
                sale_asset,
                fund_asset,
                params,
                fee_payment,
            )?;
            if fee_payment > 0 {
                events.push(LaunchpadEvent::FeePaid {
                    payer: ctx.caller.clone(),
                    asset: AssetId::native(),
                    amount: fee_payment,
                });
            }
            let sale = router.sale(id)?;
            events.push(LaunchpadEvent::SaleCreated {
                sale: id,
                owner: sale.owner.clone(),
                sale_asset: sale.sale_asset.clone(),
                fund_asset: sale.fund_asset.clone(),
                total_tokens: sale.total_tokens(),
                whitelist: sale.whitelist(),
            });
            Ok(id)
        })
    }

    // -- standalone whitelists ----------------------------------------------

    /// Creates an empty whitelist owned by the caller.
    pub fn create_whitelist(&mut self, ctx: &CallContext) -> Result<WhitelistId, LaunchpadError> {
        self.atomically("create_whitelist", |lp| {
            let id = lp.router.create_whitelist(&lp.settings, ctx.caller.clone());
            lp.events.push(LaunchpadEvent::WhitelistCreated {
                whitelist: id,
                owner: ctx.caller.clone(),
            });
            Ok(id)
        })
    }

    /// Adds entries to a whitelist the caller owns.
    pub fn whitelist_add(
        &mut self,
        ctx: &CallContext,
        id: WhitelistId,
        entries: Vec<WhitelistEntry>,
    ) -> Result<Vec<Address>, LaunchpadError> {
        self.atomically("whitelist_add", |lp| {
            let added = lp.router.whitelist_mut(id)?.add(&ctx.caller, entries)?;
            lp.record_whitelist_changes(ctx, id, true, &added);
            Ok(added)
        })
    }

    /// Removes wallets from a whitelist the caller owns.
    pub fn whitelist_remove(
        &mut self,
        ctx: &CallContext,
        id: WhitelistId,
        wallets: &[Address],
    ) -> Result<Vec<Address>, LaunchpadError> {
        self.atomically("whitelist_remove", |lp| {
            let removed = lp.router.whitelist_mut(id)?.remove(&ctx.caller, wallets)?;
            lp.record_whitelist_changes(ctx, id, false, &removed);
            Ok(removed)
        })
    }

    /// Hands a whitelist to a new owner, typically a sale's escrow account.
    pub fn transfer_whitelist(
        &mut self,
        ctx: &CallContext,
        id: WhitelistId,
        new_owner: Address,
    ) -> Result<(), LaunchpadError> {
        self.atomically("transfer_whitelist", |lp| {
            lp.router
                .whitelist_mut(id)?
                .transfer_ownership(&ctx.caller, new_owner)
        })
    }

    fn record_whitelist_changes(
        &mut self,
        ctx: &CallContext,
        id: WhitelistId,
        added: bool,
        users: &[Address],
    ) {
        self.events
            .extend(users.iter().map(|user| LaunchpadEvent::WhitelistUpdated {
                whitelist: id,
                added,
                user: user.clone(),
                timestamp: ctx.now,
            }));
    }

    // -- sale ---------------------------------------------------------------

    /// Contributes `amount` of the funding asset. Returns the credited amount.
    pub fn deposit(&mut self, ctx: &CallContext, sale: SaleId, amount: Amount) -> Result<Amount, LaunchpadError> {
        self.atomically("deposit", |lp| {
            let Launchpad { router, ledger, events, .. } = lp;
            let (record, whitelist) = router.sale_with_whitelist(sale)?;
            let credited = record.deposit(ledger, whitelist, ctx, amount)?;
            events.push(LaunchpadEvent::Deposited {
                sale,
                contributor: ctx.caller.clone(),
                amount: credited,
            });
            Ok(credited)
        })
    }

    /// Native value sent straight to a sale.
    pub fn receive(&mut self, ctx: &CallContext, sale: SaleId, amount: Amount) -> Result<Receipt, LaunchpadError> {
        self.atomically("receive", |lp| {
            let Launchpad { settings, router, ledger, events, .. } = lp;
            let (record, whitelist) = router.sale_with_whitelist(sale)?;
            let receipt = record.receive(ledger, whitelist, settings.router(), ctx, amount)?;
            events.push(match receipt {
                Receipt::Forwarded(amount) => LaunchpadEvent::Forwarded {
                    sale,
                    from: ctx.caller.clone(),
                    amount,
                },
                Receipt::Deposited(amount) => LaunchpadEvent::Deposited {
                    sale,
                    contributor: ctx.caller.clone(),
                    amount,
                },
            });
            Ok(receipt)
        })
    }

    /// Claims tokens after finalize, or a refund from a canceled or failed sale.
    pub fn withdraw(&mut self, ctx: &CallContext, sale: SaleId) -> Result<Withdrawal, LaunchpadError> {
        self.atomically("withdraw", |lp| {
            let Launchpad { router, ledger, events, .. } = lp;
            let outcome = router.sale_mut(sale)?.withdraw(ledger, ctx)?;
            let contributor = ctx.caller.clone();
            events.push(match outcome {
                Withdrawal::Claimed(tokens) => LaunchpadEvent::Withdrawn { sale, contributor, tokens },
                Withdrawal::Refunded(amount) => LaunchpadEvent::Refunded { sale, contributor, amount },
            });
            Ok(outcome)
        })
    }

    /// Leaves a running sale, paying the early-withdraw penalty.
    /// Returns `(refund, penalty)`.
    pub fn emergency_withdraw(&mut self, ctx: &CallContext, sale: SaleId) -> Result<(Amount, Amount), LaunchpadError> {
        self.atomically("emergency_withdraw", |lp| {
            let Launchpad { settings, router, ledger, events, .. } = lp;
            let (refund, penalty) = router.sale_mut(sale)?.emergency_withdraw(
                ledger,
                settings.treasury(),
                settings.early_withdraw_penalty_bps(),
                ctx,
            )?;
            events.push(LaunchpadEvent::EmergencyWithdrawn {
                sale,
                contributor: ctx.caller.clone(),
                refund,
                penalty,
            });
            Ok((refund, penalty))
        })
    }

    /// Returns the escrowed tokens of a canceled or failed sale to its owner.
    pub fn reclaim_tokens(&mut self, ctx: &CallContext, sale: SaleId) -> Result<Amount, LaunchpadError> {
        self.atomically("reclaim_tokens", |lp| {
            let Launchpad { router, ledger, events, .. } = lp;
            let amount = router.sale_mut(sale)?.reclaim_tokens(ledger, ctx)?;
            events.push(LaunchpadEvent::TokensReclaimed { sale, amount });
            Ok(amount)
        })
    }

    pub fn cancel(&mut self, ctx: &CallContext, sale: SaleId) -> Result<(), LaunchpadError> {
        self.atomically("cancel", |lp| {
            lp.router.sale_mut(sale)?.cancel(ctx)?;
            lp.events.push(LaunchpadEvent::Canceled { sale });
            Ok(())
        })
    }

    /// Adds entries to the sale's whitelist. Owner only, before start.
    pub fn add_to_whitelist(
        &mut self,
        ctx: &CallContext,
        sale: SaleId,
        entries: Vec<WhitelistEntry>,
    ) -> Result<Vec<Address>, LaunchpadError> {
        self.atomically("add_to_whitelist", |lp| {
            let record = lp.router.sale(sale)?;
            let id = record.authorize_whitelist_edit(ctx, true)?;
            let escrow = record.escrow();
            let added = lp.router.whitelist_mut(id)?.add(&escrow, entries)?;
            lp.record_whitelist_changes(ctx, id, true, &added);
            Ok(added)
        })
    }

    /// Removes wallets from the sale's whitelist. Owner only, before start.
    pub fn remove_from_whitelist(
        &mut self,
        ctx: &CallContext,
        sale: SaleId,
        wallets: &[Address],
    ) -> Result<Vec<Address>, LaunchpadError> {
        self.atomically("remove_from_whitelist", |lp| {
            let record = lp.router.sale(sale)?;
            let id = record.authorize_whitelist_edit(ctx, false)?;
            let escrow = record.escrow();
            let removed = lp.router.whitelist_mut(id)?.remove(&escrow, wallets)?;
            lp.record_whitelist_changes(ctx, id, false, &removed);
            Ok(removed)
        })
    }

    /// Attaches a whitelist already owned by the sale's escrow account.
    pub fn set_whitelist(&mut self, ctx: &CallContext, sale: SaleId, whitelist: WhitelistId) -> Result<(), LaunchpadError> {
        self.atomically("set_whitelist", |lp| {
            let list = lp.router.whitelist(whitelist)?.clone();
            lp.router.sale_mut(sale)?.set_whitelist(ctx, &list)?;
            lp.events.push(LaunchpadEvent::WhitelistAttached { sale, whitelist });
            Ok(())
        })
    }

    /// Distributes the proceeds of a successful sale and locks its liquidity.
    pub fn finalize(&mut self, ctx: &CallContext, sale: SaleId) -> Result<FinalizeReport, LaunchpadError> {
        self.atomically("finalize", |lp| {
            let Launchpad { settings, router, locks, ledger, pool, events } = lp;
            let report = router
                .sale_mut(sale)?
                .finalize(ledger, pool, locks, settings, ctx)?;
            let record = locks
                .record(report.lock_id)
                .ok_or_else(|| LaunchpadError::NotFound(format!("{}", report.lock_id)))?;
            events.push(LaunchpadEvent::Locked {
                lock: record.id,
                asset: record.asset.clone(),
                amount: record.amount,
                beneficiary: record.beneficiary.clone(),
                unlock_at: record.unlock_at,
            });
            events.push(LaunchpadEvent::Finalized {
                sale,
                report: report.clone(),
            });
            Ok(report)
        })
    }

    /// Returns the locked pool shares to the owner after expiry.
    pub fn withdraw_liquidity(&mut self, ctx: &CallContext, sale: SaleId) -> Result<Amount, LaunchpadError> {
        self.atomically("withdraw_liquidity", |lp| {
            let Launchpad { router, locks, ledger, events, .. } = lp;
            let record = router.sale_mut(sale)?;
            let amount = record.withdraw_liquidity(ledger, locks, ctx)?;
            let lock = record
                .lock_id()
                .ok_or_else(|| LaunchpadError::NotFound(format!("lock of sale {sale}")))?;
            events.push(LaunchpadEvent::Unlocked {
                lock,
                beneficiary: ctx.caller.clone(),
                amount,
            });
            events.push(LaunchpadEvent::LiquidityWithdrawn { sale, lock, amount });
            Ok(amount)
        })
    }

    // -- lock registry ------------------------------------------------------

    /// Locks `amount` of `asset` from the caller for `period_secs`, with the
    /// caller as beneficiary. The caller must have approved the registry.
    pub fn lock(
        &mut self,
        ctx: &CallContext,
        asset: &AssetId,
        amount: Amount,
        period_secs: u64,
    ) -> Result<LockId, LaunchpadError> {
        self.atomically("lock", |lp| {
            let Launchpad { locks, ledger, events, .. } = lp;
            let id = locks.lock(ledger, &ctx.caller, &ctx.caller, asset, amount, period_secs, ctx.now)?;
            let record = locks
                .record(id)
                .ok_or_else(|| LaunchpadError::NotFound(format!("{id}")))?;
            events.push(LaunchpadEvent::Locked {
                lock: id,
                asset: asset.clone(),
                amount: record.amount,
                beneficiary: ctx.caller.clone(),
                unlock_at: record.unlock_at,
            });
            Ok(id)
        })
    }

    /// Releases an expired lock to its certificate holder.
    pub fn unlock(&mut self, ctx: &CallContext, id: LockId) -> Result<Amount, LaunchpadError> {
        self.atomically("unlock", |lp| {
            let Launchpad { locks, ledger, events, .. } = lp;
            let amount = locks.unlock(ledger, &ctx.caller, id, ctx.now)?;
            events.push(LaunchpadEvent::Unlocked {
                lock: id,
                beneficiary: ctx.caller.clone(),
                amount,
            });
            Ok(amount)
        })
    }

    /// Hands a lock certificate to `to`.
    pub fn transfer_lock(&mut self, ctx: &CallContext, id: LockId, to: Address) -> Result<(), LaunchpadError> {
        self.atomically("transfer_lock", |lp| {
            lp.locks.transfer_certificate(&ctx.caller, id, &to)?;
            lp.events.push(LaunchpadEvent::LockTransferred {
                lock: id,
                from: ctx.caller.clone(),
                to,
            });
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::ledger::AssetLedger;

    #[test]
    fn failed_call_leaves_no_trace() {
        let mut lp: Launchpad = Launchpad::from_config(
            Address::from("admin"),
            Address::from("treasury"),
            SettingsConfig::default(),
            InMemoryLedger::new(),
            ConstantProductPool::new(),
        )
        .unwrap();
        let admin = CallContext::new("admin", chrono::Utc::now());
        lp.update_settings(&admin, "listing_fee", |s, caller| s.set_listing_fee(caller, 5))
            .unwrap();
        assert_eq!(lp.events().len(), 1);

        let eve = admin.with_caller(&Address::from("eve"));
        let err = lp
            .update_settings(&eve, "listing_fee", |s, caller| s.set_listing_fee(caller, 0))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert_eq!(lp.settings().listing_fee(), 5);
        assert_eq!(lp.events().len(), 1);

        let err = lp
            .update_settings(&admin, "fees", |s, caller| {
                s.set_listing_fee(caller, 7)?;
                s.set_launching_fee_bps(caller, 20_000)
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(lp.settings().listing_fee(), 5);
    }

    #[test]
    fn failed_creation_refunds_the_listing_fee() {
        let mut lp: Launchpad = Launchpad::from_config(
            Address::from("admin"),
            Address::from("treasury"),
            SettingsConfig::default(),
            InMemoryLedger::new(),
            ConstantProductPool::new(),
        )
        .unwrap();
        let now = chrono::Utc::now();
        let owner = Address::from("owner");
        let token = AssetId::from("TKN");
        let native = AssetId::native();
        let fee = lp.settings().listing_fee();
        let router = lp.settings().router().clone();
        lp.ledger_mut().create_asset(&token, 18, &owner).unwrap();
        lp.ledger_mut().mint(&token, &owner, &owner, 10u128.pow(24)).unwrap();
        lp.ledger_mut().credit(&native, &owner, fee).unwrap();

        let params = SaleParameters {
            soft_cap: 50 * 10u128.pow(18),
            hard_cap: 100 * 10u128.pow(18),
            min_contribution: 10u128.pow(17),
            max_contribution: 100 * 10u128.pow(18),
            presale_rate: 100 * crate::config::RATE_SCALE,
            listing_rate: 80 * crate::config::RATE_SCALE,
            liquidity_bps: 6_000,
            start: now + chrono::Duration::hours(1),
            end: now + chrono::Duration::days(1),
            unlock_secs: 86_400,
            whitelisted: true,
        };
        let ctx = CallContext::new(owner.clone(), now);

        // The fee reaches the treasury before the allocation pull fails.
        let err = lp
            .create_sale(&ctx, token.clone(), native.clone(), params.clone(), fee)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Collaborator);
        assert_eq!(lp.ledger().balance_of(&native, &owner), fee);
        assert_eq!(lp.ledger().balance_of(&native, &Address::from("treasury")), 0);
        assert_eq!(lp.router().sale_count(), 0);
        assert!(lp.get_sale(&ctx, &owner).is_none());
        assert!(lp.events().is_empty());

        lp.ledger_mut().approve(&token, &owner, &router, Amount::MAX).unwrap();
        let id = lp.create_sale(&ctx, token, native.clone(), params, fee).unwrap();
        assert!(lp.sale(id).unwrap().whitelist().is_some());
        assert_eq!(lp.ledger().balance_of(&native, &Address::from("treasury")), fee);
        assert_eq!(lp.router().sale_count(), 1);
    }

    #[test]
    fn lock_roundtrip_through_facade() {
        let mut lp: Launchpad = Launchpad::from_config(
            Address::from("admin"),
            Address::from("treasury"),
            SettingsConfig::default(),
            InMemoryLedger::new(),
            ConstantProductPool::new(),
        )
        .unwrap();
        let now = chrono::Utc::now();
        let alice = Address::from("alice");
        let native = AssetId::native();
        lp.ledger_mut().credit(&native, &alice, 1_000).unwrap();
        lp.ledger_mut()
            .approve(&native, &alice, &LockRegistry::account(), 1_000)
            .unwrap();

        let ctx = CallContext::new(alice.clone(), now);
        let id = lp.lock(&ctx, &native, 400, 60).unwrap();
        assert_eq!(lp.ledger().balance_of(&native, &alice), 600);

        let later = CallContext::new(alice.clone(), now + chrono::Duration::seconds(60));
        assert_eq!(lp.unlock(&later, id).unwrap(), 400);
        assert_eq!(lp.ledger().balance_of(&native, &alice), 1_000);
        assert!(lp.unlock(&later, id).is_err());
    }
}
