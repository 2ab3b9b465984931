//! # Router
//!
//! Factory and fee gate. The router validates sale terms against
//! [`Settings`], collects the listing fee, pulls the token allocation into
//! the new sale's escrow, and keeps the arenas every sale and whitelist
//! record lives in.
//!
//! ## Fees
//!
//! A sale creation is paid for exactly once, in one of two ways:
//!
//! - the flat listing fee attached in native value to `create_sale`, which is
//!   forwarded to the treasury in the same call; or
//! - a prior [`Router::pay_fee`] in a partner asset at a discount, which sets a
//!   single-use flag consumed by the next `create_sale` of the same caller.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{check_bps, BPS_DENOMINATOR};
use crate::error::LaunchpadError;
use crate::journal::{Journaled, UndoLog};
use crate::ledger::AssetLedger;
use crate::math::mul_div;
use crate::sale::{Phase, Sale, SaleParameters};
use crate::settings::Settings;
use crate::types::{Address, Amount, AssetId, CallContext, SaleId, WhitelistId};
use crate::whitelist::Whitelist;

/// Partner-asset entry of the fee table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PartnerToken {
    /// Whether the asset is currently accepted for fee payment.
    pub valid: bool,
    /// Discount on the converted listing fee, in bps.
    pub discount_bps: u32,
}

/// Summary of an owner's current sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleInfo {
    pub owner: Address,
    pub sale_asset: AssetId,
    pub fund_asset: AssetId,
    pub sale: SaleId,
    pub escrow: Address,
    pub phase: Phase,
    pub raised: Amount,
    pub total_tokens: Amount,
}

#[derive(Debug, Clone, Default)]
struct RouterJournal {
    sales: UndoLog<SaleId, Sale>,
    whitelists: UndoLog<WhitelistId, Whitelist>,
    owners: UndoLog<Address, SaleId>,
    partner_tokens: UndoLog<AssetId, PartnerToken>,
    fee_paid: UndoLog<Address, ()>,
}

/// Sale factory, fee gate and record arenas.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Router {
    sales: HashMap<SaleId, Sale>,
    whitelists: HashMap<WhitelistId, Whitelist>,
    /// Most recent sale of each owner.
    owners: HashMap<Address, SaleId>,
    partner_tokens: BTreeMap<AssetId, PartnerToken>,
    fee_paid: HashSet<Address>,
    #[serde(skip)]
    journal: RouterJournal,
}

impl Journaled for Router {
    fn begin(&mut self) {
        self.journal.sales.begin();
        self.journal.whitelists.begin();
        self.journal.owners.begin();
        self.journal.partner_tokens.begin();
        self.journal.fee_paid.begin();
    }

    fn commit(&mut self) {
        self.journal.sales.commit();
        self.journal.whitelists.commit();
        self.journal.owners.commit();
        self.journal.partner_tokens.commit();
        self.journal.fee_paid.commit();
    }

    fn rollback(&mut self) {
        self.journal.sales.rollback_into(&mut self.sales);
        self.journal.whitelists.rollback_into(&mut self.whitelists);
        self.journal.owners.rollback_into(&mut self.owners);
        self.journal.partner_tokens.rollback_into(&mut self.partner_tokens);
        self.journal.fee_paid.rollback_into(&mut self.fee_paid);
    }
}

impl Router {
    /// Creates a router with empty arenas.
    pub fn new() -> Self {
        Self::default()
    }

    // -- fee gate -----------------------------------------------------------

    /// Inserts or replaces the partner entry for `asset`. Admin only.
    pub fn set_partner_token(
        &mut self,
        settings: &Settings,
        caller: &Address,
        asset: AssetId,
        valid: bool,
        discount_bps: u32,
    ) -> Result<(), LaunchpadError> {
        settings.ensure_admin(caller)?;
        check_bps("discount_bps", discount_bps)?;
        tracing::info!(%asset, valid, discount_bps, "partner token set");
        let prior = self.partner_tokens.get(&asset).copied();
        self.journal.partner_tokens.record(&asset, || prior);
        self.partner_tokens
            .insert(asset, PartnerToken { valid, discount_bps });
        Ok(())
    }

    /// Partner entry for `asset`; a default (invalid) entry if none exists.
    pub fn partner_token(&self, asset: &AssetId) -> PartnerToken {
        self.partner_tokens.get(asset).copied().unwrap_or_default()
    }

    /// Whether `account` holds an unconsumed prepaid fee.
    pub fn fee_paid(&self, account: &Address) -> bool {
        self.fee_paid.contains(account)
    }

    /// Listing fee in `asset` after the partner discount.
    pub fn partner_fee(&self, settings: &Settings, asset: &AssetId) -> Result<Amount, LaunchpadError> {
        let partner = self.partner_token(asset);
        if !partner.valid {
            return Err(LaunchpadError::Validation(format!("{asset} is not a partner token")));
        }
        let quoted = settings.listing_fee_in_token(asset)?;
        let keep = BPS_DENOMINATOR - Amount::from(partner.discount_bps);
        Ok(mul_div(quoted, keep, BPS_DENOMINATOR)?)
    }

    /// Pays the listing fee in a partner asset, at its discount, from the
    /// caller to the treasury. The caller must have approved the router.
    /// Returns the amount charged.
    pub fn pay_fee<L: AssetLedger>(
        &mut self,
        ledger: &mut L,
        settings: &Settings,
        ctx: &CallContext,
        asset: &AssetId,
    ) -> Result<Amount, LaunchpadError> {
        let cost = self.partner_fee(settings, asset)?;
        if self.fee_paid.contains(&ctx.caller) {
            return Err(LaunchpadError::InvalidState(format!(
                "{} already holds an unused fee payment",
                ctx.caller
            )));
        }

        self.journal.fee_paid.record(&ctx.caller, || None);
        self.fee_paid.insert(ctx.caller.clone());
        ledger.transfer_from(asset, settings.router(), &ctx.caller, settings.treasury(), cost)?;

        tracing::info!(payer = %ctx.caller, %asset, cost, "listing fee paid in partner token");
        Ok(cost)
    }

    // -- factory ------------------------------------------------------------

    /// Creates a sale owned by the caller.
    ///
    /// `fee_payment` is the native value attached to the call. It must equal
    /// the listing fee unless the caller prepaid with [`pay_fee`](Self::pay_fee),
    /// in which case it must be zero. The sale's `total_tokens` are pulled
    /// from the caller into escrow against an allowance granted to the router.
    #[allow(clippy::too_many_arguments)]
    pub fn create_sale<L: AssetLedger>(
        &mut self,
        ledger: &mut L,
        settings: &Settings,
        ctx: &CallContext,
        sale_asset: AssetId,
        fund_asset: AssetId,
        params: SaleParameters,
        fee_payment: Amount,
    ) -> Result<SaleId, LaunchpadError> {
        let owner = &ctx.caller;

        if let Some(current) = self.owners.get(owner).and_then(|id| self.sales.get(id)) {
            let phase = current.phase(ctx.now);
            if !phase.is_terminal() {
                return Err(LaunchpadError::sale_state(
                    phase,
                    format!("{owner} already has an active sale"),
                ));
            }
        }
        if sale_asset == fund_asset {
            return Err(LaunchpadError::Validation("sale and funding asset must differ".into()));
        }
        if sale_asset.is_native() {
            return Err(LaunchpadError::Validation("the native asset cannot be sold".into()));
        }
        params.validate(settings, ctx.now)?;

        let prepaid = self.fee_paid.contains(owner);
        if prepaid && fee_payment != 0 {
            return Err(LaunchpadError::Validation(
                "listing fee already prepaid; attach no value".into(),
            ));
        }
        if !prepaid && fee_payment != settings.listing_fee() {
            return Err(LaunchpadError::Validation(format!(
                "listing fee is {}, attached {fee_payment}",
                settings.listing_fee()
            )));
        }

        let sale_decimals = ledger.decimals(&sale_asset)?;
        let fund_decimals = ledger.decimals(&fund_asset)?;
        let id = SaleId::generate();
        let mut sale = Sale::new(
            id,
            owner.clone(),
            sale_asset.clone(),
            fund_asset,
            sale_decimals,
            fund_decimals,
            params,
            settings.launching_fee_bps(),
            settings.sale_template().clone(),
            ctx.now,
        )?;
        let total_tokens = sale.total_tokens();
        let escrow = sale.escrow();

        // Effects.
        if sale.params().whitelisted {
            let whitelist = self.create_whitelist(settings, escrow.clone());
            sale.attach_whitelist(whitelist);
        }
        if prepaid {
            self.journal.fee_paid.record(owner, || Some(()));
            self.fee_paid.remove(owner);
        }
        let previous = self.owners.get(owner).copied();
        self.journal.owners.record(owner, || previous);
        self.owners.insert(owner.clone(), id);
        self.journal.sales.record(&id, || None);
        self.sales.insert(id, sale);

        // Interactions.
        if !prepaid {
            ledger.transfer(&AssetId::native(), owner, settings.treasury(), fee_payment)?;
        }
        let before = ledger.balance_of(&sale_asset, &escrow);
        ledger.transfer_from(&sale_asset, settings.router(), owner, &escrow, total_tokens)?;
        let received = ledger.balance_of(&sale_asset, &escrow).saturating_sub(before);
        if received < total_tokens {
            return Err(LaunchpadError::Arithmetic(format!(
                "escrow received {received} of {total_tokens} {sale_asset}; exclude the sale from transfer fees"
            )));
        }

        tracing::info!(sale = %id, %owner, %sale_asset, total_tokens, prepaid, "sale created");
        Ok(id)
    }

    /// Creates an empty whitelist owned by `owner`.
    pub fn create_whitelist(&mut self, settings: &Settings, owner: Address) -> WhitelistId {
        let id = WhitelistId::generate();
        let whitelist = Whitelist::new(id, owner, settings.whitelist_template().clone());
        self.journal.whitelists.record(&id, || None);
        self.whitelists.insert(id, whitelist);
        id
    }

    // -- lookups ------------------------------------------------------------

    /// Current sale of `owner`.
    pub fn get_sale(&self, owner: &Address, now: DateTime<Utc>) -> Option<SaleInfo> {
        let sale = self.owners.get(owner).and_then(|id| self.sales.get(id))?;
        Some(SaleInfo {
            owner: sale.owner.clone(),
            sale_asset: sale.sale_asset.clone(),
            fund_asset: sale.fund_asset.clone(),
            sale: sale.id,
            escrow: sale.escrow(),
            phase: sale.phase(now),
            raised: sale.raised(),
            total_tokens: sale.total_tokens(),
        })
    }

    pub fn sale(&self, id: SaleId) -> Result<&Sale, LaunchpadError> {
        self.sales
            .get(&id)
            .ok_or_else(|| LaunchpadError::NotFound(format!("sale {id}")))
    }

    pub(crate) fn sale_mut(&mut self, id: SaleId) -> Result<&mut Sale, LaunchpadError> {
        let sale = self
            .sales
            .get_mut(&id)
            .ok_or_else(|| LaunchpadError::NotFound(format!("sale {id}")))?;
        self.journal.sales.record(&id, || Some(sale.clone()));
        Ok(sale)
    }

    pub fn whitelist(&self, id: WhitelistId) -> Result<&Whitelist, LaunchpadError> {
        self.whitelists
            .get(&id)
            .ok_or_else(|| LaunchpadError::NotFound(format!("whitelist {id}")))
    }

    pub(crate) fn whitelist_mut(&mut self, id: WhitelistId) -> Result<&mut Whitelist, LaunchpadError> {
        let whitelist = self
            .whitelists
            .get_mut(&id)
            .ok_or_else(|| LaunchpadError::NotFound(format!("whitelist {id}")))?;
        self.journal.whitelists.record(&id, || Some(whitelist.clone()));
        Ok(whitelist)
    }

    /// A sale and its attached whitelist, borrowed together.
    pub(crate) fn sale_with_whitelist(
        &mut self,
        id: SaleId,
    ) -> Result<(&mut Sale, Option<&Whitelist>), LaunchpadError> {
        let sale = self
            .sales
            .get_mut(&id)
            .ok_or_else(|| LaunchpadError::NotFound(format!("sale {id}")))?;
        self.journal.sales.record(&id, || Some(sale.clone()));
        let whitelist = sale.whitelist().and_then(|wl| self.whitelists.get(&wl));
        Ok((sale, whitelist))
    }

    /// Number of sales ever created.
    pub fn sale_count(&self) -> usize {
        self.sales.len()
    }

    /// Every sale record, in no particular order.
    pub fn sales(&self) -> impl Iterator<Item = &Sale> {
        self.sales.values()
    }
}
