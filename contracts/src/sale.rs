//! # Sale
//!
//! One time-boxed token sale. The lifecycle is:
//!
//! 1. **Pending**: created by the router with the full token allocation in
//!    escrow. The owner may edit the whitelist or cancel.
//! 2. **Running**: `start <= now < end`. Contributors deposit the funding
//!    asset, within per-user bounds, whitelist caps and the hard cap.
//! 3. **Successful** or **Failed**: after `end`, depending on whether the
//!    soft cap was reached.
//! 4. **Finalized**: the owner splits the proceeds into the protocol cut,
//!    pool liquidity and owner proceeds, locks the pool shares, and retires
//!    the unsold tokens. Contributors then claim their tokens.
//! 5. **LiquidityWithdrawn**: the owner took the pool shares back after the
//!    lock expired.
//!
//! A Pending sale can instead be **Canceled**. Canceled and Failed sales
//! refund contributors and return the escrowed tokens to the owner.
//!
//! Every mutator books its internal effects before it moves any value.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{TemplateRef, BPS_DENOMINATOR, RETIREMENT_SINK};
use crate::error::LaunchpadError;
use crate::ledger::{AssetIssuer, AssetLedger};
use crate::lock::LockRegistry;
use crate::math::{apply_bps, mul_div, rate_product_to_tokens, tokens_for, MathError};
use crate::pool::LiquidityPool;
use crate::settings::Settings;
use crate::types::{Address, Amount, AssetId, CallContext, LockId, SaleId, WhitelistId};
use crate::whitelist::Whitelist;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Derived lifecycle phase of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Created, not started yet.
    Pending,
    /// Accepting deposits.
    Running,
    /// Ended below the soft cap.
    Failed,
    /// Ended at or above the soft cap, not finalized yet.
    Successful,
    /// Canceled by the owner before start.
    Canceled,
    /// Proceeds distributed, liquidity locked.
    Finalized,
    /// Locked liquidity returned to the owner.
    LiquidityWithdrawn,
}

impl Phase {
    /// Terminal phases never become active again. An owner whose previous
    /// sale is terminal may create a new one.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Phase::Canceled | Phase::Failed | Phase::Finalized | Phase::LiquidityWithdrawn
        )
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Pending => write!(f, "Pending"),
            Phase::Running => write!(f, "Running"),
            Phase::Failed => write!(f, "Failed"),
            Phase::Successful => write!(f, "Successful"),
            Phase::Canceled => write!(f, "Canceled"),
            Phase::Finalized => write!(f, "Finalized"),
            Phase::LiquidityWithdrawn => write!(f, "LiquidityWithdrawn"),
        }
    }
}

/// Terms of a sale, frozen at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleParameters {
    /// Minimum raise for the sale to succeed.
    pub soft_cap: Amount,
    /// Maximum raise.
    pub hard_cap: Amount,
    /// Lower bound on a contributor's cumulative deposit.
    pub min_contribution: Amount,
    /// Upper bound on a contributor's cumulative deposit.
    pub max_contribution: Amount,
    /// Sale tokens per funding unit for contributors, fixed point.
    pub presale_rate: Amount,
    /// Sale tokens per funding unit for pool seeding, fixed point.
    pub listing_rate: Amount,
    /// Share of the raise committed to the pool, in bps.
    pub liquidity_bps: u32,
    /// First instant deposits are accepted.
    pub start: DateTime<Utc>,
    /// First instant deposits are refused again.
    pub end: DateTime<Utc>,
    /// How long pool shares stay locked after finalize.
    pub unlock_secs: u64,
    /// Whether contributors must be whitelisted.
    pub whitelisted: bool,
}

impl SaleParameters {
    /// Checks the terms against the bounds configured in `settings`.
    pub fn validate(&self, settings: &Settings, now: DateTime<Utc>) -> Result<(), LaunchpadError> {
        let invalid = |msg: String| Err(LaunchpadError::Validation(msg));

        if self.hard_cap == 0 {
            return invalid("hard cap must be positive".into());
        }
        if self.soft_cap > self.hard_cap {
            return invalid(format!(
                "soft cap {} exceeds hard cap {}",
                self.soft_cap, self.hard_cap
            ));
        }
        let ratio = Amount::from(settings.min_cap_ratio_bps());
        let soft_scaled = self.soft_cap.checked_mul(BPS_DENOMINATOR);
        let hard_scaled = self.hard_cap.checked_mul(ratio);
        match (soft_scaled, hard_scaled) {
            (Some(soft), Some(hard)) if soft >= hard => {}
            _ => {
                return invalid(format!(
                    "soft cap must be at least {ratio} bps of the hard cap"
                ))
            }
        }
        if self.max_contribution == 0 || self.min_contribution > self.max_contribution {
            return invalid(format!(
                "contribution bounds [{}, {}] are empty",
                self.min_contribution, self.max_contribution
            ));
        }
        if self.presale_rate == 0 || self.listing_rate == 0 {
            return invalid("rates must be positive".into());
        }
        if self.end <= self.start {
            return invalid("sale must end after it starts".into());
        }
        if self.end <= now {
            return invalid("sale end is in the past".into());
        }
        let duration = u64::try_from((self.end - self.start).num_seconds()).unwrap_or(0);
        if duration < settings.min_sale_secs() {
            return invalid(format!(
                "duration {duration}s is below the minimum {}s",
                settings.min_sale_secs()
            ));
        }
        if settings.max_sale_secs() != 0 && duration > settings.max_sale_secs() {
            return invalid(format!(
                "duration {duration}s exceeds the maximum {}s",
                settings.max_sale_secs()
            ));
        }
        if self.liquidity_bps < settings.min_liquidity_bps() {
            return invalid(format!(
                "liquidity {} bps is below the minimum {} bps",
                self.liquidity_bps,
                settings.min_liquidity_bps()
            ));
        }
        if self.liquidity_bps < settings.launching_fee_bps()
            || u128::from(self.liquidity_bps) + u128::from(settings.launching_fee_bps()) > BPS_DENOMINATOR
        {
            return invalid(format!(
                "liquidity {} bps is incompatible with the {} bps launching fee",
                self.liquidity_bps,
                settings.launching_fee_bps()
            ));
        }
        if self.unlock_secs < settings.min_unlock_secs() {
            return invalid(format!(
                "unlock {}s is below the minimum {}s",
                self.unlock_secs,
                settings.min_unlock_secs()
            ));
        }
        Ok(())
    }
}

/// What a direct native transfer to a sale turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Receipt {
    /// Sent before start and passed on to the router.
    Forwarded(Amount),
    /// Booked as a contribution.
    Deposited(Amount),
}

/// What a contributor's `withdraw` paid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Withdrawal {
    /// Sale tokens claimed after finalize.
    Claimed(Amount),
    /// Funding asset refunded from a canceled or failed sale.
    Refunded(Amount),
}

/// Amounts moved by a successful finalize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeReport {
    /// Tokens reserved for contributor claims.
    pub sold_tokens: Amount,
    /// Funding asset paid to the treasury.
    pub protocol_cut: Amount,
    /// Sale tokens paid to the treasury alongside the cut.
    pub dev_fee_tokens: Amount,
    /// Funding asset supplied to the pool.
    pub liquidity_asset: Amount,
    /// Sale tokens supplied to the pool.
    pub liquidity_tokens: Amount,
    /// Unsold tokens sent to the retirement sink.
    pub retired_tokens: Amount,
    /// Funding asset paid to the sale owner.
    pub owner_proceeds: Amount,
    /// Pool share asset.
    pub share_asset: AssetId,
    /// Pool shares locked for the owner.
    pub shares: Amount,
    /// Lock certificate holding the shares.
    pub lock_id: LockId,
}

/// A sale record in the router's arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    /// Arena handle.
    pub id: SaleId,
    /// Project owner.
    pub owner: Address,
    /// Asset being sold.
    pub sale_asset: AssetId,
    /// Asset contributors pay with.
    pub fund_asset: AssetId,
    /// Decimals of `sale_asset`.
    pub sale_decimals: u8,
    /// Decimals of `fund_asset`.
    pub fund_decimals: u8,
    params: SaleParameters,
    /// Launching fee in force when the sale was created. Finalize charges
    /// this, whatever the settings say by then.
    launching_fee_bps: u32,
    /// Template the record was instantiated from.
    pub template: TemplateRef,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    raised: Amount,
    deposited: HashMap<Address, Amount>,
    claimed: HashSet<Address>,
    total_tokens: Amount,
    canceled: bool,
    finalized_at: Option<DateTime<Utc>>,
    lock_id: Option<LockId>,
    whitelist: Option<WhitelistId>,
    tokens_reclaimed: bool,
    liquidity_withdrawn: bool,
}

impl Sale {
    /// Creates a Pending sale and computes its token allocation.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: SaleId,
        owner: Address,
        sale_asset: AssetId,
        fund_asset: AssetId,
        sale_decimals: u8,
        fund_decimals: u8,
        params: SaleParameters,
        launching_fee_bps: u32,
        template: TemplateRef,
        now: DateTime<Utc>,
    ) -> Result<Self, LaunchpadError> {
        let total_tokens = total_tokens_for(&params, fund_decimals, sale_decimals)?;
        if total_tokens == 0 {
            return Err(LaunchpadError::Arithmetic(format!(
                "sale of {sale_asset} for {fund_asset} allocates zero tokens"
            )));
        }
        Ok(Self {
            id,
            owner,
            sale_asset,
            fund_asset,
            sale_decimals,
            fund_decimals,
            params,
            launching_fee_bps,
            template,
            created_at: now,
            raised: 0,
            deposited: HashMap::new(),
            claimed: HashSet::new(),
            total_tokens,
            canceled: false,
            finalized_at: None,
            lock_id: None,
            whitelist: None,
            tokens_reclaimed: false,
            liquidity_withdrawn: false,
        })
    }

    // -- predicates ---------------------------------------------------------

    /// `!canceled && start <= now < end`.
    pub fn running(&self, now: DateTime<Utc>) -> bool {
        !self.canceled && now >= self.params.start && now < self.params.end
    }

    /// `!canceled && now >= end`.
    pub fn ended(&self, now: DateTime<Utc>) -> bool {
        !self.canceled && now >= self.params.end
    }

    /// `!canceled && raised >= soft_cap`. Finalize additionally needs `ended`.
    pub fn successful(&self) -> bool {
        !self.canceled && self.raised >= self.params.soft_cap
    }

    /// Current lifecycle phase.
    pub fn phase(&self, now: DateTime<Utc>) -> Phase {
        if self.canceled {
            Phase::Canceled
        } else if self.liquidity_withdrawn {
            Phase::LiquidityWithdrawn
        } else if self.finalized_at.is_some() {
            Phase::Finalized
        } else if now < self.params.start {
            Phase::Pending
        } else if now < self.params.end {
            Phase::Running
        } else if self.successful() {
            Phase::Successful
        } else {
            Phase::Failed
        }
    }

    // -- getters ------------------------------------------------------------

    /// Escrow account holding the sale's assets.
    pub fn escrow(&self) -> Address {
        self.id.escrow_account()
    }

    /// Terms frozen at creation.
    pub fn params(&self) -> &SaleParameters {
        &self.params
    }

    /// Protocol cut charged at finalize, in bps.
    pub fn launching_fee_bps(&self) -> u32 {
        self.launching_fee_bps
    }

    pub fn raised(&self) -> Amount {
        self.raised
    }

    /// Cumulative deposit of `contributor`.
    pub fn deposited(&self, contributor: &Address) -> Amount {
        self.deposited.get(contributor).copied().unwrap_or(0)
    }

    /// Sum of all per-contributor deposits.
    pub fn total_deposited(&self) -> Amount {
        self.deposited.values().sum()
    }

    /// Tokens escrowed at creation; fixed for the sale's lifetime.
    pub fn total_tokens(&self) -> Amount {
        self.total_tokens
    }

    /// Tokens contributors would receive if the hard cap were reached.
    pub fn sale_amount(&self) -> Result<Amount, LaunchpadError> {
        Ok(tokens_for(
            self.params.hard_cap,
            self.params.presale_rate,
            self.fund_decimals,
            self.sale_decimals,
        )?)
    }

    /// Tokens reserved for the pool if the hard cap were reached.
    pub fn liquidity_amount(&self) -> Result<Amount, LaunchpadError> {
        let product = self
            .params
            .hard_cap
            .checked_mul(self.params.listing_rate)
            .ok_or(MathError::Overflow("liquidity_amount"))?;
        let share = mul_div(product, Amount::from(self.params.liquidity_bps), BPS_DENOMINATOR)?;
        Ok(rate_product_to_tokens(share, self.fund_decimals, self.sale_decimals)?)
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized_at.is_some()
    }

    pub fn finalized_at(&self) -> Option<DateTime<Utc>> {
        self.finalized_at
    }

    /// Lock holding the pool shares, set by finalize.
    pub fn lock_id(&self) -> Option<LockId> {
        self.lock_id
    }

    /// Attached whitelist, if any.
    pub fn whitelist(&self) -> Option<WhitelistId> {
        self.whitelist
    }

    /// Whether `contributor` already withdrew (claim or refund).
    pub fn has_withdrawn(&self, contributor: &Address) -> bool {
        self.claimed.contains(contributor)
    }

    pub(crate) fn attach_whitelist(&mut self, id: WhitelistId) {
        self.whitelist = Some(id);
    }

    // -- contributions ------------------------------------------------------

    /// Books a contribution of `amount` from the caller.
    ///
    /// The funding asset is pulled after booking. If it charges a transfer
    /// fee, only what actually reached escrow is credited. Returns the
    /// credited amount.
    pub fn deposit<L: AssetLedger>(
        &mut self,
        ledger: &mut L,
        whitelist: Option<&Whitelist>,
        ctx: &CallContext,
        amount: Amount,
    ) -> Result<Amount, LaunchpadError> {
        let contributor = &ctx.caller;
        let phase = self.phase(ctx.now);
        if self.canceled {
            return Err(LaunchpadError::sale_state(phase, "sale is canceled"));
        }
        if !self.running(ctx.now) {
            return Err(LaunchpadError::sale_state(phase, "sale isn't running"));
        }
        if amount == 0 {
            return Err(LaunchpadError::Validation("deposit amount must be positive".into()));
        }

        let current = self.deposited(contributor);
        let cumulative = current
            .checked_add(amount)
            .ok_or(MathError::Overflow("deposit"))?;
        if cumulative < self.params.min_contribution {
            return Err(LaunchpadError::Validation(format!(
                "cumulative deposit {cumulative} is below the minimum {}",
                self.params.min_contribution
            )));
        }
        if cumulative > self.params.max_contribution {
            return Err(LaunchpadError::CapacityExceeded {
                what: "max contribution",
                limit: self.params.max_contribution,
                attempted: cumulative,
            });
        }
        if self.params.whitelisted {
            let list = whitelist.ok_or_else(|| {
                LaunchpadError::NotFound(format!("whitelist of sale {}", self.id))
            })?;
            let entry = list
                .get_user(contributor)
                .ok_or_else(|| LaunchpadError::unauthorized(contributor, "whitelisted contributor"))?;
            if let Some(cap) = entry.max_allocation {
                if cumulative > cap {
                    return Err(LaunchpadError::CapacityExceeded {
                        what: "whitelist allocation",
                        limit: cap,
                        attempted: cumulative,
                    });
                }
            }
        }
        let new_raised = self
            .raised
            .checked_add(amount)
            .ok_or(MathError::Overflow("deposit"))?;
        if new_raised > self.params.hard_cap {
            return Err(LaunchpadError::CapacityExceeded {
                what: "hard cap",
                limit: self.params.hard_cap,
                attempted: new_raised,
            });
        }

        // Effects first.
        self.raised = new_raised;
        self.deposited.insert(contributor.clone(), cumulative);

        let received = self.pull_funds(ledger, contributor, amount)?;
        if received < amount {
            let shortfall = amount - received;
            self.raised -= shortfall;
            let booked = cumulative - shortfall;
            if booked == 0 {
                self.deposited.remove(contributor);
            } else {
                self.deposited.insert(contributor.clone(), booked);
            }
        }

        tracing::debug!(sale = %self.id, %contributor, amount = received, raised = self.raised, "deposit booked");
        Ok(received)
    }

    /// Handles native value sent straight to the sale: forwarded to the
    /// router before start, a deposit while running, refused afterwards.
    pub fn receive<L: AssetLedger>(
        &mut self,
        ledger: &mut L,
        whitelist: Option<&Whitelist>,
        router: &Address,
        ctx: &CallContext,
        amount: Amount,
    ) -> Result<Receipt, LaunchpadError> {
        if !self.fund_asset.is_native() {
            return Err(LaunchpadError::Validation(format!(
                "sale {} is funded in {}, not the native asset",
                self.id, self.fund_asset
            )));
        }
        let phase = self.phase(ctx.now);
        if phase == Phase::Pending {
            let native = AssetId::native();
            let escrow = self.escrow();
            ledger.transfer(&native, &ctx.caller, &escrow, amount)?;
            ledger.transfer(&native, &escrow, router, amount)?;
            tracing::debug!(sale = %self.id, from = %ctx.caller, amount, "pre-start value forwarded to router");
            return Ok(Receipt::Forwarded(amount));
        }
        self.deposit(ledger, whitelist, ctx, amount)
            .map(Receipt::Deposited)
    }

    /// Leaves a running sale early. The penalty goes to `treasury`, the rest
    /// back to the caller, and the caller's whole deposit is unbooked.
    /// Returns `(refund, penalty)`.
    pub fn emergency_withdraw<L: AssetLedger>(
        &mut self,
        ledger: &mut L,
        treasury: &Address,
        penalty_bps: u32,
        ctx: &CallContext,
    ) -> Result<(Amount, Amount), LaunchpadError> {
        let contributor = &ctx.caller;
        if !self.running(ctx.now) {
            return Err(LaunchpadError::sale_state(self.phase(ctx.now), "sale isn't running"));
        }
        let deposit = self.deposited(contributor);
        if deposit == 0 {
            return Err(LaunchpadError::InvalidState(format!(
                "{contributor} has nothing deposited in sale {}",
                self.id
            )));
        }
        let penalty = apply_bps(deposit, penalty_bps)?;
        let refund = deposit - penalty;

        self.deposited.remove(contributor);
        self.raised = self
            .raised
            .checked_sub(deposit)
            .ok_or(MathError::Underflow("emergency_withdraw"))?;

        let escrow = self.escrow();
        ledger.transfer(&self.fund_asset, &escrow, contributor, refund)?;
        ledger.transfer(&self.fund_asset, &escrow, treasury, penalty)?;

        tracing::debug!(sale = %self.id, %contributor, refund, penalty, "emergency withdrawal");
        Ok((refund, penalty))
    }

    /// Pays the caller out once: sale tokens after finalize, or a full
    /// refund of the funding asset from a canceled or failed sale.
    pub fn withdraw<L: AssetLedger>(
        &mut self,
        ledger: &mut L,
        ctx: &CallContext,
    ) -> Result<Withdrawal, LaunchpadError> {
        let contributor = &ctx.caller;
        let phase = self.phase(ctx.now);
        let refundable = matches!(phase, Phase::Canceled | Phase::Failed);
        if !self.is_finalized() && !refundable {
            return Err(LaunchpadError::sale_state(phase, "nothing to withdraw yet"));
        }
        let deposit = self.deposited(contributor);
        if deposit == 0 {
            return Err(LaunchpadError::InvalidState(format!(
                "{contributor} has nothing deposited in sale {}",
                self.id
            )));
        }
        if self.claimed.contains(contributor) {
            return Err(LaunchpadError::InvalidState(format!(
                "{contributor} already withdrew from sale {}",
                self.id
            )));
        }
        self.claimed.insert(contributor.clone());

        let escrow = self.escrow();
        if refundable {
            ledger.transfer(&self.fund_asset, &escrow, contributor, deposit)?;
            tracing::debug!(sale = %self.id, %contributor, amount = deposit, "contribution refunded");
            return Ok(Withdrawal::Refunded(deposit));
        }

        let tokens = tokens_for(
            deposit,
            self.params.presale_rate,
            self.fund_decimals,
            self.sale_decimals,
        )?;
        ledger.transfer(&self.sale_asset, &escrow, contributor, tokens)?;
        tracing::debug!(sale = %self.id, %contributor, tokens, "tokens claimed");
        Ok(Withdrawal::Claimed(tokens))
    }

    /// Returns the escrowed sale tokens of a canceled or failed sale to the
    /// owner. Once only.
    pub fn reclaim_tokens<L: AssetLedger>(
        &mut self,
        ledger: &mut L,
        ctx: &CallContext,
    ) -> Result<Amount, LaunchpadError> {
        self.ensure_owner(&ctx.caller)?;
        let phase = self.phase(ctx.now);
        if !matches!(phase, Phase::Canceled | Phase::Failed) {
            return Err(LaunchpadError::sale_state(phase, "tokens are only reclaimable from a canceled or failed sale"));
        }
        if self.tokens_reclaimed {
            return Err(LaunchpadError::InvalidState(format!(
                "tokens of sale {} already reclaimed",
                self.id
            )));
        }
        self.tokens_reclaimed = true;

        let escrow = self.escrow();
        let amount = ledger.balance_of(&self.sale_asset, &escrow);
        ledger.transfer(&self.sale_asset, &escrow, &self.owner, amount)?;
        tracing::info!(sale = %self.id, amount, "escrowed tokens reclaimed");
        Ok(amount)
    }

    // -- owner controls -----------------------------------------------------

    /// Cancels a Pending sale for good.
    pub fn cancel(&mut self, ctx: &CallContext) -> Result<(), LaunchpadError> {
        self.ensure_owner(&ctx.caller)?;
        let phase = self.phase(ctx.now);
        if phase != Phase::Pending {
            return Err(LaunchpadError::sale_state(phase, "only a pending sale can be canceled"));
        }
        self.canceled = true;
        tracing::info!(sale = %self.id, owner = %self.owner, "sale canceled");
        Ok(())
    }

    /// Authorizes an edit of the attached whitelist and returns its handle.
    /// Adding is refused once the sale started or ended; removing once it
    /// started.
    pub fn authorize_whitelist_edit(
        &self,
        ctx: &CallContext,
        adding: bool,
    ) -> Result<WhitelistId, LaunchpadError> {
        self.ensure_owner(&ctx.caller)?;
        let phase = self.phase(ctx.now);
        match phase {
            Phase::Pending => {}
            Phase::Canceled => return Err(LaunchpadError::sale_state(phase, "sale is canceled")),
            Phase::Running => return Err(LaunchpadError::sale_state(phase, "sale started")),
            _ if adding => return Err(LaunchpadError::sale_state(phase, "sale ended")),
            _ => return Err(LaunchpadError::sale_state(phase, "sale started")),
        }
        self.whitelist.ok_or_else(|| {
            LaunchpadError::InvalidState(format!("sale {} has no whitelist", self.id))
        })
    }

    /// Attaches `whitelist`, which must already be owned by the sale escrow.
    pub fn set_whitelist(&mut self, ctx: &CallContext, whitelist: &Whitelist) -> Result<(), LaunchpadError> {
        self.ensure_owner(&ctx.caller)?;
        let phase = self.phase(ctx.now);
        if phase != Phase::Pending {
            return Err(LaunchpadError::sale_state(phase, "whitelist can only be set before start"));
        }
        if !self.params.whitelisted {
            return Err(LaunchpadError::InvalidState(format!(
                "sale {} was not created as whitelisted",
                self.id
            )));
        }
        if whitelist.owner != self.escrow() {
            return Err(LaunchpadError::Validation(format!(
                "whitelist {} is owned by {}, not by sale {}",
                whitelist.id, whitelist.owner, self.id
            )));
        }
        self.whitelist = Some(whitelist.id);
        tracing::info!(sale = %self.id, whitelist = %whitelist.id, "whitelist attached");
        Ok(())
    }

    /// Distributes the proceeds of a successful sale.
    ///
    /// Order of effects: mark finalized; pay the protocol cut and dev tokens
    /// to the treasury; seed the pool; lock the shares for the owner until
    /// `now + unlock_secs`; retire the unsold tokens; pay the owner.
    pub fn finalize<L: AssetIssuer, P: LiquidityPool>(
        &mut self,
        ledger: &mut L,
        pool: &mut P,
        locks: &mut LockRegistry,
        settings: &Settings,
        ctx: &CallContext,
    ) -> Result<FinalizeReport, LaunchpadError> {
        self.ensure_owner(&ctx.caller)?;
        let phase = self.phase(ctx.now);
        if self.is_finalized() {
            return Err(LaunchpadError::sale_state(phase, "sale already finalized"));
        }
        if self.canceled {
            return Err(LaunchpadError::sale_state(phase, "sale is canceled"));
        }
        if !self.ended(ctx.now) {
            return Err(LaunchpadError::sale_state(phase, "sale hasn't ended"));
        }
        if !self.successful() {
            return Err(LaunchpadError::sale_state(phase, "soft cap not reached"));
        }

        let raised = self.raised;
        let (fund_dec, sale_dec) = (self.fund_decimals, self.sale_decimals);
        let listing = self.params.listing_rate;

        let sold_tokens = tokens_for(raised, self.params.presale_rate, fund_dec, sale_dec)?;
        let protocol_cut = apply_bps(raised, self.launching_fee_bps)?;
        let dev_fee_tokens = tokens_for(protocol_cut, listing, fund_dec, sale_dec)?;
        let liquidity_asset = apply_bps(raised, self.params.liquidity_bps)?;
        let liquidity_tokens = tokens_for(liquidity_asset, listing, fund_dec, sale_dec)?
            .checked_sub(dev_fee_tokens)
            .ok_or(MathError::Underflow("liquidity_tokens"))?;
        let retired_tokens = self
            .total_tokens
            .checked_sub(sold_tokens)
            .and_then(|r| r.checked_sub(liquidity_tokens))
            .and_then(|r| r.checked_sub(dev_fee_tokens))
            .ok_or(MathError::Underflow("retired_tokens"))?;
        let owner_proceeds = raised
            .checked_sub(protocol_cut)
            .and_then(|r| r.checked_sub(liquidity_asset))
            .ok_or(MathError::Underflow("owner_proceeds"))?;

        // Effects.
        self.finalized_at = Some(ctx.now);

        // Interactions.
        let escrow = self.escrow();
        let treasury = settings.treasury();
        ledger.transfer(&self.fund_asset, &escrow, treasury, protocol_cut)?;
        ledger.transfer(&self.sale_asset, &escrow, treasury, dev_fee_tokens)?;

        let share_asset = match pool.pair_of(&self.fund_asset, &self.sale_asset) {
            Some(asset) => asset,
            None => pool.create_pair(ledger, &self.fund_asset, &self.sale_asset)?,
        };
        let pool_account = pool.spender();
        ledger.approve(&self.fund_asset, &escrow, &pool_account, liquidity_asset)?;
        ledger.approve(&self.sale_asset, &escrow, &pool_account, liquidity_tokens)?;
        let shares = pool.add_liquidity(
            ledger,
            &escrow,
            &self.fund_asset,
            &self.sale_asset,
            liquidity_asset,
            liquidity_tokens,
        )?;

        ledger.approve(&share_asset, &escrow, &LockRegistry::account(), shares)?;
        let lock_id = locks.lock(
            ledger,
            &escrow,
            &self.owner,
            &share_asset,
            shares,
            self.params.unlock_secs,
            ctx.now,
        )?;
        self.lock_id = Some(lock_id);

        ledger.transfer(&self.sale_asset, &escrow, &Address::from(RETIREMENT_SINK), retired_tokens)?;
        ledger.transfer(&self.fund_asset, &escrow, &self.owner, owner_proceeds)?;

        tracing::info!(
            sale = %self.id,
            raised,
            sold_tokens,
            protocol_cut,
            liquidity_asset,
            liquidity_tokens,
            retired_tokens,
            shares,
            %lock_id,
            "sale finalized"
        );

        Ok(FinalizeReport {
            sold_tokens,
            protocol_cut,
            dev_fee_tokens,
            liquidity_asset,
            liquidity_tokens,
            retired_tokens,
            owner_proceeds,
            share_asset,
            shares,
            lock_id,
        })
    }

    /// Returns the locked pool shares to the owner once the lock expired.
    pub fn withdraw_liquidity<L: AssetLedger>(
        &mut self,
        ledger: &mut L,
        locks: &mut LockRegistry,
        ctx: &CallContext,
    ) -> Result<Amount, LaunchpadError> {
        self.ensure_owner(&ctx.caller)?;
        let phase = self.phase(ctx.now);
        let lock_id = match (self.lock_id, phase) {
            (Some(id), Phase::Finalized) => id,
            _ => return Err(LaunchpadError::sale_state(phase, "no locked liquidity to withdraw")),
        };
        let record = locks
            .record(lock_id)
            .ok_or_else(|| LaunchpadError::NotFound(format!("{lock_id}")))?;
        if ctx.now < record.unlock_at {
            return Err(LaunchpadError::sale_state(phase, "can't withdraw LP tokens yet"));
        }

        self.liquidity_withdrawn = true;
        let amount = locks.unlock(ledger, &self.owner, lock_id, ctx.now)?;
        tracing::info!(sale = %self.id, %lock_id, amount, "liquidity withdrawn");
        Ok(amount)
    }

    // -- helpers ------------------------------------------------------------

    fn ensure_owner(&self, caller: &Address) -> Result<(), LaunchpadError> {
        if caller != &self.owner {
            return Err(LaunchpadError::unauthorized(caller, "sale owner"));
        }
        Ok(())
    }

    /// Moves `amount` of the funding asset into escrow and returns what
    /// arrived there.
    fn pull_funds<L: AssetLedger>(
        &self,
        ledger: &mut L,
        from: &Address,
        amount: Amount,
    ) -> Result<Amount, LaunchpadError> {
        let escrow = self.escrow();
        let before = ledger.balance_of(&self.fund_asset, &escrow);
        if self.fund_asset.is_native() {
            ledger.transfer(&self.fund_asset, from, &escrow, amount)?;
        } else {
            ledger.transfer_from(&self.fund_asset, &escrow, from, &escrow, amount)?;
        }
        let after = ledger.balance_of(&self.fund_asset, &escrow);
        Ok(after.saturating_sub(before))
    }
}

/// `(presale * hard + listing * hard * liquidity_bps / 10_000)` in sale-asset units.
pub fn total_tokens_for(
    params: &SaleParameters,
    fund_decimals: u8,
    sale_decimals: u8,
) -> Result<Amount, LaunchpadError> {
    let presale = params
        .hard_cap
        .checked_mul(params.presale_rate)
        .ok_or(MathError::Overflow("total_tokens"))?;
    let listing = params
        .hard_cap
        .checked_mul(params.listing_rate)
        .ok_or(MathError::Overflow("total_tokens"))?;
    let liquidity = mul_div(listing, Amount::from(params.liquidity_bps), BPS_DENOMINATOR)?;
    let product = presale
        .checked_add(liquidity)
        .ok_or(MathError::Overflow("total_tokens"))?;
    Ok(rate_product_to_tokens(product, fund_decimals, sale_decimals)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SettingsConfig, RATE_SCALE};
    use crate::error::ErrorKind;
    use chrono::Duration;

    fn settings() -> Settings {
        Settings::new(Address::from("admin"), Address::from("treasury"), SettingsConfig::default()).unwrap()
    }

    fn params(now: DateTime<Utc>) -> SaleParameters {
        SaleParameters {
            soft_cap: 50,
            hard_cap: 100,
            min_contribution: 1,
            max_contribution: 100,
            presale_rate: 2 * RATE_SCALE,
            listing_rate: RATE_SCALE,
            liquidity_bps: 6_000,
            start: now + Duration::hours(1),
            end: now + Duration::hours(2),
            unlock_secs: 3_600,
            whitelisted: false,
        }
    }

    fn sale(now: DateTime<Utc>) -> Sale {
        Sale::new(
            SaleId::generate(),
            Address::from("owner"),
            AssetId::from("TKN"),
            AssetId::native(),
            18,
            18,
            params(now),
            100,
            TemplateRef::new("bifrost-sale", 1, 1),
            now,
        )
        .unwrap()
    }

    #[test]
    fn total_tokens_formula() {
        let now = Utc::now();
        let s = sale(now);
        // 2 * 100 + 1 * 100 * 0.6
        assert_eq!(s.total_tokens(), 260);
        assert_eq!(s.sale_amount().unwrap(), 200);
        assert_eq!(s.liquidity_amount().unwrap(), 60);
    }

    #[test]
    fn phase_follows_clock() {
        let now = Utc::now();
        let s = sale(now);
        assert_eq!(s.phase(now), Phase::Pending);
        assert_eq!(s.phase(now + Duration::minutes(90)), Phase::Running);
        assert!(s.running(now + Duration::hours(1)));
        assert!(!s.running(now + Duration::hours(2)));
        assert!(s.ended(now + Duration::hours(2)));
        assert_eq!(s.phase(now + Duration::hours(3)), Phase::Failed);
    }

    #[test]
    fn cancel_only_while_pending() {
        let now = Utc::now();
        let mut s = sale(now);
        let stranger = CallContext::new("eve", now);
        assert_eq!(s.cancel(&stranger).unwrap_err().kind(), ErrorKind::Authorization);

        let running = CallContext::new("owner", now + Duration::minutes(61));
        assert_eq!(s.cancel(&running).unwrap_err().kind(), ErrorKind::State);

        s.cancel(&CallContext::new("owner", now)).unwrap();
        assert_eq!(s.phase(now + Duration::minutes(90)), Phase::Canceled);
        assert!(!s.running(now + Duration::minutes(90)));
        assert!(s.phase(now).is_terminal());
    }

    #[test]
    fn parameter_bounds() {
        let now = Utc::now();
        let settings = settings();
        params(now).validate(&settings, now).unwrap();

        let mut p = params(now);
        p.soft_cap = 49;
        assert_eq!(p.validate(&settings, now).unwrap_err().kind(), ErrorKind::Validation);

        let mut p = params(now);
        p.liquidity_bps = 4_999;
        assert!(p.validate(&settings, now).is_err());

        let mut p = params(now);
        p.liquidity_bps = 9_950;
        assert!(p.validate(&settings, now).is_err());

        let mut p = params(now);
        p.unlock_secs = 0;
        assert!(p.validate(&settings, now).is_err());

        let mut p = params(now);
        p.end = p.start;
        assert!(p.validate(&settings, now).is_err());

        let mut p = params(now);
        p.min_contribution = 101;
        assert!(p.validate(&settings, now).is_err());
    }

    #[test]
    fn phase_display() {
        assert_eq!(Phase::LiquidityWithdrawn.to_string(), "LiquidityWithdrawn");
        assert!(!Phase::Successful.is_terminal());
        assert!(Phase::Failed.is_terminal());
    }
}
