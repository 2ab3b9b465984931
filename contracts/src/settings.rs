//! # Settings
//!
//! The single source of global configuration. Router and sales read every
//! tunable from here; nothing is ambient.
//!
//! Two roles govern it:
//!
//! - the **admin** changes fees, bounds, treasury and router;
//! - the **upgrade administrator** swaps the templates new sales and
//!   whitelists are instantiated from. A replacement template must keep the
//!   state layout of the one it replaces.

use serde::{Deserialize, Serialize};

use crate::config::{SettingsConfig, TemplateRef, ROUTER_ACCOUNT};
use crate::error::LaunchpadError;
use crate::price_feed::PriceFeed;
use crate::types::{Address, Amount, AssetId};

/// Global protocol configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    admin: Address,
    upgrade_administrator: Address,
    treasury: Address,
    router: Address,
    config: SettingsConfig,
    price_feed: PriceFeed,
}

impl Settings {
    /// Builds settings from a validated config. The admin also starts as
    /// upgrade administrator and price-feed admin.
    pub fn new(admin: Address, treasury: Address, config: SettingsConfig) -> Result<Self, LaunchpadError> {
        config.validate()?;
        Ok(Self {
            upgrade_administrator: admin.clone(),
            price_feed: PriceFeed::new(admin.clone()),
            router: Address::from(ROUTER_ACCOUNT),
            admin,
            treasury,
            config,
        })
    }

    // -- getters ------------------------------------------------------------

    /// Governance admin.
    pub fn admin(&self) -> &Address {
        &self.admin
    }

    /// Account allowed to swap templates.
    pub fn upgrade_administrator(&self) -> &Address {
        &self.upgrade_administrator
    }

    /// Receiver of listing fees and protocol cuts.
    pub fn treasury(&self) -> &Address {
        &self.treasury
    }

    /// Router account that receives pre-start pass-through value.
    pub fn router(&self) -> &Address {
        &self.router
    }

    /// All tunables.
    pub fn config(&self) -> &SettingsConfig {
        &self.config
    }

    pub fn listing_fee(&self) -> Amount {
        self.config.listing_fee
    }

    pub fn launching_fee_bps(&self) -> u32 {
        self.config.launching_fee_bps
    }

    pub fn min_liquidity_bps(&self) -> u32 {
        self.config.min_liquidity_bps
    }

    pub fn min_cap_ratio_bps(&self) -> u32 {
        self.config.min_cap_ratio_bps
    }

    pub fn min_unlock_secs(&self) -> u64 {
        self.config.min_unlock_secs
    }

    pub fn min_sale_secs(&self) -> u64 {
        self.config.min_sale_secs
    }

    pub fn max_sale_secs(&self) -> u64 {
        self.config.max_sale_secs
    }

    pub fn early_withdraw_penalty_bps(&self) -> u32 {
        self.config.early_withdraw_penalty_bps
    }

    pub fn sale_template(&self) -> &TemplateRef {
        &self.config.sale_template
    }

    pub fn whitelist_template(&self) -> &TemplateRef {
        &self.config.whitelist_template
    }

    /// The price feed used to quote the listing fee in partner assets.
    pub fn price_feed(&self) -> &PriceFeed {
        &self.price_feed
    }

    /// Mutable access for rate updates. The feed checks its own admin.
    pub fn price_feed_mut(&mut self) -> &mut PriceFeed {
        &mut self.price_feed
    }

    /// Listing fee quoted in `asset`, before any partner discount.
    pub fn listing_fee_in_token(&self, asset: &AssetId) -> Result<Amount, LaunchpadError> {
        self.price_feed.convert(self.config.listing_fee, asset)
    }

    // -- admin setters ------------------------------------------------------

    pub fn set_listing_fee(&mut self, caller: &Address, fee: Amount) -> Result<(), LaunchpadError> {
        self.update(caller, "listing_fee", |c| c.listing_fee = fee)
    }

    pub fn set_launching_fee_bps(&mut self, caller: &Address, bps: u32) -> Result<(), LaunchpadError> {
        self.update(caller, "launching_fee_bps", |c| c.launching_fee_bps = bps)
    }

    pub fn set_min_liquidity_bps(&mut self, caller: &Address, bps: u32) -> Result<(), LaunchpadError> {
        self.update(caller, "min_liquidity_bps", |c| c.min_liquidity_bps = bps)
    }

    pub fn set_min_cap_ratio_bps(&mut self, caller: &Address, bps: u32) -> Result<(), LaunchpadError> {
        self.update(caller, "min_cap_ratio_bps", |c| c.min_cap_ratio_bps = bps)
    }

    pub fn set_min_unlock_secs(&mut self, caller: &Address, secs: u64) -> Result<(), LaunchpadError> {
        self.update(caller, "min_unlock_secs", |c| c.min_unlock_secs = secs)
    }

    pub fn set_min_sale_secs(&mut self, caller: &Address, secs: u64) -> Result<(), LaunchpadError> {
        self.update(caller, "min_sale_secs", |c| c.min_sale_secs = secs)
    }

    /// Zero removes the upper bound.
    pub fn set_max_sale_secs(&mut self, caller: &Address, secs: u64) -> Result<(), LaunchpadError> {
        self.update(caller, "max_sale_secs", |c| c.max_sale_secs = secs)
    }

    pub fn set_early_withdraw_penalty_bps(&mut self, caller: &Address, bps: u32) -> Result<(), LaunchpadError> {
        self.update(caller, "early_withdraw_penalty_bps", |c| c.early_withdraw_penalty_bps = bps)
    }

    pub fn set_treasury(&mut self, caller: &Address, treasury: Address) -> Result<(), LaunchpadError> {
        self.ensure_admin(caller)?;
        tracing::info!(old = %self.treasury, new = %treasury, "treasury changed");
        self.treasury = treasury;
        Ok(())
    }

    pub fn set_router(&mut self, caller: &Address, router: Address) -> Result<(), LaunchpadError> {
        self.ensure_admin(caller)?;
        tracing::info!(old = %self.router, new = %router, "router changed");
        self.router = router;
        Ok(())
    }

    pub fn set_upgrade_administrator(&mut self, caller: &Address, upgrader: Address) -> Result<(), LaunchpadError> {
        self.ensure_admin(caller)?;
        tracing::info!(old = %self.upgrade_administrator, new = %upgrader, "upgrade administrator changed");
        self.upgrade_administrator = upgrader;
        Ok(())
    }

    /// Hands the admin role to `new_admin`.
    pub fn transfer_admin(&mut self, caller: &Address, new_admin: Address) -> Result<(), LaunchpadError> {
        self.ensure_admin(caller)?;
        tracing::info!(old = %self.admin, new = %new_admin, "settings admin changed");
        self.admin = new_admin;
        Ok(())
    }

    // -- template upgrades --------------------------------------------------

    /// Replaces the sale template. Upgrade administrator only; the layout
    /// must not change.
    pub fn set_sale_template(&mut self, caller: &Address, template: TemplateRef) -> Result<(), LaunchpadError> {
        self.ensure_upgrader(caller)?;
        check_layout(&self.config.sale_template, &template)?;
        tracing::info!(old = %self.config.sale_template, new = %template, "sale template upgraded");
        self.config.sale_template = template;
        Ok(())
    }

    /// Replaces the whitelist template. Same rules as the sale template.
    pub fn set_whitelist_template(&mut self, caller: &Address, template: TemplateRef) -> Result<(), LaunchpadError> {
        self.ensure_upgrader(caller)?;
        check_layout(&self.config.whitelist_template, &template)?;
        tracing::info!(old = %self.config.whitelist_template, new = %template, "whitelist template upgraded");
        self.config.whitelist_template = template;
        Ok(())
    }

    // -- helpers ------------------------------------------------------------

    /// Applies `apply` to a copy of the config, validates the copy, and only
    /// then commits it.
    fn update(
        &mut self,
        caller: &Address,
        field: &'static str,
        apply: impl FnOnce(&mut SettingsConfig),
    ) -> Result<(), LaunchpadError> {
        self.ensure_admin(caller)?;
        let mut next = self.config.clone();
        apply(&mut next);
        next.validate()?;
        self.config = next;
        tracing::info!(field, "settings updated");
        Ok(())
    }

    pub(crate) fn ensure_admin(&self, caller: &Address) -> Result<(), LaunchpadError> {
        if caller != &self.admin {
            return Err(LaunchpadError::unauthorized(caller, "settings admin"));
        }
        Ok(())
    }

    fn ensure_upgrader(&self, caller: &Address) -> Result<(), LaunchpadError> {
        if caller != &self.upgrade_administrator {
            return Err(LaunchpadError::unauthorized(caller, "upgrade administrator"));
        }
        Ok(())
    }
}

fn check_layout(current: &TemplateRef, next: &TemplateRef) -> Result<(), LaunchpadError> {
    if current.layout != next.layout {
        return Err(LaunchpadError::Validation(format!(
            "template {next} is not layout-compatible with {current}"
        )));
    }
    Ok(())
}
