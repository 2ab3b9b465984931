//! # Protocol Configuration & Constants
//!
//! Every fixed number the launchpad depends on lives here, together with
//! [`SettingsConfig`], the serde-loadable set of governance tunables that
//! seeds [`crate::settings::Settings`] at genesis.
//!
//! The defaults mirror the production deployment. Changing the constants
//! after sales exist changes the arithmetic of running sales, so treat this
//! file as consensus-critical.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::LaunchpadError;

// ---------------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------------

/// Denominator for every basis-point quantity. 10_000 bps = 100%.
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Number of fixed-point decimals carried by presale and listing rates.
///
/// A rate of `10^10` means "one whole sale token per whole funding unit"
/// when both assets share the same decimals.
pub const RATE_DECIMALS: u8 = 10;

/// `10^RATE_DECIMALS`, the divisor applied after multiplying by a rate.
pub const RATE_SCALE: u128 = 10_000_000_000;

/// Decimals of the chain's native asset. Listing fees are quoted in it.
pub const NATIVE_DECIMALS: u8 = 18;

/// Identifier of the native asset inside the ledger.
pub const NATIVE_ASSET: &str = "native";

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Maximum number of entries accepted by a single whitelist add/remove call.
pub const MAX_WHITELIST_BATCH: usize = 50;

/// Pool shares permanently retired on the first deposit into a pair, so a
/// pair can never be drained back to an empty reserve.
pub const MINIMUM_LIQUIDITY: u128 = 1_000;

// ---------------------------------------------------------------------------
// Well-known accounts
// ---------------------------------------------------------------------------

/// Retirement sink. Anything sent here is gone for good.
pub const RETIREMENT_SINK: &str = "0x000000000000000000000000000000000000dEaD";

/// Router account. Receives pre-start pass-through value and spends the
/// allowances owners grant for escrow funding and partner fees.
pub const ROUTER_ACCOUNT: &str = "bifrost-router";

/// Custody account of the lock registry.
pub const LOCK_REGISTRY_ACCOUNT: &str = "bifrost-lock-registry";

/// Custody account of the reference liquidity pool.
pub const POOL_ACCOUNT: &str = "bifrost-pool";

/// Prefix of the escrow account derived for every sale.
pub const SALE_ACCOUNT_PREFIX: &str = "bifrost-sale-";

// ---------------------------------------------------------------------------
// Governance defaults
// ---------------------------------------------------------------------------

/// Flat listing fee: 0.01 native.
pub const DEFAULT_LISTING_FEE: u128 = 10_000_000_000_000_000;

/// Protocol cut of successful sales: 1%.
pub const DEFAULT_LAUNCHING_FEE_BPS: u32 = 100;

/// Minimum share of raised funds that must seed the pool: 50%.
pub const DEFAULT_MIN_LIQUIDITY_BPS: u32 = 5_000;

/// Soft cap must be at least 50% of the hard cap.
pub const DEFAULT_MIN_CAP_RATIO_BPS: u32 = 5_000;

/// Minimum liquidity lock, in seconds.
pub const DEFAULT_MIN_UNLOCK_SECS: u64 = 1;

/// Minimum sale duration, in seconds.
pub const DEFAULT_MIN_SALE_SECS: u64 = 1;

/// Maximum sale duration, in seconds. Zero disables the upper bound.
pub const DEFAULT_MAX_SALE_SECS: u64 = 0;

/// Penalty charged on early withdrawal from a running sale: 20%.
pub const DEFAULT_EARLY_WITHDRAW_PENALTY_BPS: u32 = 2_000;

/// Reference to a template that sale or whitelist records are instantiated from.
///
/// `layout` identifies the state layout. Two templates with the same layout
/// can be swapped under running records; different layouts cannot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRef {
    /// Human-readable template name.
    pub name: String,
    /// Monotonic implementation version.
    pub version: u32,
    /// State layout identifier.
    pub layout: u32,
}

impl TemplateRef {
    /// Creates a template reference.
    pub fn new(name: impl Into<String>, version: u32, layout: u32) -> Self {
        Self {
            name: name.into(),
            version,
            layout,
        }
    }
}

impl std::fmt::Display for TemplateRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@v{} (layout {})", self.name, self.version, self.layout)
    }
}

/// Genesis values for every governance tunable.
///
/// Missing JSON fields fall back to the defaults above, so a config file only
/// needs to list what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Flat listing fee in native units.
    pub listing_fee: u128,
    /// Protocol cut of successful sales, in bps.
    pub launching_fee_bps: u32,
    /// Minimum liquidity share, in bps.
    pub min_liquidity_bps: u32,
    /// Minimum soft/hard ratio, in bps.
    pub min_cap_ratio_bps: u32,
    /// Minimum liquidity lock, in seconds.
    pub min_unlock_secs: u64,
    /// Minimum sale duration, in seconds.
    pub min_sale_secs: u64,
    /// Maximum sale duration, in seconds (0 = unbounded).
    pub max_sale_secs: u64,
    /// Early-withdraw penalty, in bps.
    pub early_withdraw_penalty_bps: u32,
    /// Template new sales are instantiated from.
    pub sale_template: TemplateRef,
    /// Template new whitelists are instantiated from.
    pub whitelist_template: TemplateRef,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            listing_fee: DEFAULT_LISTING_FEE,
            launching_fee_bps: DEFAULT_LAUNCHING_FEE_BPS,
            min_liquidity_bps: DEFAULT_MIN_LIQUIDITY_BPS,
            min_cap_ratio_bps: DEFAULT_MIN_CAP_RATIO_BPS,
            min_unlock_secs: DEFAULT_MIN_UNLOCK_SECS,
            min_sale_secs: DEFAULT_MIN_SALE_SECS,
            max_sale_secs: DEFAULT_MAX_SALE_SECS,
            early_withdraw_penalty_bps: DEFAULT_EARLY_WITHDRAW_PENALTY_BPS,
            sale_template: TemplateRef::new("bifrost-sale", 1, 1),
            whitelist_template: TemplateRef::new("bifrost-whitelist", 1, 1),
        }
    }
}

impl SettingsConfig {
    /// Parses a JSON document. Missing fields take their defaults; the
    /// result is not validated.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings config {}", path.display()))?;
        let config = Self::from_json_str(&raw)
            .with_context(|| format!("parsing settings config {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("validating settings config {}", path.display()))?;
        Ok(config)
    }

    /// Checks that every bps field is a valid fraction and that the duration
    /// window is not inverted.
    pub fn validate(&self) -> Result<(), LaunchpadError> {
        for (name, value) in [
            ("launching_fee_bps", self.launching_fee_bps),
            ("min_liquidity_bps", self.min_liquidity_bps),
            ("min_cap_ratio_bps", self.min_cap_ratio_bps),
            ("early_withdraw_penalty_bps", self.early_withdraw_penalty_bps),
        ] {
            check_bps(name, value)?;
        }
        if self.max_sale_secs != 0 && self.max_sale_secs < self.min_sale_secs {
            return Err(LaunchpadError::Validation(format!(
                "max_sale_secs {} is below min_sale_secs {}",
                self.max_sale_secs, self.min_sale_secs
            )));
        }
        Ok(())
    }
}

/// Rejects basis-point values above 100%.
pub(crate) fn check_bps(name: &str, value: u32) -> Result<(), LaunchpadError> {
    if u128::from(value) > BPS_DENOMINATOR {
        return Err(LaunchpadError::Validation(format!(
            "{name} must be at most {BPS_DENOMINATOR} bps, got {value}"
        )));
    }
    Ok(())
}
