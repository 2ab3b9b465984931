//! # Price Feed
//!
//! Converts amounts quoted in the native asset into other assets, so the
//! listing fee can be paid in a partner asset. Each asset has one recorded
//! rate: how many whole units of the asset one whole native unit buys,
//! as a fixed-point number with its own decimals.
//!
//! Discounts are not applied here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::NATIVE_DECIMALS;
use crate::error::LaunchpadError;
use crate::math::{mul_div, pow10, MathError};
use crate::types::{Address, Amount, AssetId};

/// Exchange rate of one asset against the native asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRate {
    /// Whole asset units per whole native unit, scaled by `10^rate_decimals`.
    pub rate: Amount,
    /// Fixed-point decimals of `rate`.
    pub rate_decimals: u8,
    /// Decimal precision of the quoted asset.
    pub asset_decimals: u8,
}

/// Administrator-maintained table of exchange rates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceFeed {
    admin: Address,
    rates: BTreeMap<AssetId, PriceRate>,
}

impl PriceFeed {
    /// Creates an empty feed administered by `admin`.
    pub fn new(admin: Address) -> Self {
        Self {
            admin,
            rates: BTreeMap::new(),
        }
    }

    /// The feed administrator.
    pub fn admin(&self) -> &Address {
        &self.admin
    }

    /// Hands administration to `new_admin`.
    pub fn transfer_admin(&mut self, caller: &Address, new_admin: Address) -> Result<(), LaunchpadError> {
        self.ensure_admin(caller)?;
        self.admin = new_admin;
        Ok(())
    }

    /// Records or replaces the rate for `asset`.
    pub fn set_rate(
        &mut self,
        caller: &Address,
        asset: AssetId,
        rate: PriceRate,
    ) -> Result<(), LaunchpadError> {
        self.ensure_admin(caller)?;
        if rate.rate == 0 {
            return Err(LaunchpadError::Validation(format!("zero rate for {asset}")));
        }
        // Surface unrepresentable precisions now rather than at conversion time.
        pow10(rate.rate_decimals)?;
        pow10(rate.asset_decimals)?;

        tracing::info!(%asset, rate = rate.rate, rate_decimals = rate.rate_decimals, "price rate set");
        self.rates.insert(asset, rate);
        Ok(())
    }

    /// Recorded rate for `asset`.
    pub fn rate(&self, asset: &AssetId) -> Option<&PriceRate> {
        self.rates.get(asset)
    }

    /// Converts `native_amount` (native smallest units) into smallest units of
    /// `asset`, flooring. A result of zero is an arithmetic error: a fee that
    /// rounds to nothing is never silently waived.
    pub fn convert(&self, native_amount: Amount, asset: &AssetId) -> Result<Amount, LaunchpadError> {
        if asset.is_native() {
            return Ok(native_amount);
        }
        let rate = self
            .rates
            .get(asset)
            .ok_or_else(|| LaunchpadError::NotFound(format!("no price for {asset}")))?;

        // amount * rate * 10^asset_decimals / (10^rate_decimals * 10^NATIVE_DECIMALS),
        // floored once.
        let (factor, denom) = if rate.asset_decimals >= NATIVE_DECIMALS {
            let up = pow10(rate.asset_decimals - NATIVE_DECIMALS)?;
            let factor = rate.rate.checked_mul(up).ok_or(MathError::Overflow("convert"))?;
            (factor, pow10(rate.rate_decimals)?)
        } else {
            let down = pow10(NATIVE_DECIMALS - rate.asset_decimals)?;
            let denom = pow10(rate.rate_decimals)?
                .checked_mul(down)
                .ok_or(MathError::Overflow("convert"))?;
            (rate.rate, denom)
        };
        let converted = mul_div(native_amount, factor, denom)?;
        if converted == 0 && native_amount > 0 {
            return Err(LaunchpadError::Arithmetic(format!(
                "{native_amount} native converts to zero {asset}"
            )));
        }
        Ok(converted)
    }

    fn ensure_admin(&self, caller: &Address) -> Result<(), LaunchpadError> {
        if caller != &self.admin {
            return Err(LaunchpadError::unauthorized(caller, "price feed admin"));
        }
        Ok(())
    }
}
