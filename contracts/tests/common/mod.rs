//! Shared fixtures for the launchpad integration tests.

#![allow(dead_code)]

use bifrost_contracts::config::RATE_SCALE;
use bifrost_contracts::prelude::*;
use chrono::{DateTime, Duration, TimeZone, Utc};

/// One whole unit of an 18-decimal asset.
pub const UNIT: Amount = 1_000_000_000_000_000_000;

pub const ADMIN: &str = "admin";
pub const TREASURY: &str = "treasury";
pub const OWNER: &str = "project-owner";
pub const CONTRIBUTORS: [&str; 3] = ["alice", "bob", "carol"];

/// A launchpad with a funded project owner and three funded contributors.
pub struct World {
    pub lp: Launchpad,
    pub genesis: DateTime<Utc>,
    pub token: AssetId,
}

impl World {
    pub fn new() -> Self {
        let mut lp: Launchpad = Launchpad::from_config(
            Address::from(ADMIN),
            Address::from(TREASURY),
            SettingsConfig::default(),
            InMemoryLedger::new(),
            ConstantProductPool::new(),
        )
        .unwrap();

        let token = AssetId::from("TKN");
        let owner = Address::from(OWNER);
        let router = lp.settings().router().clone();
        let native = AssetId::native();

        let ledger = lp.ledger_mut();
        ledger.create_asset(&token, 18, &owner).unwrap();
        ledger.mint(&token, &owner, &owner, 1_000_000 * 1_000 * UNIT).unwrap();
        ledger.approve(&token, &owner, &router, Amount::MAX).unwrap();
        ledger.credit(&native, &owner, 100 * UNIT).unwrap();
        for name in CONTRIBUTORS {
            ledger.credit(&native, &Address::from(name), 1_000 * UNIT).unwrap();
        }

        Self {
            lp,
            genesis: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            token,
        }
    }

    /// Context for `who` at `secs` seconds after genesis.
    pub fn at(&self, who: &str, secs: i64) -> CallContext {
        CallContext::new(who, self.genesis + Duration::seconds(secs))
    }

    /// Context for `who` at `secs` seconds after the sale's start.
    pub fn after_start(&self, sale: SaleId, who: &str, secs: i64) -> CallContext {
        let start = self.lp.sale(sale).unwrap().params().start;
        CallContext::new(who, start + Duration::seconds(secs))
    }

    /// Context for `who` at `secs` seconds after the sale's end.
    pub fn after_end(&self, sale: SaleId, who: &str, secs: i64) -> CallContext {
        let end = self.lp.sale(sale).unwrap().params().end;
        CallContext::new(who, end + Duration::seconds(secs))
    }

    /// Creates a native-funded sale paying the flat fee.
    pub fn create_sale(&mut self, params: SaleParameters) -> SaleId {
        let fee = self.lp.settings().listing_fee();
        let ctx = self.at(OWNER, 0);
        self.lp
            .create_sale(&ctx, self.token.clone(), AssetId::native(), params, fee)
            .unwrap()
    }

    pub fn balance(&self, asset: &AssetId, who: &str) -> Amount {
        self.lp.ledger().balance_of(asset, &Address::from(who))
    }

    pub fn native(&self, who: &str) -> Amount {
        self.balance(&AssetId::native(), who)
    }
}

/// Soft 50, hard 100 (whole native units); 100 tokens per unit at presale,
/// 80 at listing; 60% liquidity locked for a day. Starts an hour after
/// genesis and runs for a day.
pub fn params(genesis: DateTime<Utc>) -> SaleParameters {
    SaleParameters {
        soft_cap: 50 * UNIT,
        hard_cap: 100 * UNIT,
        min_contribution: UNIT / 10,
        max_contribution: 100 * UNIT,
        presale_rate: 100 * RATE_SCALE,
        listing_rate: 80 * RATE_SCALE,
        liquidity_bps: 6_000,
        start: genesis + Duration::hours(1),
        end: genesis + Duration::hours(25),
        unlock_secs: 86_400,
        whitelisted: false,
    }
}

/// Asserts that `result` failed with `kind`.
pub fn assert_kind<T: std::fmt::Debug>(result: Result<T, LaunchpadError>, kind: ErrorKind) {
    match result {
        Err(err) => assert_eq!(err.kind(), kind, "unexpected error: {err}"),
        Ok(value) => panic!("expected {kind:?} error, got Ok({value:?})"),
    }
}
