// Launchpad benchmarks.
//
// Covers the fixed-point helpers on the finalize path, a single deposit
// including the rollback checkpoint, and a full sale lifecycle with a
// growing number of contributors.

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use bifrost_contracts::config::RATE_SCALE;
use bifrost_contracts::math::{sqrt_product, tokens_for};
use bifrost_contracts::prelude::*;

const UNIT: Amount = 1_000_000_000_000_000_000;

/// A launchpad with a funded owner and `contributors` funded wallets, plus
/// an open sale. Returns the engine, the sale and its start time.
fn setup(contributors: usize) -> (Launchpad, SaleId, chrono::DateTime<Utc>) {
    let mut lp: Launchpad = Launchpad::from_config(
        Address::from("admin"),
        Address::from("treasury"),
        SettingsConfig::default(),
        InMemoryLedger::new(),
        ConstantProductPool::new(),
    )
    .unwrap();

    let token = AssetId::from("TKN");
    let owner = Address::from("owner");
    let router = lp.settings().router().clone();
    let native = AssetId::native();
    let ledger = lp.ledger_mut();
    ledger.create_asset(&token, 18, &owner).unwrap();
    ledger.mint(&token, &owner, &owner, 1_000_000_000 * UNIT).unwrap();
    ledger.approve(&token, &owner, &router, Amount::MAX).unwrap();
    ledger.credit(&native, &owner, UNIT).unwrap();
    for i in 0..contributors {
        ledger
            .credit(&native, &Address::new(format!("c{i}")), 10 * UNIT)
            .unwrap();
    }

    let genesis = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let hard_cap = (contributors.max(1) as Amount) * UNIT;
    let params = SaleParameters {
        soft_cap: hard_cap / 2,
        hard_cap,
        min_contribution: 1,
        max_contribution: UNIT,
        presale_rate: 100 * RATE_SCALE,
        listing_rate: 80 * RATE_SCALE,
        liquidity_bps: 6_000,
        start: genesis + Duration::hours(1),
        end: genesis + Duration::hours(2),
        unlock_secs: 60,
        whitelisted: false,
    };
    let fee = lp.settings().listing_fee();
    let start = params.start;
    let sale = lp
        .create_sale(&CallContext::new("owner", genesis), token, native, params, fee)
        .unwrap();
    (lp, sale, start)
}

fn bench_math(c: &mut Criterion) {
    c.bench_function("math/tokens_for", |b| {
        b.iter(|| tokens_for(black_box(55 * UNIT), black_box(100 * RATE_SCALE), 18, 6).unwrap());
    });
    c.bench_function("math/sqrt_product", |b| {
        b.iter(|| sqrt_product(black_box(u128::MAX / 3), black_box(u128::MAX / 7)));
    });
}

fn bench_deposit(c: &mut Criterion) {
    let (lp, sale, start) = setup(1);
    let ctx = CallContext::new("c0", start);

    c.bench_function("sale/deposit", |b| {
        b.iter_batched(
            || lp.clone(),
            |mut lp| lp.deposit(&ctx, sale, UNIT / 2).unwrap(),
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("sale/lifecycle");
    group.sample_size(20);

    for contributors in [10usize, 50, 200] {
        group.throughput(Throughput::Elements(contributors as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(contributors),
            &contributors,
            |b, &n| {
                b.iter_batched(
                    || setup(n),
                    |(mut lp, sale, start)| {
                        for i in 0..n {
                            let ctx = CallContext::new(Address::new(format!("c{i}")), start);
                            lp.deposit(&ctx, sale, UNIT).unwrap();
                        }
                        let end = lp.sale(sale).unwrap().params().end;
                        lp.finalize(&CallContext::new("owner", end), sale).unwrap();
                        for i in 0..n {
                            let ctx = CallContext::new(Address::new(format!("c{i}")), end);
                            lp.withdraw(&ctx, sale).unwrap();
                        }
                    },
                    criterion::BatchSize::LargeInput,
                );
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_math, bench_deposit, bench_lifecycle);
criterion_main!(benches);
