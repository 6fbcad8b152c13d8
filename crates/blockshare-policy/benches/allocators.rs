//! Blockshare allocation benchmarks
//!
//! Measures one `allocate()` round per policy as the tenant count grows:
//! - max-min progressive filling
//! - static equal split
//! - Karma tiered redistribution
//! - MPSP auction with exclusion pricing
//! - Sharp claim delegation and lottery redemption

use blockshare_common::{PolicyConfig, TenantId};
use blockshare_policy::{build_allocator, Allocator};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

const FAIR_SHARE: u64 = 10;

fn policies(capacity: u64) -> Vec<PolicyConfig> {
    vec![
        PolicyConfig::MaxMin { capacity },
        PolicyConfig::Static { capacity },
        PolicyConfig::Karma {
            capacity,
            alpha: 0.5,
            init_credits: capacity as i64,
        },
        PolicyConfig::Mpsp {
            capacity,
            base_blocks: capacity / 2,
            block_value: 100,
            seed: 1,
        },
        PolicyConfig::Sharp {
            capacity,
            oversubscription: 2.0,
            claim_term: 2,
            seed: 1,
        },
    ]
}

/// Allocator with `tenants` registered and random demands up to twice the
/// fair share recorded
fn prepared(config: &PolicyConfig, tenants: u32, rng: &mut StdRng) -> Box<dyn Allocator> {
    let mut alloc = build_allocator(config).expect("valid bench config");
    for id in 1..=tenants {
        alloc.add_tenant(TenantId(id)).expect("fresh tenant id");
        let demand = rng.gen_range(0..=FAIR_SHARE * 2);
        alloc
            .set_demand(TenantId(id), demand, false)
            .expect("registered tenant");
    }
    alloc
}

fn bench_allocate(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate");
    group.measurement_time(Duration::from_secs(5));

    for tenants in [10u32, 100, 1000, 10_000] {
        let capacity = FAIR_SHARE * tenants as u64;
        group.throughput(Throughput::Elements(tenants as u64));

        for config in policies(capacity) {
            let mut rng = StdRng::seed_from_u64(42);
            let mut alloc = prepared(&config, tenants, &mut rng);

            group.bench_with_input(
                BenchmarkId::new(config.name(), tenants),
                &tenants,
                |b, _| {
                    b.iter(|| {
                        alloc.allocate();
                        black_box(alloc.allocation(TenantId(1)).ok())
                    });
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_allocate);
criterion_main!(benches);
