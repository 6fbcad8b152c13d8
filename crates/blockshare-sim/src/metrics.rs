//! Run metrics
//!
//! - utilization: fraction of capacity spent on real demand
//! - welfare: per tenant, blocks used over blocks demanded (1 with no demand)
//! - priced welfare: welfare scaled by what the tenant paid per block
//! - fairness: min/max welfare ratio, optionally over a tail of tenants
//!
//! Matrices are indexed `[round][tenant]`.

use blockshare_policy::Valuation;

/// Blocks actually used, summed over all rounds, divided by the blocks
/// offered over the same rounds
pub fn utilization(demands: &[Vec<u64>], allocations: &[Vec<u64>], blocks: u64) -> f64 {
    if blocks == 0 || demands.is_empty() {
        return 0.0;
    }

    let used: u64 = demands
        .iter()
        .zip(allocations)
        .flat_map(|(d, a)| d.iter().zip(a).map(|(d, a)| (*d).min(*a)))
        .sum();
    used as f64 / (blocks * demands.len() as u64) as f64
}

/// Per-tenant share of demand actually served
pub fn welfares(demands: &[Vec<u64>], allocations: &[Vec<u64>]) -> Vec<f64> {
    let tenants = demands.first().map_or(0, Vec::len);

    (0..tenants)
        .map(|i| {
            let (used, wanted) = demands.iter().zip(allocations).fold(
                (0u64, 0u64),
                |(used, wanted), (d, a)| (used + d[i].min(a[i]), wanted + d[i]),
            );
            if wanted > 0 {
                used as f64 / wanted as f64
            } else {
                1.0
            }
        })
        .collect()
}

/// Value a tenant extracts from a round: blocks used, scaled by its
/// valuation relative to the per-block price it paid. Unpriced rounds
/// count blocks used.
fn priced_value(demand: u64, allocation: u64, payment: u64, valuation: &Valuation) -> f64 {
    let used = demand.min(allocation) as f64;
    if payment == 0 {
        return used;
    }
    let value = used * valuation(demand) as f64 / payment as f64;
    value.min(demand as f64)
}

/// Per-tenant welfare accounting for auction payments
pub fn priced_welfares(
    demands: &[Vec<u64>],
    allocations: &[Vec<u64>],
    payments: &[Vec<u64>],
    valuation: &Valuation,
) -> Vec<f64> {
    let tenants = demands.first().map_or(0, Vec::len);

    (0..tenants)
        .map(|i| {
            let mut actual = 0.0;
            let mut expected = 0.0;
            for ((d, a), p) in demands.iter().zip(allocations).zip(payments) {
                if d[i] > 0 {
                    actual += priced_value(d[i], a[i], p[i], valuation);
                    expected += d[i] as f64;
                }
            }
            if expected > 0.0 {
                actual / expected
            } else {
                1.0
            }
        })
        .collect()
}

fn min_max_ratio(values: impl Iterator<Item = f64>) -> f64 {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if max > 0.0 {
        min / max
    } else {
        1.0
    }
}

/// Min/max welfare ratio over tenants `from..`
pub fn fairness(welfares: &[f64], from: usize) -> f64 {
    min_max_ratio(welfares.iter().skip(from).copied())
}

/// Fairness of a single round over tenants `from..`
pub fn instant_fairness(demands: &[u64], allocations: &[u64], from: usize) -> f64 {
    min_max_ratio(
        demands
            .iter()
            .zip(allocations)
            .skip(from)
            .map(|(d, a)| round_welfare(*d, (*d).min(*a) as f64)),
    )
}

/// Fairness of a single auction round over tenants `from..`
pub fn instant_priced_fairness(
    demands: &[u64],
    allocations: &[u64],
    payments: &[u64],
    valuation: &Valuation,
    from: usize,
) -> f64 {
    min_max_ratio(
        demands
            .iter()
            .zip(allocations)
            .zip(payments)
            .skip(from)
            .map(|((d, a), p)| round_welfare(*d, priced_value(*d, *a, *p, valuation))),
    )
}

fn round_welfare(demand: u64, value: f64) -> f64 {
    if demand > 0 {
        value / demand as f64
    } else {
        1.0
    }
}

/// Mean of `values[a..b]`, 0 for an empty range
pub fn range_average(values: &[f64], a: usize, b: usize) -> f64 {
    assert!(b >= a, "range end {} before start {}", b, a);
    if b == a {
        return 0.0;
    }
    values[a..b].iter().sum::<f64>() / (b - a) as f64
}
