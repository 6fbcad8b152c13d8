//! Full-sweep properties: every policy over random traces stays within
//! capacity and reports bounded metrics.

use blockshare_common::PolicyConfig;
use blockshare_policy::{build_allocator, MpspAllocator, SharpAllocator};
use blockshare_sim::{DemandMatrix, Simulation, SimulationConfig, SimulationReport};
use proptest::prelude::*;

fn run_all(
    config: &SimulationConfig,
    demands: &DemandMatrix,
    greedy_pct: u32,
) -> Vec<SimulationReport> {
    let sim = Simulation::new(greedy_pct).unwrap();
    config
        .policies()
        .iter()
        .map(|policy| match *policy {
            PolicyConfig::Mpsp {
                capacity,
                base_blocks,
                block_value,
                seed,
            } => {
                let mut alloc =
                    MpspAllocator::with_flat_valuation(capacity, base_blocks, block_value, seed)
                        .unwrap();
                sim.run_mpsp(&mut alloc, demands).unwrap()
            }
            PolicyConfig::Sharp {
                capacity,
                oversubscription,
                claim_term,
                seed,
            } => {
                let mut alloc =
                    SharpAllocator::new(capacity, oversubscription, claim_term, seed).unwrap();
                sim.run_sharp(&mut alloc, demands).unwrap()
            }
            _ => {
                let mut alloc = build_allocator(policy).unwrap();
                sim.run(alloc.as_mut(), demands).unwrap()
            }
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn metrics_are_bounded(
        tenants in 1usize..8,
        rounds in 1usize..12,
        blocks in 1u64..40,
        greedy_pct in prop::sample::select(vec![0u32, 20, 50, 100]),
        seed in any::<u64>(),
    ) {
        let config = SimulationConfig {
            num_blocks: blocks,
            num_tenants: tenants,
            num_rounds: rounds,
            seed,
            ..SimulationConfig::default()
        };
        let demands = DemandMatrix::uniform(tenants, rounds, blocks, seed);

        for report in run_all(&config, &demands, greedy_pct) {
            prop_assert!(report.avg_utilization <= 1.0 + 1e-9, "{}", report.policy);
            prop_assert!((0.0..=1.0 + 1e-9).contains(&report.avg_welfare), "{}", report.policy);
            prop_assert!((0.0..=1.0 + 1e-9).contains(&report.fairness), "{}", report.policy);
        }
    }
}

#[test]
fn test_sweep_reports_every_policy() {
    let config = SimulationConfig {
        num_blocks: 20,
        num_tenants: 4,
        num_rounds: 10,
        ..SimulationConfig::default()
    };
    let demands = DemandMatrix::uniform(4, 10, 10, 7);
    let reports = run_all(&config, &demands, 50);

    let names: Vec<_> = reports.iter().map(|r| r.policy.as_str()).collect();
    assert_eq!(names, vec!["static", "max_min", "karma", "mpsp", "sharp"]);
    assert_eq!(reports[3].lowest_accepted.len(), 10);
    assert_eq!(reports[4].available_tickets.len(), 10);

    // Max-min never leaves requested capacity idle
    let maxmin = &reports[1];
    let static_split = &reports[0];
    assert!(maxmin.avg_utilization >= static_split.avg_utilization);
}
