//! Blockshare Simulation Binary
//!
//! Sweeps the configured selfish-tenant percentages over every policy and
//! prints one JSON report per run on stdout.

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use blockshare_common::{PolicyConfig, VERSION};
use blockshare_policy::{build_allocator, MpspAllocator, SharpAllocator};
use blockshare_sim::{DemandMatrix, Simulation, SimulationConfig, SimulationReport};

fn main() -> Result<()> {
    // Initialize tracing; stdout carries the reports
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Blockshare simulation v{}", VERSION);

    let path = std::env::args().nth(1);
    let config = SimulationConfig::load(path.as_deref()).context("loading configuration")?;
    info!("Loaded configuration: {:?}", config);

    let demands = match &config.demands_path {
        Some(path) => {
            let mut demands = DemandMatrix::load(path, config.num_tenants, config.num_rounds)?;
            if config.shuffle_demands {
                demands.shuffle_rounds(config.seed);
            }
            demands
        }
        None => DemandMatrix::uniform(
            config.num_tenants,
            config.num_rounds,
            config.fair_share() * 2,
            config.seed,
        ),
    };
    info!(
        tenants = demands.num_tenants(),
        rounds = demands.num_rounds(),
        "Demand trace ready"
    );

    for &greedy_pct in &config.greedy_percentages {
        let sim = Simulation::new(greedy_pct)?;
        for policy in config.policies() {
            let report = run_policy(&sim, &policy, &demands)
                .with_context(|| format!("simulating {}", policy.name()))?;
            println!("{}", serde_json::to_string(&report)?);
        }
    }

    info!("Simulation sweep complete");
    Ok(())
}

fn run_policy(
    sim: &Simulation,
    policy: &PolicyConfig,
    demands: &DemandMatrix,
) -> blockshare_common::Result<SimulationReport> {
    match *policy {
        PolicyConfig::Mpsp {
            capacity,
            base_blocks,
            block_value,
            seed,
        } => {
            policy.validate()?;
            let mut alloc =
                MpspAllocator::with_flat_valuation(capacity, base_blocks, block_value, seed)?;
            sim.run_mpsp(&mut alloc, demands)
        }
        PolicyConfig::Sharp {
            capacity,
            oversubscription,
            claim_term,
            seed,
        } => {
            policy.validate()?;
            let mut alloc = SharpAllocator::new(capacity, oversubscription, claim_term, seed)?;
            sim.run_sharp(&mut alloc, demands)
        }
        _ => {
            let mut alloc = build_allocator(policy)?;
            sim.run(alloc.as_mut(), demands)
        }
    }
}
