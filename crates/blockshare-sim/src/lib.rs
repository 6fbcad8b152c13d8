//! # Blockshare Simulation
//!
//! Replays demand traces against every allocation policy and reports
//! utilization, welfare, fairness and incentive compatibility.
//!
//! ## Components
//!
//! - [`SimulationConfig`]: layered run settings (defaults, file, environment)
//! - [`DemandMatrix`]: per-round demand trace, generated or loaded
//! - [`Simulation`]: drives an allocator through a trace
//! - [`metrics`]: welfare and fairness measures
//!
//! Within a run the first `greedy_pct` percent of tenants report demand
//! selfishly; the rest are honest.

pub mod config;
pub mod demand;
pub mod metrics;
pub mod simulation;

pub use config::SimulationConfig;
pub use demand::DemandMatrix;
pub use simulation::{Simulation, SimulationReport};
