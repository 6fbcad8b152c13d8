//! Demand traces
//!
//! A [`DemandMatrix`] holds one row of per-tenant demands for every round.
//! Traces are generated from a seeded uniform distribution or parsed from
//! whitespace-separated integers in row-major order.

use blockshare_common::{QuotaError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// `rounds × tenants` demand trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemandMatrix {
    tenants: usize,
    rows: Vec<Vec<u64>>,
}

impl DemandMatrix {
    /// Build from explicit rows; every row must cover the same tenants
    pub fn from_rows(rows: Vec<Vec<u64>>) -> Result<Self> {
        let tenants = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().position(|row| row.len() != tenants) {
            return Err(QuotaError::Config(format!(
                "Round {} has {} demands, expected {}",
                bad,
                rows[bad].len(),
                tenants
            )));
        }
        Ok(Self { tenants, rows })
    }

    /// Demands drawn uniformly from `0..=max_demand`
    pub fn uniform(tenants: usize, rounds: usize, max_demand: u64, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let rows = (0..rounds)
            .map(|_| (0..tenants).map(|_| rng.gen_range(0..=max_demand)).collect())
            .collect();
        Self { tenants, rows }
    }

    /// Parse `tenants × rounds` whitespace-separated demands. Extra values
    /// are ignored.
    pub fn parse(text: &str, tenants: usize, rounds: usize) -> Result<Self> {
        let mut values = text.split_whitespace();
        let mut rows = Vec::with_capacity(rounds);

        for t in 0..rounds {
            let mut row = Vec::with_capacity(tenants);
            for i in 0..tenants {
                let token = values.next().ok_or_else(|| {
                    QuotaError::Config(format!(
                        "Demand trace ended at round {} tenant {}",
                        t, i
                    ))
                })?;
                let demand = token.parse::<u64>().map_err(|e| {
                    QuotaError::Config(format!("Invalid demand {:?}: {}", token, e))
                })?;
                row.push(demand);
            }
            rows.push(row);
        }

        Ok(Self { tenants, rows })
    }

    /// Read a trace file
    pub fn load(path: impl AsRef<Path>, tenants: usize, rounds: usize) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            QuotaError::Config(format!(
                "Failed to read demand trace {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::parse(&text, tenants, rounds)
    }

    /// Reorder rounds at random
    pub fn shuffle_rounds(&mut self, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        self.rows.shuffle(&mut rng);
    }

    pub fn num_tenants(&self) -> usize {
        self.tenants
    }

    pub fn num_rounds(&self) -> usize {
        self.rows.len()
    }

    /// Demands of every tenant in round `t`
    pub fn round(&self, t: usize) -> &[u64] {
        &self.rows[t]
    }

    pub fn rows(&self) -> &[Vec<u64>] {
        &self.rows
    }
}
