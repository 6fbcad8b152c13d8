//! Simulation configuration
//!
//! Layered: built-in defaults, then an optional config file, then
//! `BLOCKSHARE_`-prefixed environment variables (a `.env` file is honoured).

use blockshare_common::{PolicyConfig, Result, DEFAULT_BLOCK_VALUE, DEFAULT_CLAIM_TERM, DEFAULT_OVERSUBSCRIPTION};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// Simulation run settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Total blocks per round
    pub num_blocks: u64,
    /// Tenants registered as `1..=num_tenants`
    pub num_tenants: usize,
    /// Rounds to simulate
    pub num_rounds: usize,
    /// Seed for demand generation and randomized policies
    pub seed: u64,
    /// Demand trace to load instead of generating one
    pub demands_path: Option<String>,
    /// Shuffle the rounds of a loaded trace
    pub shuffle_demands: bool,
    /// Percentages of selfish tenants to sweep
    pub greedy_percentages: Vec<u32>,
    /// Karma settings
    pub karma: KarmaSettings,
    /// MPSP settings
    pub mpsp: MpspSettings,
    /// Sharp settings
    pub sharp: SharpSettings,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_blocks: 100,
            num_tenants: 10,
            num_rounds: 100,
            seed: 0,
            demands_path: None,
            shuffle_demands: false,
            greedy_percentages: vec![0, 20, 40, 60, 80, 100],
            karma: KarmaSettings::default(),
            mpsp: MpspSettings::default(),
            sharp: SharpSettings::default(),
        }
    }
}

/// Karma settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KarmaSettings {
    /// Fraction of capacity in the subsidy pool
    pub alpha: f64,
    /// Credits of the first tenant; defaults to `num_blocks × num_rounds`
    pub init_credits: Option<i64>,
}

impl Default for KarmaSettings {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            init_credits: None,
        }
    }
}

/// MPSP settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MpspSettings {
    /// Blocks split evenly as guaranteed shares
    pub base_blocks: u64,
    /// Flat per-block valuation
    pub block_value: u64,
}

impl Default for MpspSettings {
    fn default() -> Self {
        Self {
            base_blocks: 0,
            block_value: DEFAULT_BLOCK_VALUE,
        }
    }
}

/// Sharp settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharpSettings {
    /// Tickets minted per block
    pub oversubscription: f64,
    /// Rounds a claim stays redeemable
    pub claim_term: u32,
}

impl Default for SharpSettings {
    fn default() -> Self {
        Self {
            oversubscription: DEFAULT_OVERSUBSCRIPTION,
            claim_term: DEFAULT_CLAIM_TERM,
        }
    }
}

impl SimulationConfig {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&str>) -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();

        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }
        let config = builder
            .add_source(
                Environment::with_prefix("BLOCKSHARE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Fair share of an equal split
    pub fn fair_share(&self) -> u64 {
        match self.num_tenants {
            0 => 0,
            n => self.num_blocks / n as u64,
        }
    }

    /// Configuration of every policy under comparison
    pub fn policies(&self) -> Vec<PolicyConfig> {
        let capacity = self.num_blocks;
        let init_credits = self
            .karma
            .init_credits
            .unwrap_or((self.num_blocks * self.num_rounds as u64) as i64);

        vec![
            PolicyConfig::Static { capacity },
            PolicyConfig::MaxMin { capacity },
            PolicyConfig::Karma {
                capacity,
                alpha: self.karma.alpha,
                init_credits,
            },
            PolicyConfig::Mpsp {
                capacity,
                base_blocks: self.mpsp.base_blocks,
                block_value: self.mpsp.block_value,
                seed: self.seed,
            },
            PolicyConfig::Sharp {
                capacity,
                oversubscription: self.sharp.oversubscription,
                claim_term: self.sharp.claim_term,
                seed: self.seed,
            },
        ]
    }
}
