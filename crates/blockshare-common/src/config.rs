//! Policy configuration
//!
//! Declarative description of an allocation policy and its construction
//! parameters. Validation reports out-of-range parameters as usage errors
//! before any allocator is built.

use crate::error::{ParameterError, Result};
use serde::{Deserialize, Serialize};

/// Construction parameters for one allocation policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum PolicyConfig {
    /// Max-min fair water-filling
    MaxMin { capacity: u64 },

    /// Equal split regardless of demand
    Static { capacity: u64 },

    /// Credit-based barter
    Karma {
        capacity: u64,
        /// Fraction of capacity carved out as the public subsidy pool
        alpha: f64,
        /// Credits endowed to the first tenant
        init_credits: i64,
    },

    /// Sealed-bid multi-unit auction with exclusion pricing
    Mpsp {
        capacity: u64,
        /// Blocks split evenly as guaranteed base shares
        base_blocks: u64,
        /// Flat per-block valuation used to price bids
        #[serde(default = "default_block_value")]
        block_value: u64,
        #[serde(default)]
        seed: u64,
    },

    /// Claim delegation with expiring tickets
    Sharp {
        capacity: u64,
        /// Tickets minted per block of real capacity
        #[serde(default = "default_oversubscription")]
        oversubscription: f64,
        /// Rounds a claim remains redeemable
        #[serde(default = "default_claim_term")]
        claim_term: u32,
        #[serde(default)]
        seed: u64,
    },
}

fn default_block_value() -> u64 {
    crate::DEFAULT_BLOCK_VALUE
}

fn default_oversubscription() -> f64 {
    crate::DEFAULT_OVERSUBSCRIPTION
}

fn default_claim_term() -> u32 {
    crate::DEFAULT_CLAIM_TERM
}

impl PolicyConfig {
    /// Short policy name, matching the serde tag
    pub fn name(&self) -> &'static str {
        match self {
            PolicyConfig::MaxMin { .. } => "max_min",
            PolicyConfig::Static { .. } => "static",
            PolicyConfig::Karma { .. } => "karma",
            PolicyConfig::Mpsp { .. } => "mpsp",
            PolicyConfig::Sharp { .. } => "sharp",
        }
    }

    /// Total blocks managed by the policy
    pub fn capacity(&self) -> u64 {
        match self {
            PolicyConfig::MaxMin { capacity }
            | PolicyConfig::Static { capacity }
            | PolicyConfig::Karma { capacity, .. }
            | PolicyConfig::Mpsp { capacity, .. }
            | PolicyConfig::Sharp { capacity, .. } => *capacity,
        }
    }

    /// Check construction parameters
    pub fn validate(&self) -> Result<()> {
        match self {
            PolicyConfig::MaxMin { .. } | PolicyConfig::Static { .. } => Ok(()),
            PolicyConfig::Karma { alpha, .. } => {
                if !(0.0..=1.0).contains(alpha) {
                    return Err(ParameterError::AlphaOutOfRange(*alpha).into());
                }
                Ok(())
            }
            PolicyConfig::Mpsp {
                capacity,
                base_blocks,
                ..
            } => {
                if base_blocks > capacity {
                    return Err(ParameterError::BaseBlocksExceedCapacity {
                        base: *base_blocks,
                        capacity: *capacity,
                    }
                    .into());
                }
                Ok(())
            }
            PolicyConfig::Sharp {
                oversubscription,
                claim_term,
                ..
            } => {
                if !oversubscription.is_finite() || *oversubscription < 0.0 {
                    return Err(ParameterError::OversubscriptionOutOfRange(*oversubscription).into());
                }
                if *claim_term == 0 {
                    return Err(ParameterError::ZeroClaimTerm.into());
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QuotaError;

    #[test]
    fn test_karma_alpha_range() {
        let cfg = PolicyConfig::Karma {
            capacity: 4,
            alpha: 1.5,
            init_credits: 0,
        };
        assert!(matches!(
            cfg.validate(),
            Err(QuotaError::Parameter(ParameterError::AlphaOutOfRange(_)))
        ));

        let cfg = PolicyConfig::Karma {
            capacity: 4,
            alpha: 0.5,
            init_credits: 0,
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_mpsp_base_blocks() {
        let cfg = PolicyConfig::Mpsp {
            capacity: 4,
            base_blocks: 5,
            block_value: 100,
            seed: 0,
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_sharp_claim_term() {
        let cfg = PolicyConfig::Sharp {
            capacity: 4,
            oversubscription: 2.0,
            claim_term: 0,
            seed: 0,
        };
        assert!(matches!(
            cfg.validate(),
            Err(QuotaError::Parameter(ParameterError::ZeroClaimTerm))
        ));
    }

    #[test]
    fn test_deserialize_tagged() {
        let json = r#"{"policy":"sharp","capacity":8}"#;
        let cfg: PolicyConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            cfg,
            PolicyConfig::Sharp {
                capacity: 8,
                oversubscription: 2.0,
                claim_term: 2,
                seed: 0,
            }
        );
        assert_eq!(cfg.name(), "sharp");
        assert_eq!(cfg.capacity(), 8);
    }
}
