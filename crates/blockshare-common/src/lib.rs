//! # Blockshare Common
//!
//! Shared types, errors, and configuration for the Blockshare quota engine.
//!
//! ## Core Types
//!
//! - [`TenantId`]: handle of a registered tenant
//! - [`Bid`]/[`BorderBids`]: sealed-bid auction offers and clearing prices
//! - [`Claim`]: time-limited ticket grant redeemable against capacity
//! - [`PolicyConfig`]: declarative description of an allocation policy
//!
//! ## Errors
//!
//! - [`QuotaError`]: usage errors reported to callers (duplicate or unknown
//!   tenants, out-of-range construction parameters)

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use config::PolicyConfig;
pub use error::{ParameterError, QuotaError, Result, TenantError};
pub use types::{
    bid::{Bid, BorderBids},
    claim::Claim,
    tenant::TenantId,
};

/// Blockshare version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum absolute price jitter applied to greedy auction bids
pub const GREEDY_PRICE_JITTER: i64 = 10;

/// Default Sharp oversubscription degree (tickets minted per block)
pub const DEFAULT_OVERSUBSCRIPTION: f64 = 2.0;

/// Default Sharp claim term in rounds
pub const DEFAULT_CLAIM_TERM: u32 = 2;

/// Default per-block value for auction valuations
pub const DEFAULT_BLOCK_VALUE: u64 = 100;
