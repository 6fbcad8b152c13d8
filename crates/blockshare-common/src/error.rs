//! Error types for Blockshare
//!
//! Usage errors are recoverable and reported to the caller. Broken internal
//! invariants are not represented here; allocators assert on those.

use crate::types::tenant::TenantId;
use thiserror::Error;

/// Result type alias using QuotaError
pub type Result<T> = std::result::Result<T, QuotaError>;

/// Unified error type for Blockshare operations
#[derive(Debug, Error)]
pub enum QuotaError {
    // Tenant registry errors
    #[error("Tenant error: {0}")]
    Tenant(#[from] TenantError),

    // Construction parameter errors
    #[error("Parameter error: {0}")]
    Parameter(#[from] ParameterError),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Tenant registration and lookup errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TenantError {
    #[error("Tenant {0} already exists")]
    AlreadyExists(TenantId),

    #[error("Tenant {0} does not exist")]
    NotFound(TenantId),
}

/// Out-of-range policy construction parameters
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Public fraction alpha must be within [0, 1], got {0}")]
    AlphaOutOfRange(f64),

    #[error("Base blocks exceed capacity: {base} > {capacity}")]
    BaseBlocksExceedCapacity { base: u64, capacity: u64 },

    #[error("Bid quantity and price must be non-negative: quantity={quantity}, price={price}")]
    NegativeBid { quantity: i64, price: i64 },

    #[error("Oversubscription degree must be finite and non-negative, got {0}")]
    OversubscriptionOutOfRange(f64),

    #[error("Claim term must be at least one round")]
    ZeroClaimTerm,
}

impl From<serde_json::Error> for QuotaError {
    fn from(err: serde_json::Error) -> Self {
        QuotaError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for QuotaError {
    fn from(err: std::io::Error) -> Self {
        QuotaError::Config(err.to_string())
    }
}

impl From<config::ConfigError> for QuotaError {
    fn from(err: config::ConfigError) -> Self {
        QuotaError::Config(err.to_string())
    }
}

impl From<anyhow::Error> for QuotaError {
    fn from(err: anyhow::Error) -> Self {
        QuotaError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QuotaError::Tenant(TenantError::NotFound(TenantId(7)));
        assert!(err.to_string().contains("Tenant 7 does not exist"));
    }

    #[test]
    fn test_parameter_error() {
        let err = ParameterError::BaseBlocksExceedCapacity {
            base: 10,
            capacity: 4,
        };
        assert!(err.to_string().contains("10 > 4"));
    }

    #[test]
    fn test_from_tenant_error() {
        let err: QuotaError = TenantError::AlreadyExists(TenantId(1)).into();
        assert!(matches!(
            err,
            QuotaError::Tenant(TenantError::AlreadyExists(TenantId(1)))
        ));
    }
}
