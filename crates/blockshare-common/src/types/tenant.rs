//! TenantId - handle of a registered tenant
//!
//! Tenant ids are chosen by the caller and must be unique among the tenants
//! currently registered with an allocator.

use serde::{Deserialize, Serialize};

/// Unique handle of a tenant within one allocator instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub u32);

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
