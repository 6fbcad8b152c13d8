//! Allocator capability trait
//!
//! Every policy exposes the same per-round surface:
//! - register and remove tenants between rounds
//! - record each tenant's demand, optionally inflated by greedy reporting
//! - `allocate()` once per round, then read allocations back
//!
//! Callers that drive policies uniformly hold a `Box<dyn Allocator>`
//! built by [`build_allocator`].

use crate::policies::{KarmaAllocator, MaxMinAllocator, MpspAllocator, SharpAllocator, StaticAllocator};
use blockshare_common::{PolicyConfig, Result, TenantId};

/// Per-round block allocation policy
pub trait Allocator: Send {
    /// Short policy name
    fn name(&self) -> &'static str;

    /// Register a tenant. Fails if the id is already registered.
    fn add_tenant(&mut self, id: TenantId) -> Result<()>;

    /// Remove a tenant and its carried state. Fails if the id is unknown.
    fn remove_tenant(&mut self, id: TenantId) -> Result<()>;

    /// Record demand for the next round. With `greedy` set the policy
    /// models selfish reporting on the tenant's behalf.
    fn set_demand(&mut self, id: TenantId, demand: u64, greedy: bool) -> Result<()>;

    /// Advance one round
    fn allocate(&mut self);

    /// Blocks granted to `id` by the last round
    fn allocation(&self, id: TenantId) -> Result<u64>;

    /// Blocks a tenant is entitled to under an equal split
    fn fair_share(&self) -> u64;

    fn num_tenants(&self) -> usize;

    /// Total blocks managed by the policy
    fn capacity(&self) -> u64;

    fn set_capacity(&mut self, capacity: u64);

    /// Grow or shrink capacity
    ///
    /// # Panics
    ///
    /// Panics if the result would drop below zero blocks.
    fn add_capacity(&mut self, delta: i64) {
        let capacity = self.capacity() as i64 + delta;
        assert!(
            capacity >= 0,
            "capacity cannot drop below zero (capacity={}, delta={})",
            self.capacity(),
            delta
        );
        self.set_capacity(capacity as u64);
    }

    /// Registered tenants in ascending id order
    fn tenant_ids(&self) -> Vec<TenantId>;

    /// Allocation of every tenant in ascending id order
    fn round_summary(&self) -> Vec<(TenantId, u64)> {
        self.tenant_ids()
            .into_iter()
            .filter_map(|id| self.allocation(id).ok().map(|blocks| (id, blocks)))
            .collect()
    }
}

/// Construct any policy from its configuration
pub fn build_allocator(config: &PolicyConfig) -> Result<Box<dyn Allocator>> {
    config.validate()?;

    let allocator: Box<dyn Allocator> = match *config {
        PolicyConfig::MaxMin { capacity } => Box::new(MaxMinAllocator::new(capacity)),
        PolicyConfig::Static { capacity } => Box::new(StaticAllocator::new(capacity)),
        PolicyConfig::Karma {
            capacity,
            alpha,
            init_credits,
        } => Box::new(KarmaAllocator::new(capacity, alpha, init_credits)?),
        PolicyConfig::Mpsp {
            capacity,
            base_blocks,
            block_value,
            seed,
        } => Box::new(MpspAllocator::with_flat_valuation(
            capacity,
            base_blocks,
            block_value,
            seed,
        )?),
        PolicyConfig::Sharp {
            capacity,
            oversubscription,
            claim_term,
            seed,
        } => Box::new(SharpAllocator::new(
            capacity,
            oversubscription,
            claim_term,
            seed,
        )?),
    };

    Ok(allocator)
}
