//! Static equal split: every tenant receives `capacity / tenants`, demand
//! is recorded but ignored.

use crate::allocator::Allocator;
use blockshare_common::{Result, TenantError, TenantId};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Default)]
struct Tenant {
    allocation: u64,
}

/// Demand-oblivious equal-split allocator
#[derive(Debug, Clone)]
pub struct StaticAllocator {
    capacity: u64,
    tenants: BTreeMap<TenantId, Tenant>,
}

impl StaticAllocator {
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            tenants: BTreeMap::new(),
        }
    }
}

impl Allocator for StaticAllocator {
    fn name(&self) -> &'static str {
        "static"
    }

    fn add_tenant(&mut self, id: TenantId) -> Result<()> {
        if self.tenants.contains_key(&id) {
            return Err(TenantError::AlreadyExists(id).into());
        }
        self.tenants.insert(id, Tenant::default());
        Ok(())
    }

    fn remove_tenant(&mut self, id: TenantId) -> Result<()> {
        self.tenants
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| TenantError::NotFound(id).into())
    }

    fn set_demand(&mut self, id: TenantId, _demand: u64, _greedy: bool) -> Result<()> {
        if !self.tenants.contains_key(&id) {
            return Err(TenantError::NotFound(id).into());
        }
        Ok(())
    }

    fn allocate(&mut self) {
        let share = self.fair_share();
        debug!(
            policy = "static",
            tenants = self.tenants.len(),
            capacity = self.capacity,
            share,
            "Allocating round"
        );

        for t in self.tenants.values_mut() {
            t.allocation = share;
        }
    }

    fn allocation(&self, id: TenantId) -> Result<u64> {
        self.tenants
            .get(&id)
            .map(|t| t.allocation)
            .ok_or_else(|| TenantError::NotFound(id).into())
    }

    fn fair_share(&self) -> u64 {
        match self.tenants.len() {
            0 => 0,
            n => self.capacity / n as u64,
        }
    }

    fn num_tenants(&self) -> usize {
        self.tenants.len()
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn set_capacity(&mut self, capacity: u64) {
        self.capacity = capacity;
    }

    fn tenant_ids(&self) -> Vec<TenantId> {
        self.tenants.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_split_ignores_demand() {
        let mut alloc = StaticAllocator::new(4);
        alloc.add_tenant(TenantId(1)).unwrap();
        alloc.add_tenant(TenantId(2)).unwrap();

        for (d1, d2) in [(0, 0), (1, 7), (4, 4), (9, 0)] {
            alloc.set_demand(TenantId(1), d1, false).unwrap();
            alloc.set_demand(TenantId(2), d2, true).unwrap();
            alloc.allocate();
            assert_eq!(alloc.allocation(TenantId(1)).unwrap(), 2);
            assert_eq!(alloc.allocation(TenantId(2)).unwrap(), 2);
        }
        assert!(alloc.set_demand(TenantId(3), 1, false).is_err());
    }

    #[test]
    fn test_remainder_is_left_unallocated() {
        let mut alloc = StaticAllocator::new(5);
        for id in 1..=3 {
            alloc.add_tenant(TenantId(id)).unwrap();
        }
        alloc.allocate();
        let total: u64 = alloc.round_summary().iter().map(|(_, a)| a).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn test_unknown_tenant() {
        let mut alloc = StaticAllocator::new(4);
        assert!(alloc.set_demand(TenantId(1), 1, false).is_err());
        assert!(alloc.remove_tenant(TenantId(1)).is_err());
    }
}
