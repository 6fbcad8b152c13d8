//! Max-min fair water-filling
//!
//! When total demand fits, everyone is served in full. Otherwise a uniform
//! water level rises over all unsatisfied tenants until capacity runs out;
//! tenants whose demand sits below the level leave the competition fully
//! served, and the last indivisible blocks go one each to the tenants
//! closest to satisfaction.

use crate::allocator::Allocator;
use crate::heap::{block_key, BroadcastHeap};
use blockshare_common::{Result, TenantError, TenantId};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Default)]
struct Tenant {
    demand: u64,
    allocation: u64,
}

/// Max-min fair allocator
#[derive(Debug, Clone)]
pub struct MaxMinAllocator {
    capacity: u64,
    tenants: BTreeMap<TenantId, Tenant>,
}

impl MaxMinAllocator {
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            tenants: BTreeMap::new(),
        }
    }

    /// Water-fill with demands clamped to capacity; nobody can be granted
    /// more than the whole supply
    fn progressive_fill(&mut self) {
        let capacity = self.capacity;
        let mut heap = BroadcastHeap::with_capacity(self.tenants.len());
        for (id, t) in &self.tenants {
            heap.push(*id, block_key(t.demand.min(capacity)));
        }

        let mut supply = block_key(capacity);
        while supply > 0 && !heap.is_empty() {
            let size = heap.len() as i64;

            // Level cannot rise another full step; hand out single blocks
            if supply < size {
                for _ in 0..supply {
                    let (id, remaining) = heap
                        .pop()
                        .expect("heap holds more tenants than remaining supply");
                    let t = self.tenant_mut(id);
                    t.allocation = t.demand.min(capacity) - remaining as u64 + 1;
                }
                break;
            }

            let min = heap.peek_min().unwrap_or(0);
            let alpha = min.min(supply / size);
            heap.add_all(-alpha);
            supply -= size * alpha;

            while heap.peek_min() == Some(0) {
                if let Some((id, _)) = heap.pop() {
                    let t = self.tenant_mut(id);
                    t.allocation = t.demand.min(capacity);
                }
            }
        }

        while let Some((id, remaining)) = heap.pop() {
            let t = self.tenant_mut(id);
            t.allocation = t.demand.min(capacity) - remaining as u64;
        }
    }

    fn tenant_mut(&mut self, id: TenantId) -> &mut Tenant {
        self.tenants
            .get_mut(&id)
            .expect("queued tenant is registered")
    }
}

impl Allocator for MaxMinAllocator {
    fn name(&self) -> &'static str {
        "max_min"
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

    fn set_demand(&mut self, id: TenantId, demand: u64, greedy: bool) -> Result<()> {
        let fair_share = self.fair_share();
        let tenant = self
            .tenants
            .get_mut(&id)
            .ok_or(TenantError::NotFound(id))?;
        tenant.demand = if greedy { demand.max(fair_share) } else { demand };
        Ok(())
    }

    fn allocate(&mut self) {
        let total_demand = self
            .tenants
            .values()
            .fold(0u64, |sum, t| sum.saturating_add(t.demand));

        debug!(
            policy = "max_min",
            tenants = self.tenants.len(),
            capacity = self.capacity,
            demand = total_demand,
            "Allocating round"
        );

        if total_demand <= self.capacity {
            for t in self.tenants.values_mut() {
                t.allocation = t.demand;
            }
            return;
        }

        self.progressive_fill();
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
    use blockshare_common::QuotaError;

    fn allocator(capacity: u64, demands: &[u64]) -> MaxMinAllocator {
        let mut alloc = MaxMinAllocator::new(capacity);
        for (i, demand) in demands.iter().enumerate() {
            let id = TenantId(i as u32 + 1);
            alloc.add_tenant(id).unwrap();
            alloc.set_demand(id, *demand, false).unwrap();
        }
        alloc
    }

    fn allocations(alloc: &MaxMinAllocator) -> Vec<u64> {
        alloc.round_summary().into_iter().map(|(_, a)| a).collect()
    }

    #[test]
    fn test_underloaded_serves_everyone() {
        let mut alloc = allocator(4, &[1, 1]);
        alloc.allocate();
        assert_eq!(allocations(&alloc), vec![1, 1]);
    }

    #[test]
    fn test_water_filling() {
        let mut alloc = allocator(6, &[4, 3, 1]);
        alloc.allocate();
        assert_eq!(allocations(&alloc), vec![2, 3, 1]);
    }

    #[test]
    fn test_equal_demands_split_remainder() {
        let mut alloc = allocator(5, &[4, 4]);
        alloc.allocate();
        let result = allocations(&alloc);
        assert_eq!(result.iter().sum::<u64>(), 5);
        assert!(result.contains(&3) && result.contains(&2));
    }

    #[test]
    fn test_zero_demand_tenant() {
        let mut alloc = allocator(4, &[0, 10, 10]);
        alloc.allocate();
        assert_eq!(allocations(&alloc), vec![0, 2, 2]);
    }

    #[test]
    fn test_demand_beyond_i64_range() {
        let mut alloc = allocator(10, &[u64::MAX, 3]);
        alloc.allocate();
        assert_eq!(allocations(&alloc), vec![7, 3]);

        let mut alloc = allocator(5, &[u64::MAX]);
        alloc.allocate();
        assert_eq!(allocations(&alloc), vec![5]);

        let mut alloc = allocator(6, &[u64::MAX, u64::MAX]);
        alloc.allocate();
        assert_eq!(allocations(&alloc), vec![3, 3]);
    }

    #[test]
    fn test_zero_capacity() {
        let mut alloc = allocator(0, &[3, 2]);
        alloc.allocate();
        assert_eq!(allocations(&alloc), vec![0, 0]);
    }

    #[test]
    fn test_greedy_inflates_to_fair_share() {
        let mut alloc = allocator(8, &[0, 0]);
        alloc.set_demand(TenantId(1), 1, true).unwrap();
        alloc.set_demand(TenantId(2), 2, false).unwrap();
        alloc.allocate();
        assert_eq!(allocations(&alloc), vec![4, 2]);

        // Demand above the fair share is reported as is
        alloc.set_demand(TenantId(1), 6, true).unwrap();
        alloc.set_demand(TenantId(2), 0, false).unwrap();
        alloc.allocate();
        assert_eq!(allocations(&alloc), vec![6, 0]);
    }

    #[test]
    fn test_duplicate_and_unknown_tenants() {
        let mut alloc = MaxMinAllocator::new(4);
        alloc.add_tenant(TenantId(1)).unwrap();

        assert!(matches!(
            alloc.add_tenant(TenantId(1)),
            Err(QuotaError::Tenant(TenantError::AlreadyExists(TenantId(1))))
        ));
        assert!(matches!(
            alloc.remove_tenant(TenantId(2)),
            Err(QuotaError::Tenant(TenantError::NotFound(TenantId(2))))
        ));
        assert!(alloc.set_demand(TenantId(2), 1, false).is_err());
        assert!(alloc.allocation(TenantId(2)).is_err());
        assert_eq!(alloc.num_tenants(), 1);
    }

    #[test]
    fn test_fair_share() {
        let mut alloc = MaxMinAllocator::new(7);
        assert_eq!(alloc.fair_share(), 0);
        alloc.add_tenant(TenantId(1)).unwrap();
        alloc.add_tenant(TenantId(2)).unwrap();
        assert_eq!(alloc.fair_share(), 3);
        alloc.remove_tenant(TenantId(1)).unwrap();
        assert_eq!(alloc.fair_share(), 7);
    }
}
