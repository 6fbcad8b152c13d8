//! Sharp: claim delegation with expiring tickets
//!
//! An internal max-min allocator mints tickets from a pool of
//! `oversubscription × capacity`. Each round runs three phases:
//! 1. delegate: every tenant receives a claim for its max-min ticket share
//! 2. redeem: tickets are exchanged for real blocks, by weighted lottery
//!    when real capacity is oversubscribed
//! 3. expire: claims are redeemed oldest first; claims whose term runs out
//!    are revoked, and redeemed or revoked tickets return to the pool
//!
//! The pool follows capacity changes. When it shrinks below the tickets
//! already issued, nothing new is minted until enough claims come back.

use crate::allocator::Allocator;
use crate::policies::MaxMinAllocator;
use blockshare_common::{Claim, ParameterError, Result, TenantError, TenantId};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, Default)]
struct SharpTenant {
    demand: u64,
    allocation: u64,
    /// Blocks the tenant could redeem in the last round
    redeemable: u64,
    num_tickets: u64,
    /// Outstanding claims, oldest first
    claims: VecDeque<Claim>,
}

impl SharpTenant {
    fn grant_claim(&mut self, claim: Claim) {
        self.num_tickets += claim.blocks;
        self.claims.push_back(claim);
    }

    /// Redeem this round's allocation against claims and age the rest.
    /// Returns the tickets given up.
    fn expire_claims(&mut self) -> u64 {
        let mut unredeemed = self.allocation;
        let mut expired = 0;

        self.claims.retain_mut(|claim| {
            unredeemed -= claim.redeem(unredeemed);
            if claim.is_exhausted() {
                return false;
            }
            if claim.tick() {
                expired += claim.blocks;
                return false;
            }
            true
        });

        let lost = self.allocation + expired;
        assert!(
            self.num_tickets >= lost,
            "ticket balance would go negative: {} tickets, {} lost",
            self.num_tickets,
            lost
        );
        self.num_tickets -= lost;
        lost
    }
}

/// Claim-delegation allocator
#[derive(Debug)]
pub struct SharpAllocator {
    capacity: u64,
    oversubscription: f64,
    claim_term: u32,
    /// Tickets minted when the pool is full
    ticket_pool: u64,
    /// Mints tickets; its capacity is the number of tickets not yet issued
    claim_allocator: MaxMinAllocator,
    tenants: BTreeMap<TenantId, SharpTenant>,
    rng: StdRng,
}

impl SharpAllocator {
    pub fn new(capacity: u64, oversubscription: f64, claim_term: u32, seed: u64) -> Result<Self> {
        if !oversubscription.is_finite() || oversubscription < 0.0 {
            return Err(ParameterError::OversubscriptionOutOfRange(oversubscription).into());
        }
        if claim_term == 0 {
            return Err(ParameterError::ZeroClaimTerm.into());
        }
        if oversubscription < 1.0 {
            warn!(oversubscription, "Oversubscription degree below 1");
        }

        let ticket_pool = pool_size(oversubscription, capacity);
        Ok(Self {
            capacity,
            oversubscription,
            claim_term,
            ticket_pool,
            claim_allocator: MaxMinAllocator::new(ticket_pool),
            tenants: BTreeMap::new(),
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Current ticket balance of `id`
    pub fn tickets(&self, id: TenantId) -> Result<u64> {
        self.tenant(id).map(|t| t.num_tickets)
    }

    /// Outstanding claims of `id`, oldest first
    pub fn claims(&self, id: TenantId) -> Result<Vec<Claim>> {
        self.tenant(id).map(|t| t.claims.iter().copied().collect())
    }

    /// Tickets left in the pool
    pub fn available_tickets(&self) -> u64 {
        self.claim_allocator.capacity()
    }

    /// Size of the full ticket pool
    pub fn ticket_pool(&self) -> u64 {
        self.ticket_pool
    }

    /// `min(demand, tickets held)` for `id` in the last round
    pub fn redeemable(&self, id: TenantId) -> Result<u64> {
        self.tenant(id).map(|t| t.redeemable)
    }

    fn outstanding_tickets(&self) -> u64 {
        self.tenants.values().map(|t| t.num_tickets).sum()
    }

    /// Reset the unissued balance to whatever the pool has left
    fn refill_pool(&mut self) {
        let available = self.ticket_pool.saturating_sub(self.outstanding_tickets());
        self.claim_allocator.set_capacity(available);
    }

    fn tenant(&self, id: TenantId) -> Result<&SharpTenant> {
        self.tenants
            .get(&id)
            .ok_or_else(|| TenantError::NotFound(id).into())
    }

    fn delegate_claims(&mut self) {
        self.claim_allocator.allocate();

        let mut minted = 0;
        for (&id, t) in self.tenants.iter_mut() {
            let tickets = self
                .claim_allocator
                .allocation(id)
                .expect("claim allocator tracks every tenant");
            if tickets > 0 {
                t.grant_claim(Claim::new(tickets, self.claim_term));
                minted += tickets;
            }
        }
        self.claim_allocator.add_capacity(-(minted as i64));
    }

    fn redeem_claims(&mut self) {
        for t in self.tenants.values_mut() {
            t.redeemable = t.demand.min(t.num_tickets);
        }
        let caps: Vec<u64> = self.tenants.values().map(|t| t.redeemable).collect();
        let total: u64 = caps.iter().sum();

        if total <= self.capacity {
            for (t, cap) in self.tenants.values_mut().zip(&caps) {
                t.allocation = *cap;
            }
            return;
        }

        // Oversubscribed: draw blocks one at a time, weighted by tickets
        let weights: Vec<u64> = self
            .tenants
            .values()
            .zip(&caps)
            .map(|(t, cap)| if *cap > 0 { t.num_tickets } else { 0 })
            .collect();
        let mut dist = WeightedIndex::new(&weights)
            .expect("oversubscribed round has a tenant with tickets");

        let mut granted = vec![0u64; caps.len()];
        for left in (0..self.capacity).rev() {
            let i = dist.sample(&mut self.rng);
            granted[i] += 1;
            if granted[i] == caps[i] && left > 0 {
                dist.update_weights(&[(i, &0)])
                    .expect("unsaturated tenant remains while blocks are left");
            }
        }

        for (t, blocks) in self.tenants.values_mut().zip(granted) {
            t.allocation = blocks;
        }
    }

    fn expire_claims(&mut self) {
        let recovered: u64 = self
            .tenants
            .values_mut()
            .map(SharpTenant::expire_claims)
            .sum();
        self.refill_pool();
        debug!(recovered, "Tickets returned to the pool");
    }
}

fn pool_size(oversubscription: f64, capacity: u64) -> u64 {
    (oversubscription * capacity as f64).floor() as u64
}

impl Allocator for SharpAllocator {
    fn name(&self) -> &'static str {
        "sharp"
    }

    fn add_tenant(&mut self, id: TenantId) -> Result<()> {
        if self.tenants.contains_key(&id) {
            return Err(TenantError::AlreadyExists(id).into());
        }
        self.claim_allocator.add_tenant(id)?;
        self.tenants.insert(id, SharpTenant::default());
        Ok(())
    }

    fn remove_tenant(&mut self, id: TenantId) -> Result<()> {
        let tenant = self
            .tenants
            .remove(&id)
            .ok_or(TenantError::NotFound(id))?;
        self.claim_allocator.remove_tenant(id)?;

        // Outstanding tickets go back to the pool
        self.refill_pool();
        debug!(tenant = %id, returned = tenant.num_tickets, "Tenant removed");
        Ok(())
    }

    fn set_demand(&mut self, id: TenantId, demand: u64, greedy: bool) -> Result<()> {
        let fair_share = self.fair_share();
        let tenant = self
            .tenants
            .get_mut(&id)
            .ok_or(TenantError::NotFound(id))?;

        let demand = if greedy { demand.max(fair_share) } else { demand };
        tenant.demand = demand;
        self.claim_allocator.set_demand(id, demand, false)
    }

    #[instrument(skip(self), fields(policy = "sharp"))]
    fn allocate(&mut self) {
        self.delegate_claims();
        self.redeem_claims();
        self.expire_claims();

        debug!(
            tenants = self.tenants.len(),
            capacity = self.capacity,
            available_tickets = self.available_tickets(),
            "Sharp round"
        );
    }

    fn allocation(&self, id: TenantId) -> Result<u64> {
        self.tenant(id).map(|t| t.allocation)
    }

    fn fair_share(&self) -> u64 {
        match self.tenants.len() {
            0 => 0,
            n => self.available_tickets() / n as u64,
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
        self.ticket_pool = pool_size(self.oversubscription, capacity);
        self.refill_pool();
    }

    fn tenant_ids(&self) -> Vec<TenantId> {
        self.tenants.keys().copied().collect()
    }
}
