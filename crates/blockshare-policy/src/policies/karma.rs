//! Karma: credit-based barter
//!
//! A fraction `alpha` of capacity is carved out as a public subsidy pool;
//! the rest is split into equal fair shares. Each round:
//! - tenants below their fair share donate the surplus and earn credits
//! - tenants above it borrow, limited by their credit balance
//! - when supply covers every borrow, donations are drawn from the poorest
//!   donors first; otherwise the scarce supply goes to the richest
//!   borrowers first
//!
//! Both redistributions are tiered water-fills over a [`BroadcastHeap`]:
//! candidates with equal credits share a tier, and the water level never
//! overtakes the next tier's credit balance.

use crate::allocator::Allocator;
use crate::heap::{block_key, BroadcastHeap};
use blockshare_common::{ParameterError, Result, TenantError, TenantId};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Participant in a redistribution: the subsidy pool or a real tenant.
/// The pool orders before every tenant within a credit tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Party {
    Public,
    Tenant(TenantId),
}

#[derive(Debug, Clone)]
struct KarmaTenant {
    demand: u64,
    allocation: u64,
    credits: i64,
    /// Credit delta accumulated this round
    rate: i64,
}

impl KarmaTenant {
    fn new(credits: i64) -> Self {
        Self {
            demand: 0,
            allocation: 0,
            credits,
            rate: 0,
        }
    }
}

/// Public subsidy pool. Its credit budget is minted fresh every round and
/// never carried over.
#[derive(Debug, Clone, Default)]
struct SubsidyPool {
    blocks: u64,
    credits: i64,
    /// Blocks donated by the pool in the last round
    rate: i64,
}

#[derive(Debug, Clone, Copy)]
enum TierOrder {
    /// Ascending credits: donors that need credits most give first
    PoorestFirst,
    /// Descending credits: borrowers that can pay most are served first
    RichestFirst,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    party: Party,
    credits: i64,
    blocks: u64,
}

/// Move `amount` blocks through `candidates`, tier by tier in credit
/// order, levelling each tier before it reaches the next one.
///
/// Returns the blocks moved per candidate.
///
/// # Panics
///
/// Panics if the candidates together cannot absorb `amount`.
fn tiered_fill(
    mut candidates: Vec<Candidate>,
    mut amount: u64,
    order: TierOrder,
) -> Vec<(Party, u64)> {
    match order {
        TierOrder::PoorestFirst => {
            candidates.sort_by(|a, b| a.credits.cmp(&b.credits).then(a.party.cmp(&b.party)))
        }
        TierOrder::RichestFirst => {
            candidates.sort_by(|a, b| b.credits.cmp(&a.credits).then(a.party.cmp(&b.party)))
        }
    }

    // Nobody moves more than the whole amount
    for c in &mut candidates {
        c.blocks = c.blocks.min(amount);
    }

    let mut moved = vec![0u64; candidates.len()];
    let mut heap: BroadcastHeap<usize> = BroadcastHeap::with_capacity(candidates.len());
    let mut level = 0i64;
    let mut idx = 0usize;

    while amount > 0 {
        if heap.is_empty() {
            let next = candidates.get(idx).unwrap_or_else(|| {
                panic!("redistribution candidates exhausted with {} blocks left", amount)
            });
            level = next.credits;
        }

        while idx < candidates.len() && candidates[idx].credits == level {
            heap.push(idx, block_key(candidates[idx].blocks));
            idx += 1;
        }

        // Candidates with nothing to move never take part
        while heap.peek_min() == Some(0) {
            if let Some((i, _)) = heap.pop() {
                moved[i] = candidates[i].blocks;
            }
        }
        if heap.is_empty() {
            continue;
        }

        let size = heap.len() as u64;
        if amount < size {
            for _ in 0..amount {
                let (i, left) = heap.pop().expect("tier holds more candidates than blocks left");
                moved[i] = candidates[i].blocks - left as u64 + 1;
            }
            break;
        }

        let gap = candidates
            .get(idx)
            .map(|next| (next.credits - level).unsigned_abs())
            .unwrap_or(u64::MAX);
        let min = heap.peek_min().unwrap_or(0) as u64;
        let alpha = min.min(amount / size).min(gap);

        heap.add_all(-(alpha as i64));
        amount -= size * alpha;
        level = match order {
            TierOrder::PoorestFirst => level + alpha as i64,
            TierOrder::RichestFirst => level - alpha as i64,
        };

        while heap.peek_min() == Some(0) {
            if let Some((i, _)) = heap.pop() {
                moved[i] = candidates[i].blocks;
            }
        }
    }

    while let Some((i, left)) = heap.pop() {
        moved[i] = candidates[i].blocks - left as u64;
    }

    candidates
        .iter()
        .zip(moved)
        .map(|(c, blocks)| (c.party, blocks))
        .collect()
}

/// Credit-based barter allocator
#[derive(Debug, Clone)]
pub struct KarmaAllocator {
    capacity: u64,
    alpha: f64,
    init_credits: i64,
    fair_share: u64,
    public: SubsidyPool,
    tenants: BTreeMap<TenantId, KarmaTenant>,
}

impl KarmaAllocator {
    /// Create a Karma allocator. `alpha` must lie within `[0, 1]`.
    pub fn new(capacity: u64, alpha: f64, init_credits: i64) -> Result<Self> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(ParameterError::AlphaOutOfRange(alpha).into());
        }

        Ok(Self {
            capacity,
            alpha,
            init_credits,
            fair_share: 0,
            public: SubsidyPool {
                blocks: public_blocks(alpha, capacity),
                ..SubsidyPool::default()
            },
            tenants: BTreeMap::new(),
        })
    }

    /// Credit balance of `id`
    pub fn credits(&self, id: TenantId) -> Result<i64> {
        self.tenant(id).map(|t| t.credits)
    }

    /// Blocks permanently reserved for the subsidy pool
    pub fn public_blocks(&self) -> u64 {
        self.public.blocks
    }

    /// Blocks the subsidy pool donated in the last round
    pub fn last_subsidy(&self) -> u64 {
        self.public.rate.max(0) as u64
    }

    fn free_blocks(&self) -> u64 {
        self.capacity - self.public.blocks
    }

    fn update_fair_share(&mut self) {
        self.fair_share = match self.tenants.len() {
            0 => 0,
            n => self.free_blocks() / n as u64,
        };
    }

    fn tenant(&self, id: TenantId) -> Result<&KarmaTenant> {
        self.tenants
            .get(&id)
            .ok_or_else(|| TenantError::NotFound(id).into())
    }

    /// Blocks `t` may borrow above its fair share this round
    fn borrow_limit(&self, t: &KarmaTenant) -> u64 {
        let credits = t.credits.max(0) as u64;
        (t.demand - self.fair_share).min(credits)
    }

    fn credit_party(&mut self, party: Party, delta: i64) {
        match party {
            Party::Public => self.public.rate += delta,
            Party::Tenant(id) => {
                if let Some(t) = self.tenants.get_mut(&id) {
                    t.rate += delta;
                }
            }
        }
    }

    fn grant_borrow(&mut self, id: TenantId, blocks: u64) {
        if let Some(t) = self.tenants.get_mut(&id) {
            t.allocation += blocks;
            t.rate -= blocks as i64;
        }
    }

    fn party_credits(&self, party: Party) -> i64 {
        match party {
            Party::Public => self.public.credits,
            Party::Tenant(id) => self.tenants[&id].credits,
        }
    }

    /// Supply covers every borrow: borrowers take in full and the poorest
    /// donors are drawn on first
    fn borrow_from_poor(&mut self, demand: u64, donors: &[Party], borrowers: &[TenantId]) {
        for &id in borrowers {
            let blocks = self.borrow_limit(&self.tenants[&id]);
            self.grant_borrow(id, blocks);
        }

        let candidates = donors
            .iter()
            .map(|&party| Candidate {
                party,
                credits: self.party_credits(party),
                blocks: self.donor_blocks(party),
            })
            .collect();

        for (party, given) in tiered_fill(candidates, demand, TierOrder::PoorestFirst) {
            self.credit_party(party, given as i64);
        }
    }

    /// Supply falls short: every donor gives in full and the richest
    /// borrowers are served first
    fn donate_to_rich(&mut self, supply: u64, donors: &[Party], borrowers: &[TenantId]) {
        for &party in donors {
            let given = self.donor_blocks(party);
            self.credit_party(party, given as i64);
        }

        let candidates = borrowers
            .iter()
            .map(|&id| {
                let t = &self.tenants[&id];
                Candidate {
                    party: Party::Tenant(id),
                    credits: t.credits,
                    blocks: self.borrow_limit(t),
                }
            })
            .collect();

        for (party, taken) in tiered_fill(candidates, supply, TierOrder::RichestFirst) {
            if let Party::Tenant(id) = party {
                self.grant_borrow(id, taken);
            }
        }
    }

    /// Spare blocks `party` can donate this round
    fn donor_blocks(&self, party: Party) -> u64 {
        match party {
            Party::Public => self.public.blocks,
            Party::Tenant(id) => self.fair_share.saturating_sub(self.tenants[&id].demand),
        }
    }
}

fn public_blocks(alpha: f64, capacity: u64) -> u64 {
    (alpha * capacity as f64).floor() as u64
}

impl Allocator for KarmaAllocator {
    fn name(&self) -> &'static str {
        "karma"
    }

    fn add_tenant(&mut self, id: TenantId) -> Result<()> {
        if self.tenants.contains_key(&id) {
            return Err(TenantError::AlreadyExists(id).into());
        }

        // Late joiners start from the average balance
        let credits = match self.tenants.len() {
            0 => self.init_credits,
            n => self.tenants.values().map(|t| t.credits).sum::<i64>() / n as i64,
        };
        self.tenants.insert(id, KarmaTenant::new(credits));
        self.update_fair_share();

        debug!(tenant = %id, credits, fair_share = self.fair_share, "Tenant joined");
        Ok(())
    }

    fn remove_tenant(&mut self, id: TenantId) -> Result<()> {
        self.tenants
            .remove(&id)
            .ok_or(TenantError::NotFound(id))?;
        self.update_fair_share();
        Ok(())
    }

    fn set_demand(&mut self, id: TenantId, demand: u64, greedy: bool) -> Result<()> {
        let fair_share = self.fair_share;
        let tenant = self
            .tenants
            .get_mut(&id)
            .ok_or(TenantError::NotFound(id))?;
        tenant.demand = if greedy { demand.max(fair_share) } else { demand };
        Ok(())
    }

    #[instrument(skip(self), fields(policy = "karma"))]
    fn allocate(&mut self) {
        let n = self.tenants.len() as u64;
        if n == 0 {
            return;
        }

        let fair_share = self.fair_share;
        let subsidy = (self.public.blocks / n) as i64;
        self.public.rate = 0;
        self.public.credits = self.init_credits * n as i64;

        let mut donors = Vec::new();
        let mut borrowers = Vec::new();
        let mut supply = self.public.blocks;
        let mut demand = 0u64;

        for (&id, t) in self.tenants.iter_mut() {
            t.rate = 0;
            t.credits += subsidy;

            if t.demand < fair_share {
                donors.push(Party::Tenant(id));
                supply += fair_share - t.demand;
            } else if t.demand > fair_share {
                borrowers.push(id);
                demand += (t.demand - fair_share).min(t.credits.max(0) as u64);
            }
            t.allocation = t.demand.min(fair_share);
        }

        if self.public.blocks > 0 {
            donors.push(Party::Public);
        }

        debug!(
            tenants = n,
            supply,
            demand,
            donors = donors.len(),
            borrowers = borrowers.len(),
            "Karma round"
        );

        if supply >= demand {
            self.borrow_from_poor(demand, &donors, &borrowers);
        } else {
            self.donate_to_rich(supply, &donors, &borrowers);
        }

        for t in self.tenants.values_mut() {
            t.credits += t.rate;
        }
        self.public.credits = 0;
    }

    fn allocation(&self, id: TenantId) -> Result<u64> {
        self.tenant(id).map(|t| t.allocation)
    }

    fn fair_share(&self) -> u64 {
        self.fair_share
    }

    fn num_tenants(&self) -> usize {
        self.tenants.len()
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn set_capacity(&mut self, capacity: u64) {
        self.capacity = capacity;
        self.public.blocks = public_blocks(self.alpha, capacity);
        self.update_fair_share();
    }

    fn tenant_ids(&self) -> Vec<TenantId> {
        self.tenants.keys().copied().collect()
    }
}
