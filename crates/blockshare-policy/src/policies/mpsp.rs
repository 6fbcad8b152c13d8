//! MPSP: multi-unit sealed-bid auction with exclusion pricing
//!
//! `base_blocks` are split evenly as guaranteed fair shares. Demand above
//! the fair share becomes a bid priced by the tenant's valuation, and the
//! remaining free blocks are sold by descending bid price. A reserve bid
//! for every free block (plus one) at half the unit valuation keeps
//! capacity from being sold too cheaply and guarantees a rejected bid
//! always exists.
//!
//! Winners pay the externality they impose: the per-block value the
//! outstanding bids would have realised on the winner's blocks had the
//! winner been absent.

use crate::allocator::Allocator;
use blockshare_common::{
    Bid, BorderBids, ParameterError, Result, TenantError, TenantId, GREEDY_PRICE_JITTER,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Per-block value a tenant places on receiving `quantity` blocks
pub type Valuation = Arc<dyn Fn(u64) -> u64 + Send + Sync>;

/// Valuation assigning the same value to every block
pub fn flat_valuation(block_value: u64) -> Valuation {
    Arc::new(move |_: u64| block_value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bidder {
    /// Unclaimed capacity; blocks it wins stay unallocated
    Reserve,
    Tenant(TenantId),
}

#[derive(Debug, Clone, Copy)]
struct OrderEntry {
    bidder: Bidder,
    price: u64,
    /// Blocks still wanted
    remaining: u64,
}

#[derive(Debug, Clone, Default)]
struct MpspTenant {
    bid: Bid,
    allocation: u64,
    /// Blocks won at auction in the last round
    won: u64,
    /// Per-block price charged in the last round
    payment: u64,
}

/// Auction-based allocator
pub struct MpspAllocator {
    capacity: u64,
    base_blocks: u64,
    valuation: Valuation,
    border_bids: BorderBids,
    tenants: BTreeMap<TenantId, MpspTenant>,
    rng: StdRng,
}

impl fmt::Debug for MpspAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpspAllocator")
            .field("capacity", &self.capacity)
            .field("base_blocks", &self.base_blocks)
            .field("border_bids", &self.border_bids)
            .field("tenants", &self.tenants)
            .finish_non_exhaustive()
    }
}

impl MpspAllocator {
    /// Create an auction allocator. `base_blocks` may not exceed `capacity`.
    pub fn new(capacity: u64, base_blocks: u64, valuation: Valuation, seed: u64) -> Result<Self> {
        if base_blocks > capacity {
            return Err(ParameterError::BaseBlocksExceedCapacity {
                base: base_blocks,
                capacity,
            }
            .into());
        }

        let unit_value = valuation(1);
        Ok(Self {
            capacity,
            base_blocks,
            valuation,
            border_bids: BorderBids::new(unit_value, unit_value),
            tenants: BTreeMap::new(),
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn with_flat_valuation(
        capacity: u64,
        base_blocks: u64,
        block_value: u64,
        seed: u64,
    ) -> Result<Self> {
        Self::new(capacity, base_blocks, flat_valuation(block_value), seed)
    }

    /// Submit an explicit bid for `id`, replacing the one derived from its
    /// demand. Takes effect at the next `allocate()`.
    pub fn place_bid(&mut self, id: TenantId, quantity: i64, price: i64) -> Result<()> {
        let bid = Bid::from_signed(quantity, price)?;
        let tenant = self.tenant_mut(id)?;
        tenant.bid = bid;
        Ok(())
    }

    /// Bid currently on file for `id`
    pub fn bid(&self, id: TenantId) -> Result<Bid> {
        self.tenant(id).map(|t| t.bid)
    }

    /// Per-block price charged to `id` in the last round (0 if it won nothing)
    pub fn payment(&self, id: TenantId) -> Result<u64> {
        self.tenant(id).map(|t| t.payment)
    }

    /// Blocks `id` won above its fair share in the last round
    pub fn won(&self, id: TenantId) -> Result<u64> {
        self.tenant(id).map(|t| t.won)
    }

    pub fn valuation(&self) -> Valuation {
        Arc::clone(&self.valuation)
    }

    /// Clearing prices of the last round
    pub fn border_bids(&self) -> BorderBids {
        self.border_bids
    }

    pub fn base_blocks(&self) -> u64 {
        self.base_blocks
    }

    /// Blocks put up for auction each round
    pub fn free_blocks(&self) -> u64 {
        self.capacity - self.base_blocks
    }

    fn tenant(&self, id: TenantId) -> Result<&MpspTenant> {
        self.tenants
            .get(&id)
            .ok_or_else(|| TenantError::NotFound(id).into())
    }

    fn tenant_mut(&mut self, id: TenantId) -> Result<&mut MpspTenant> {
        self.tenants
            .get_mut(&id)
            .ok_or_else(|| TenantError::NotFound(id).into())
    }

    /// Outstanding bids by descending price; equal prices in random order
    fn order_book(&mut self, free_blocks: u64) -> Vec<OrderEntry> {
        let mut book: Vec<OrderEntry> = self
            .tenants
            .iter()
            .filter(|(_, t)| !t.bid.is_empty())
            .map(|(&id, t)| OrderEntry {
                bidder: Bidder::Tenant(id),
                price: t.bid.price,
                remaining: t.bid.quantity,
            })
            .collect();

        book.push(OrderEntry {
            bidder: Bidder::Reserve,
            price: (self.valuation)(1) / 2,
            remaining: free_blocks + 1,
        });

        book.shuffle(&mut self.rng);
        book.sort_by(|a, b| b.price.cmp(&a.price));
        book
    }

    /// Charge every winner the value its blocks would have fetched from
    /// the bids left unserved
    fn charge_exclusion_payments(&mut self, outstanding: &[OrderEntry]) {
        for (&id, t) in self.tenants.iter_mut() {
            if t.won == 0 {
                continue;
            }

            let mut blocks = t.won;
            let mut refill_value: u128 = 0;
            for entry in outstanding {
                if blocks == 0 {
                    break;
                }
                if entry.bidder == Bidder::Tenant(id) {
                    continue;
                }
                let taken = entry.remaining.min(blocks);
                blocks -= taken;
                refill_value += taken as u128 * entry.price as u128;
            }

            let payment = (refill_value / t.won as u128) as u64;
            assert!(
                payment <= t.payment,
                "exclusion payment {} exceeds winning bid price {} for tenant {}",
                payment,
                t.payment,
                id
            );
            t.payment = payment;
        }
    }
}

impl Allocator for MpspAllocator {
    fn name(&self) -> &'static str {
        "mpsp"
    }

    fn add_tenant(&mut self, id: TenantId) -> Result<()> {
        if self.tenants.contains_key(&id) {
            return Err(TenantError::AlreadyExists(id).into());
        }
        self.tenants.insert(id, MpspTenant::default());
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
        if !self.tenants.contains_key(&id) {
            return Err(TenantError::NotFound(id).into());
        }

        let bid = if demand <= fair_share {
            Bid::default()
        } else {
            let quantity = demand - fair_share;
            let mut price = (self.valuation)(quantity) as i64;
            if greedy {
                price += self
                    .rng
                    .gen_range(-GREEDY_PRICE_JITTER..=GREEDY_PRICE_JITTER);
            }
            Bid::new(quantity, price.max(0) as u64)
        };

        self.tenant_mut(id)?.bid = bid;
        Ok(())
    }

    #[instrument(skip(self), fields(policy = "mpsp"))]
    fn allocate(&mut self) {
        let fair_share = self.fair_share();
        let mut free_blocks = self.free_blocks();

        for t in self.tenants.values_mut() {
            t.allocation = fair_share;
            t.won = 0;
            t.payment = 0;
        }

        let mut book = self.order_book(free_blocks);
        let mut cursor = 0;
        let mut welfare: u128 = 0;
        let mut lowest_accepted = None;

        while free_blocks > 0 {
            let entry = &mut book[cursor];
            let blocks = entry.remaining.min(free_blocks);

            entry.remaining -= blocks;
            free_blocks -= blocks;
            welfare += blocks as u128 * entry.price as u128;
            lowest_accepted = Some(entry.price);

            if let Bidder::Tenant(id) = entry.bidder {
                if let Some(t) = self.tenants.get_mut(&id) {
                    t.allocation += blocks;
                    t.won += blocks;
                    t.payment = entry.price;
                }
            }

            if entry.remaining == 0 {
                cursor += 1;
            }
        }

        let highest_rejected = book.get(cursor).map_or(0, |entry| entry.price);
        self.border_bids = BorderBids::new(
            lowest_accepted.unwrap_or(highest_rejected),
            highest_rejected,
        );
        assert!(
            self.border_bids.is_monotonic(),
            "clearing prices out of order: lowest accepted {} < highest rejected {}",
            self.border_bids.lowest_accepted,
            self.border_bids.highest_rejected
        );

        debug!(
            tenants = self.tenants.len(),
            welfare = welfare as u64,
            lowest_accepted = self.border_bids.lowest_accepted,
            highest_rejected = self.border_bids.highest_rejected,
            "Auction cleared"
        );

        self.charge_exclusion_payments(&book[cursor..]);
    }

    fn allocation(&self, id: TenantId) -> Result<u64> {
        self.tenant(id).map(|t| t.allocation)
    }

    fn fair_share(&self) -> u64 {
        match self.tenants.len() {
            0 => 0,
            n => self.base_blocks / n as u64,
        }
    }

    fn num_tenants(&self) -> usize {
        self.tenants.len()
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn set_capacity(&mut self, capacity: u64) {
        if self.base_blocks > capacity {
            debug!(
                base_blocks = self.base_blocks,
                capacity,
                "Shrinking base blocks to fit capacity"
            );
            self.base_blocks = capacity;
        }
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

    fn auction(capacity: u64, base_blocks: u64, tenants: u32) -> MpspAllocator {
        let mut alloc = MpspAllocator::with_flat_valuation(capacity, base_blocks, 100, 7).unwrap();
        for id in 1..=tenants {
            alloc.add_tenant(TenantId(id)).unwrap();
        }
        alloc
    }

    #[test]
    fn test_base_blocks_exceed_capacity() {
        assert!(matches!(
            MpspAllocator::with_flat_valuation(4, 5, 100, 0),
            Err(QuotaError::Parameter(ParameterError::BaseBlocksExceedCapacity {
                base: 5,
                capacity: 4
            }))
        ));
    }

    #[test]
    fn test_initial_border_bids() {
        let alloc = auction(10, 4, 2);
        assert_eq!(alloc.border_bids(), BorderBids::new(100, 100));
    }

    #[test]
    fn test_no_bid_at_or_below_fair_share() {
        let mut alloc = auction(10, 4, 2);
        alloc.set_demand(TenantId(1), 2, false).unwrap();
        assert!(alloc.bid(TenantId(1)).unwrap().is_empty());

        alloc.set_demand(TenantId(2), 5, false).unwrap();
        assert_eq!(alloc.bid(TenantId(2)).unwrap(), Bid::new(3, 100));
    }

    #[test]
    fn test_greedy_jitter_stays_in_range() {
        let mut alloc = auction(10, 4, 2);
        for _ in 0..50 {
            alloc.set_demand(TenantId(1), 6, true).unwrap();
            let price = alloc.bid(TenantId(1)).unwrap().price;
            assert!((90..=110).contains(&price));
        }
    }

    #[test]
    fn test_winners_get_blocks_on_top_of_fair_share() {
        let mut alloc = auction(10, 4, 2);
        alloc.set_demand(TenantId(1), 5, false).unwrap();
        alloc.set_demand(TenantId(2), 1, false).unwrap();
        alloc.allocate();

        assert_eq!(alloc.allocation(TenantId(1)).unwrap(), 5);
        assert_eq!(alloc.won(TenantId(1)).unwrap(), 3);
        assert_eq!(alloc.allocation(TenantId(2)).unwrap(), 2);
        assert_eq!(alloc.payment(TenantId(2)).unwrap(), 0);
    }

    #[test]
    fn test_uncontested_winner_pays_reserve() {
        let mut alloc = auction(10, 4, 2);
        alloc.set_demand(TenantId(1), 5, false).unwrap();
        alloc.allocate();

        // Only the reserve bid would have taken these blocks
        assert_eq!(alloc.payment(TenantId(1)).unwrap(), 50);
        assert_eq!(alloc.border_bids(), BorderBids::new(50, 50));
    }

    #[test]
    fn test_exclusion_payment_reflects_displaced_bids() {
        let mut alloc = auction(6, 2, 2);
        alloc.place_bid(TenantId(1), 3, 120).unwrap();
        alloc.place_bid(TenantId(2), 3, 80).unwrap();
        alloc.allocate();

        // Tenant 1 takes three of four free blocks, tenant 2 the last one
        assert_eq!(alloc.allocation(TenantId(1)).unwrap(), 4);
        assert_eq!(alloc.allocation(TenantId(2)).unwrap(), 2);
        assert_eq!(alloc.border_bids(), BorderBids::new(80, 80));

        // Without tenant 1, tenant 2's two unserved blocks and one reserve
        // block would have filled its place: (2 * 80 + 50) / 3
        assert_eq!(alloc.payment(TenantId(1)).unwrap(), 70);
        // Without tenant 2, the reserve would have taken its block
        assert_eq!(alloc.payment(TenantId(2)).unwrap(), 50);
    }

    #[test]
    fn test_reserve_outbids_cheap_tenants() {
        let mut alloc = auction(6, 2, 2);
        alloc.place_bid(TenantId(1), 2, 30).unwrap();
        alloc.allocate();

        assert_eq!(alloc.allocation(TenantId(1)).unwrap(), 1);
        assert_eq!(alloc.border_bids(), BorderBids::new(50, 50));
    }

    #[test]
    fn test_nothing_to_auction() {
        let mut alloc = auction(4, 4, 2);
        alloc.set_demand(TenantId(1), 4, false).unwrap();
        alloc.allocate();

        assert_eq!(alloc.allocation(TenantId(1)).unwrap(), 2);
        let border = alloc.border_bids();
        assert_eq!(border.lowest_accepted, border.highest_rejected);
        assert_eq!(border.highest_rejected, 100);
    }

    #[test]
    fn test_negative_bid_rejected() {
        let mut alloc = auction(6, 2, 1);
        assert!(matches!(
            alloc.place_bid(TenantId(1), -1, 10),
            Err(QuotaError::Parameter(ParameterError::NegativeBid { .. }))
        ));
        assert!(alloc.place_bid(TenantId(1), 1, -10).is_err());
        assert!(alloc.place_bid(TenantId(9), 1, 10).is_err());
    }

    #[test]
    fn test_same_seed_same_tie_breaks() {
        let run = |seed| {
            let mut alloc = MpspAllocator::with_flat_valuation(8, 0, 100, seed).unwrap();
            for id in 1..=4 {
                alloc.add_tenant(TenantId(id)).unwrap();
                alloc.set_demand(TenantId(id), 5, false).unwrap();
            }
            alloc.allocate();
            alloc.round_summary()
        };

        assert_eq!(run(42), run(42));
        let total: u64 = run(42).iter().map(|(_, a)| a).sum();
        assert_eq!(total, 8);
    }
}
