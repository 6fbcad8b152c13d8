//! # Blockshare Policy
//!
//! Per-round block allocation policies.
//!
//! ## Policies
//!
//! - [`MaxMinAllocator`]: max-min fair water-filling over raw demands
//! - [`StaticAllocator`]: equal split, demand ignored
//! - [`KarmaAllocator`]: credit barter; donors earn credits, borrowers spend them
//! - [`MpspAllocator`]: sealed-bid auction above a guaranteed base share,
//!   winners charged exclusion prices
//! - [`SharpAllocator`]: expiring ticket claims minted by max-min and
//!   redeemed by lottery when oversubscribed
//!
//! ## Usage
//!
//! A caller registers tenants, then per round records every demand and
//! calls [`Allocator::allocate`] once before reading allocations back.
//! Allocators are single-threaded state machines; distinct instances
//! share nothing.

pub mod allocator;
pub mod heap;
pub mod policies;

pub use allocator::{build_allocator, Allocator};
pub use heap::BroadcastHeap;
pub use policies::{
    flat_valuation, KarmaAllocator, MaxMinAllocator, MpspAllocator, SharpAllocator,
    StaticAllocator, Valuation,
};
