//! Allocation policies

pub mod fixed;
pub mod karma;
pub mod maxmin;
pub mod mpsp;
pub mod sharp;

pub use fixed::StaticAllocator;
pub use karma::KarmaAllocator;
pub use maxmin::MaxMinAllocator;
pub use mpsp::{flat_valuation, MpspAllocator, Valuation};
pub use sharp::SharpAllocator;
