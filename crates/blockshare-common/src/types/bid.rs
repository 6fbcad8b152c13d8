//! Bid - sealed offer for capacity above the guaranteed base share
//!
//! A bid asks for `quantity` blocks at a per-block `price`. The auction
//! serves bids by descending price and reports the clearing pair as
//! [`BorderBids`].

use crate::error::ParameterError;
use serde::{Deserialize, Serialize};

/// Offer of `price` per block for up to `quantity` blocks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    /// Blocks requested
    pub quantity: u64,
    /// Price offered per block
    pub price: u64,
}

impl Bid {
    pub fn new(quantity: u64, price: u64) -> Self {
        Self { quantity, price }
    }

    /// Build a bid from signed inputs, rejecting negative quantity or price
    pub fn from_signed(quantity: i64, price: i64) -> Result<Self, ParameterError> {
        if quantity < 0 || price < 0 {
            return Err(ParameterError::NegativeBid { quantity, price });
        }
        Ok(Self {
            quantity: quantity as u64,
            price: price as u64,
        })
    }

    /// A bid asking for nothing does not take part in the auction
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.quantity == 0
    }
}

/// Clearing prices of the most recent auction round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorderBids {
    /// Price of the last block sold
    pub lowest_accepted: u64,
    /// Price of the best bid left unserved (0 if none)
    pub highest_rejected: u64,
}

impl BorderBids {
    pub fn new(lowest_accepted: u64, highest_rejected: u64) -> Self {
        Self {
            lowest_accepted,
            highest_rejected,
        }
    }

    /// Clearing-price monotonicity: no rejected bid outprices an accepted one
    #[inline]
    pub fn is_monotonic(&self) -> bool {
        self.lowest_accepted >= self.highest_rejected
    }
}
