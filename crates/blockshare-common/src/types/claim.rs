//! Claim - time-limited right to future capacity
//!
//! Claims are minted as tickets each round and redeemed against real
//! capacity. A claim that is not fully redeemed before its term runs out
//! expires and its remaining blocks are revoked.

use serde::{Deserialize, Serialize};

/// Outstanding ticket grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Blocks still redeemable
    pub blocks: u64,
    /// Rounds left before the claim expires
    pub term: u32,
}

impl Claim {
    pub fn new(blocks: u64, term: u32) -> Self {
        Self { blocks, term }
    }

    /// Redeem up to `blocks` from this claim, returning how many were taken
    pub fn redeem(&mut self, blocks: u64) -> u64 {
        let taken = blocks.min(self.blocks);
        self.blocks -= taken;
        taken
    }

    /// Advance one round. Returns `true` once the term has run out.
    pub fn tick(&mut self) -> bool {
        self.term = self.term.saturating_sub(1);
        self.term == 0
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.blocks == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redeem_caps_at_remaining() {
        let mut claim = Claim::new(3, 2);
        assert_eq!(claim.redeem(2), 2);
        assert_eq!(claim.redeem(5), 1);
        assert!(claim.is_exhausted());
    }

    #[test]
    fn test_tick_expires_after_term() {
        let mut claim = Claim::new(1, 2);
        assert!(!claim.tick());
        assert!(claim.tick());
    }
}
