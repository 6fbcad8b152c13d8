//! Core data types for Blockshare

pub mod bid;
pub mod claim;
pub mod tenant;
