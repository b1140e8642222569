//! Cluster distribution layer: consistent-hash ring, shard-owning
//! colonies, and the hash-based document distributor.

pub mod colony;
pub mod distributor;
pub mod hashring;

pub use colony::{score_in_range, Colony};
pub use distributor::HashDistributor;
pub use hashring::HashRing;
