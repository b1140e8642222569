//! Consistent-hash ring mapping virtual-node scores to colonies.
//!
//! Scores are 32-bit hashes kept in an ordered map; a key belongs to the
//! first virtual node at or after its score, wrapping to the smallest
//! entry past the top of the space. Lookups take the ring read lock and
//! structural changes the write lock, so a lookup in flight during a
//! removal sees the entry or does not, never a partial state. Concurrent
//! data transfers over overlapping virtual nodes are NOT serialized
//! against each other; callers must serialize rebalances.

use crate::error::{Result, RingError};
use crate::ring::colony::Colony;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound::{Excluded, Unbounded};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Consistent-hash ring over colonies.
#[derive(Debug, Default)]
pub struct HashRing {
    /// Virtual-node score → owning colony.
    ring: RwLock<BTreeMap<u32, Arc<Colony>>>,

    /// Colony group ID → its virtual-node scores.
    colonies: RwLock<HashMap<String, Vec<u32>>>,
}

impl HashRing {
    /// Create an empty ring.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of virtual nodes on the ring.
    pub fn len(&self) -> usize {
        self.ring.read().len()
    }

    /// True when no virtual node is on the ring.
    pub fn is_empty(&self) -> bool {
        self.ring.read().is_empty()
    }

    /// Every colony with ring bookkeeping.
    pub fn colonies(&self) -> Vec<Arc<Colony>> {
        let ring = self.ring.read();
        let bookkeeping = self.colonies.read();
        let mut out = Vec::with_capacity(bookkeeping.len());
        for scores in bookkeeping.values() {
            if let Some(score) = scores.first() {
                if let Some(colony) = ring.get(score) {
                    out.push(colony.clone());
                }
            }
        }
        out
    }

    /// Add a virtual node at `score` owned by `colony`.
    ///
    /// Fails when the score is already taken; the ring is unchanged.
    pub fn add(&self, score: u32, colony: Arc<Colony>) -> Result<()> {
        let mut ring = self.ring.write();
        if ring.contains_key(&score) {
            return Err(RingError::VirtualNodeExists(score).into());
        }

        self.colonies
            .write()
            .entry(colony.group_id().to_string())
            .or_default()
            .push(score);
        ring.insert(score, colony);
        Ok(())
    }

    /// Remove the virtual node at `score`. Fails when absent.
    pub fn remove(&self, score: u32) -> Result<()> {
        let mut ring = self.ring.write();
        let colony = ring
            .remove(&score)
            .ok_or(RingError::VirtualNodeNotFound(score))?;

        let mut bookkeeping = self.colonies.write();
        if let Some(scores) = bookkeeping.get_mut(colony.group_id()) {
            scores.retain(|&s| s != score);
        }
        Ok(())
    }

    /// The colony owning `score`: first virtual node at or after it,
    /// wrapping to the smallest entry.
    pub fn colony_for(&self, score: u32) -> Result<Arc<Colony>> {
        let ring = self.ring.read();
        ring.range(score..)
            .next()
            .or_else(|| ring.iter().next())
            .map(|(_, colony)| colony.clone())
            .ok_or_else(|| RingError::VirtualNodeNotFound(score).into())
    }

    /// The virtual node preceding `score`, wrapping across the ring
    /// boundary. Fails on rings of one entry or less, or when `score` is
    /// not on the ring.
    pub fn prev(&self, score: u32) -> Result<(u32, Arc<Colony>)> {
        let ring = self.ring.read();
        if ring.len() <= 1 {
            return Err(RingError::RingTooSmall.into());
        }
        if !ring.contains_key(&score) {
            return Err(RingError::VirtualNodeNotFound(score).into());
        }

        let (s, colony) = ring
            .range(..score)
            .next_back()
            .or_else(|| ring.iter().next_back())
            .expect("non-empty ring has a predecessor");
        Ok((*s, colony.clone()))
    }

    /// The virtual node following `score`, wrapping across the ring
    /// boundary. Fails on rings of one entry or less, or when `score` is
    /// not on the ring.
    pub fn next(&self, score: u32) -> Result<(u32, Arc<Colony>)> {
        let ring = self.ring.read();
        if ring.len() <= 1 {
            return Err(RingError::RingTooSmall.into());
        }
        if !ring.contains_key(&score) {
            return Err(RingError::VirtualNodeNotFound(score).into());
        }

        let (s, colony) = ring
            .range((Excluded(score), Unbounded))
            .next()
            .or_else(|| ring.iter().next())
            .expect("non-empty ring has a successor");
        Ok((*s, colony.clone()))
    }

    /// Resolve the handoff boundaries for `score` under one consistent
    /// snapshot: the predecessor score, the owning colony, and the first
    /// successor belonging to a different colony (circularly).
    fn handoff_plan(&self, score: u32) -> Result<(u32, Arc<Colony>, Option<Arc<Colony>>)> {
        let ring = self.ring.read();
        if ring.len() <= 1 {
            return Err(RingError::RingTooSmall.into());
        }
        let owner = ring
            .get(&score)
            .cloned()
            .ok_or(RingError::VirtualNodeNotFound(score))?;

        let left = ring
            .range(..score)
            .next_back()
            .or_else(|| ring.iter().next_back())
            .map(|(s, _)| *s)
            .expect("ring has more than one entry");

        let successor = ring
            .range((Excluded(score), Unbounded))
            .chain(ring.range(..score))
            .map(|(_, colony)| colony)
            .find(|colony| colony.group_id() != owner.group_id())
            .cloned();

        Ok((left, owner, successor))
    }

    /// Remove the virtual node at `score` and hand its key range
    /// `(predecessor, score]` off to the successor's colony. A run of
    /// virtual nodes owned by the same colony is skipped over; when no
    /// other colony exists only the virtual node is removed. Returns the
    /// number of documents moved.
    pub async fn transfer_to_next(&self, score: u32) -> Result<u64> {
        let (left, owner, successor) = self.handoff_plan(score)?;

        self.remove(score)?;

        match successor {
            Some(successor) => owner.transfer_range(&successor, left, score).await,
            None => Ok(0),
        }
    }

    /// Drain a departing colony: transfer every virtual node it owns
    /// concurrently, await all transfers, then drop the colony's
    /// bookkeeping. Returns the total number of documents moved.
    pub async fn transfer_all_to_next(self: &Arc<Self>, group_id: &str) -> Result<u64> {
        let scores = self
            .colonies
            .read()
            .get(group_id)
            .cloned()
            .ok_or_else(|| RingError::ColonyNotFound(group_id.to_string()))?;

        let mut tasks = JoinSet::new();
        for score in scores {
            let ring = self.clone();
            tasks.spawn(async move { (score, ring.transfer_to_next(score).await) });
        }

        let mut moved = 0;
        while let Some(res) = tasks.join_next().await {
            match res {
                Ok((_, Ok(n))) => moved += n,
                Ok((score, Err(e))) => {
                    warn!(score, error = %e, "virtual-node transfer failed");
                }
                Err(e) => warn!(error = %e, "transfer task panicked"),
            }
        }

        // Only after every transfer has completed is the colony gone.
        self.colonies.write().remove(group_id);
        info!(group_id, moved, "colony drained");
        Ok(moved)
    }
}
