//! Per-scene shuffle order
//!
//! Each scene activation draws one Fisher–Yates permutation of its clip
//! slots and walks it cyclically until the scene ends. The order is never
//! reshuffled mid-scene.

use crate::error::{Error, Result};
use rand::Rng;

/// Unbiased permutation of `0..n`
///
/// Swaps from the last index down to index 1, each target drawn uniformly
/// from `0..=i`.
pub fn fisher_yates<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<usize> {
    let mut order: Vec<usize> = (0..n).collect();
    for i in (1..n).rev() {
        let j = rng.gen_range(0..=i);
        order.swap(i, j);
    }
    order
}

/// Shuffled clip order for one scene activation
///
/// Positions index into the shuffled order; slots index into the scene's
/// playlist. Slots that failed to prepare can be marked skipped, and the
/// cyclic walk steps over them.
#[derive(Debug, Clone)]
pub struct ShuffleSequencer {
    order: Vec<usize>,
    skipped: Vec<bool>,
}

impl ShuffleSequencer {
    /// Shuffle `n` slots
    pub fn new<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Result<Self> {
        if n == 0 {
            return Err(Error::Configuration(
                "A scene must declare at least one clip".to_string(),
            ));
        }
        Ok(Self {
            order: fisher_yates(n, rng),
            skipped: vec![false; n],
        })
    }

    /// Use a fixed order; must be a permutation of `0..order.len()`
    pub fn from_order(order: Vec<usize>) -> Result<Self> {
        let n = order.len();
        if n == 0 {
            return Err(Error::Configuration(
                "A scene must declare at least one clip".to_string(),
            ));
        }
        let mut seen = vec![false; n];
        for &slot in &order {
            if slot >= n || std::mem::replace(&mut seen[slot], true) {
                return Err(Error::InvalidState(format!(
                    "Order {:?} is not a permutation of 0..{}",
                    order, n
                )));
            }
        }
        Ok(Self {
            order,
            skipped: vec![false; n],
        })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Shuffled slot order
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Playlist slot at `position`
    pub fn slot_at(&self, position: usize) -> usize {
        self.order[position % self.order.len()]
    }

    /// Plain cyclic successor: `(position + 1) mod N`
    pub fn next(&self, position: usize) -> usize {
        (position + 1) % self.order.len()
    }

    /// First position whose slot is still playable
    pub fn first_playable(&self) -> Option<usize> {
        (0..self.order.len()).find(|&p| !self.skipped[self.order[p]])
    }

    /// Next playable position after `position`, wrapping around
    ///
    /// Returns `position` itself when it is the only playable one left, and
    /// None once every slot has been skipped.
    pub fn next_playable(&self, position: usize) -> Option<usize> {
        let n = self.order.len();
        let mut candidate = position % n;
        for _ in 0..n {
            candidate = self.next(candidate);
            if !self.skipped[self.order[candidate]] {
                return Some(candidate);
            }
        }
        None
    }

    /// Drop a slot from the walk for the rest of this activation
    pub fn skip_slot(&mut self, slot: usize) {
        if let Some(flag) = self.skipped.get_mut(slot) {
            *flag = true;
        }
    }

    pub fn playable_count(&self) -> usize {
        self.skipped.iter().filter(|s| !**s).count()
    }
}
