//! Growable bitmap used for document feature filtering.

use serde::{Deserialize, Serialize};

/// Bits per backing word.
const WORD_BITS: usize = 64;

/// A dynamically growable bit vector with an explicit bit capacity.
///
/// Bit indexes are 1-based; index 0 is rejected. Growing never loses
/// already-set bits and capacity is monotonically non-decreasing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bitmap {
    words: Vec<u64>,
    cap: usize,
}

impl Bitmap {
    /// Create a bitmap able to hold `cap` bits without growing.
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            words: vec![0; cap / WORD_BITS + 1],
            cap,
        }
    }

    /// Current capacity in bits.
    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Set the bit at `index` (1-based), growing the backing storage in
    /// whole-word chunks when `index` exceeds the current capacity.
    ///
    /// Returns `false` for index 0.
    pub fn set(&mut self, index: usize) -> bool {
        if index == 0 {
            return false;
        }

        let pos = index / WORD_BITS;
        let offset = index % WORD_BITS;

        if pos >= self.words.len() {
            let grow = pos - self.words.len() + 1;
            self.words.extend(std::iter::repeat(0).take(grow));
            self.cap += WORD_BITS * grow;
        }
        if index >= self.cap {
            self.cap = index + 1;
        }

        self.words[pos] |= 1 << offset;
        true
    }

    /// Read the bit at `index`. Returns `None` when `index` is at or
    /// beyond the current capacity.
    pub fn get(&self, index: usize) -> Option<bool> {
        if index >= self.cap {
            return None;
        }

        let pos = index / WORD_BITS;
        let offset = index % WORD_BITS;
        Some((self.words[pos] >> offset) & 1 == 1)
    }

    /// True iff no bit is set.
    pub fn is_zero(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// True iff both capacity and every word match.
    pub fn is_equal(&self, other: &Bitmap) -> bool {
        self.cap == other.cap && self.words == other.words
    }

    /// Pairwise AND across all inputs, truncated to the minimum capacity
    /// among them. Requires at least two inputs, otherwise `None`.
    pub fn intersection(maps: &[&Bitmap]) -> Option<Bitmap> {
        if maps.len() < 2 {
            return None;
        }

        let cap = maps.iter().map(|m| m.cap).min().unwrap_or(0);
        let mut res = Bitmap::with_capacity(cap);

        for i in 0..res.words.len() {
            let mut word = u64::MAX;
            for m in maps {
                word &= m.words[i];
            }
            res.words[i] = word;
        }

        Some(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_grow() {
        let mut m = Bitmap::with_capacity(10);
        assert!(!m.set(0));
        assert!(m.set(5));
        assert_eq!(m.get(5), Some(true));
        assert_eq!(m.get(6), Some(false));
        assert_eq!(m.get(20), None);

        // Growing past the capacity keeps existing bits.
        assert!(m.set(130));
        assert_eq!(m.get(5), Some(true));
        assert_eq!(m.get(130), Some(true));
        assert!(m.capacity() > 130);
    }

    #[test]
    fn test_capacity_monotonic() {
        let mut m = Bitmap::with_capacity(0);
        let mut last = m.capacity();
        for i in [1usize, 70, 500, 3] {
            m.set(i);
            assert!(m.capacity() >= last);
            last = m.capacity();
        }
    }

    #[test]
    fn test_is_zero_and_equal() {
        let mut a = Bitmap::with_capacity(64);
        let mut b = Bitmap::with_capacity(64);
        assert!(a.is_zero());

        a.set(7);
        b.set(7);
        assert!(!a.is_zero());
        assert!(a.is_equal(&b));

        b.set(9);
        assert!(!a.is_equal(&b));

        // Same bits, different capacity: not equal.
        let c = Bitmap::with_capacity(128);
        let d = Bitmap::with_capacity(64);
        assert!(!c.is_equal(&d));
    }

    #[test]
    fn test_intersection_commutative() {
        let mut a = Bitmap::with_capacity(100);
        let mut b = Bitmap::with_capacity(100);
        a.set(3);
        a.set(50);
        b.set(50);
        b.set(80);

        let ab = Bitmap::intersection(&[&a, &b]).unwrap();
        let ba = Bitmap::intersection(&[&b, &a]).unwrap();
        assert!(ab.is_equal(&ba));
        assert_eq!(ab.get(50), Some(true));
        assert_eq!(ab.get(3), Some(false));
    }

    #[test]
    fn test_intersection_self_preserves_zero_test() {
        let mut a = Bitmap::with_capacity(100);
        let aa = Bitmap::intersection(&[&a, &a]).unwrap();
        assert_eq!(aa.is_zero(), a.is_zero());

        a.set(12);
        let aa = Bitmap::intersection(&[&a, &a]).unwrap();
        assert_eq!(aa.is_zero(), a.is_zero());
    }

    #[test]
    fn test_intersection_truncates_to_min_capacity() {
        let mut a = Bitmap::with_capacity(200);
        let mut b = Bitmap::with_capacity(64);
        a.set(150);
        a.set(10);
        b.set(10);

        let r = Bitmap::intersection(&[&a, &b]).unwrap();
        assert_eq!(r.capacity(), 64);
        assert_eq!(r.get(10), Some(true));
        assert_eq!(r.get(150), None);
    }

    #[test]
    fn test_intersection_needs_two_inputs() {
        let a = Bitmap::with_capacity(10);
        assert!(Bitmap::intersection(&[&a]).is_none());
        assert!(Bitmap::intersection(&[]).is_none());
    }
}
