//! Signal number sets
//!
//! A 64-bit set where bit N-1 holds signal N, the same layout the kernel
//! uses for `sigset_t` on Linux. Used for the boot-time disposition
//! snapshot and for the set of signals a parent armed before forking.

use crate::Signo;

/// Highest signal number a `SigSet` can hold
pub const SIGSET_CAPACITY: Signo = 64;

/// Set of signal numbers in `1..=64`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct SigSet(u64);

impl SigSet {
    /// Empty set
    pub const EMPTY: Self = Self(0);

    /// Create a new empty set
    pub const fn new() -> Self {
        Self(0)
    }

    /// Raw bitmask
    pub const fn bits(&self) -> u64 {
        self.0
    }

    #[inline]
    fn mask(signo: Signo) -> Option<u64> {
        if signo < 1 || signo > SIGSET_CAPACITY {
            return None;
        }
        Some(1u64 << (signo - 1))
    }

    /// Add a signal; out-of-range numbers are ignored
    #[inline]
    pub fn insert(&mut self, signo: Signo) {
        if let Some(mask) = Self::mask(signo) {
            self.0 |= mask;
        }
    }

    /// Remove a signal
    #[inline]
    pub fn remove(&mut self, signo: Signo) {
        if let Some(mask) = Self::mask(signo) {
            self.0 &= !mask;
        }
    }

    /// Check membership
    #[inline]
    pub fn contains(&self, signo: Signo) -> bool {
        match Self::mask(signo) {
            Some(mask) => self.0 & mask != 0,
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterate members in ascending signal order
    pub fn iter(&self) -> SigSetIter {
        SigSetIter { bits: self.0 }
    }
}

impl FromIterator<Signo> for SigSet {
    fn from_iter<I: IntoIterator<Item = Signo>>(iter: I) -> Self {
        let mut set = SigSet::new();
        for signo in iter {
            set.insert(signo);
        }
        set
    }
}

impl<'a> IntoIterator for &'a SigSet {
    type Item = Signo;
    type IntoIter = SigSetIter;

    fn into_iter(self) -> SigSetIter {
        self.iter()
    }
}

/// Ascending iterator over a `SigSet`
#[derive(Debug, Clone)]
pub struct SigSetIter {
    bits: u64,
}

impl Iterator for SigSetIter {
    type Item = Signo;

    fn next(&mut self) -> Option<Signo> {
        if self.bits == 0 {
            return None;
        }
        let bit = self.bits.trailing_zeros();
        // Clear lowest set bit
        self.bits &= self.bits - 1;
        Some(bit as Signo + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_contains_remove() {
        let mut set = SigSet::new();
        assert!(set.is_empty());

        set.insert(1);
        set.insert(17);
        set.insert(64);
        assert!(set.contains(1));
        assert!(set.contains(17));
        assert!(set.contains(64));
        assert!(!set.contains(2));
        assert_eq!(set.len(), 3);

        set.remove(17);
        assert!(!set.contains(17));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_out_of_range_ignored() {
        let mut set = SigSet::new();
        set.insert(0);
        set.insert(-3);
        set.insert(65);
        assert!(set.is_empty());
        assert!(!set.contains(0));
        assert!(!set.contains(65));
    }

    #[test]
    fn test_bit_layout() {
        let mut set = SigSet::new();
        set.insert(1);
        set.insert(3);
        assert_eq!(set.bits(), 0b101);
    }

    #[test]
    fn test_iter_ascending() {
        let set: SigSet = [15, 2, 64, 10].into_iter().collect();
        let members: Vec<Signo> = set.iter().collect();
        assert_eq!(members, vec![2, 10, 15, 64]);
    }

    #[test]
    fn test_clear() {
        let mut set: SigSet = [1, 2, 3].into_iter().collect();
        set.clear();
        assert_eq!(set, SigSet::EMPTY);
    }
}
