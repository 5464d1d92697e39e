// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::sync::atomic::{AtomicUsize, Ordering};

/// Lock-free bitmap used by the completion driver to record which pool
/// slots were signalled since the last scan.
pub(super) struct AtomicBitset {
    words: Vec<AtomicUsize>,
    capacity: usize,
}

impl AtomicBitset {
    pub(super) fn new(capacity: usize) -> Self {
        let bits_per_word = usize::BITS as usize;
        let word_count = capacity.div_ceil(bits_per_word);
        let words = (0..word_count).map(|_| AtomicUsize::new(0)).collect();
        Self { words, capacity }
    }

    pub(super) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Set `index`, returning whether it was already set. Out-of-range
    /// indices are ignored.
    pub(super) fn test_and_set(&self, index: usize) -> bool {
        if index >= self.capacity {
            return false;
        }

        let bits_per_word = usize::BITS as usize;
        let bit = 1usize << (index % bits_per_word);
        let prev = self.words[index / bits_per_word].fetch_or(bit, Ordering::AcqRel);
        (prev & bit) != 0
    }

    /// Clear every bit, returning the indices that were set in ascending order.
    pub(super) fn take_all(&self) -> Vec<usize> {
        let bits_per_word = usize::BITS as usize;
        let mut indices = Vec::new();

        for (word_idx, word) in self.words.iter().enumerate() {
            let mut value = word.swap(0, Ordering::AcqRel);
            while value != 0 {
                let bit_offset = value.trailing_zeros() as usize;
                value &= value - 1;
                let index = word_idx * bits_per_word + bit_offset;
                if index < self.capacity {
                    indices.push(index);
                }
            }
        }

        indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_take() {
        let bits = AtomicBitset::new(130);
        assert!(!bits.test_and_set(3));
        assert!(bits.test_and_set(3));
        assert!(!bits.test_and_set(129));
        assert!(!bits.test_and_set(64));
        assert!(!bits.test_and_set(500));
        assert_eq!(bits.take_all(), vec![3, 64, 129]);
        assert!(bits.take_all().is_empty());
        assert_eq!(bits.capacity(), 130);
    }
}
