use std::borrow::Cow;
use std::ops::Range;

use crate::error::{Error, Result};

const WORD_BITS: usize = 64;

/// Fixed-length bit vector with ranged `[start, stop)` operations.
///
/// Scans and combinations work a word at a time, masking the partial words at
/// either end of the range. Ranges must satisfy `start <= stop <= len`;
/// anything else is a caller bug and panics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    len: usize,
    words: Vec<u64>,
}

impl Bitmap {
    #[must_use]
    pub fn new(len: usize, value: bool) -> Self {
        let mut bitmap = Self {
            len,
            words: vec![0; len.div_ceil(WORD_BITS)],
        };
        bitmap.set(0, len, value);
        bitmap
    }

    /// Like [`Bitmap::new`] but reports allocation failure instead of aborting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Allocation`] if the word storage cannot be reserved.
    pub fn try_new(len: usize, value: bool) -> Result<Self> {
        let word_count = len.div_ceil(WORD_BITS);
        let mut words = Vec::new();
        words
            .try_reserve_exact(word_count)
            .map_err(|err| Error::Allocation {
                details: Cow::Owned(format!("bitmap of {len} bits: {err}")),
            })?;
        words.resize(word_count, 0);
        let mut bitmap = Self { len, words };
        bitmap.set(0, len, value);
        Ok(bitmap)
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn get(&self, pos: usize) -> bool {
        assert!(pos < self.len, "bit {pos} out of bounds for length {}", self.len);
        (self.words[pos / WORD_BITS] >> (pos % WORD_BITS)) & 1 == 1
    }

    pub fn set(&mut self, start: usize, stop: usize, value: bool) {
        self.check_range(start, stop);
        if start == stop {
            return;
        }
        let words = word_span(start, stop);
        let (first, last) = (words.start, words.end - 1);
        let fill = if value { u64::MAX } else { 0 };

        if first == last {
            self.apply_fill(first, range_mask(first, start, stop), value);
            return;
        }
        self.apply_fill(first, range_mask(first, start, stop), value);
        // Interior words are covered entirely.
        self.words[first + 1..last].fill(fill);
        self.apply_fill(last, range_mask(last, start, stop), value);
    }

    /// Index of the first bit in `[start, stop)` equal to `value`.
    #[must_use]
    pub fn find_first(&self, start: usize, stop: usize, value: bool) -> Option<usize> {
        self.check_range(start, stop);
        if start == stop {
            return None;
        }
        word_span(start, stop).find_map(|word| {
            let hits = self.oriented(word, value) & range_mask(word, start, stop);
            (hits != 0).then(|| word * WORD_BITS + hits.trailing_zeros() as usize)
        })
    }

    /// Index of the last bit in `[start, stop)` equal to `value`.
    #[must_use]
    pub fn find_last(&self, start: usize, stop: usize, value: bool) -> Option<usize> {
        self.check_range(start, stop);
        if start == stop {
            return None;
        }
        word_span(start, stop).rev().find_map(|word| {
            let hits = self.oriented(word, value) & range_mask(word, start, stop);
            (hits != 0).then(|| word * WORD_BITS + (WORD_BITS - 1) - hits.leading_zeros() as usize)
        })
    }

    /// `self[start..stop] ^= other[start..stop]`.
    pub fn combine_xor(&mut self, other: &Self, start: usize, stop: usize) {
        self.combine(other, start, stop, |dst, src, mask| dst ^ (src & mask));
    }

    /// `self[start..stop] &= other[start..stop]`.
    pub fn combine_and(&mut self, other: &Self, start: usize, stop: usize) {
        self.combine(other, start, stop, |dst, src, mask| dst & (src | !mask));
    }

    /// `self[start..stop] |= other[start..stop]`.
    pub fn combine_or(&mut self, other: &Self, start: usize, stop: usize) {
        self.combine(other, start, stop, |dst, src, mask| dst | (src & mask));
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(|pos| self.get(pos))
    }

    fn combine(&mut self, other: &Self, start: usize, stop: usize, op: impl Fn(u64, u64, u64) -> u64) {
        assert_eq!(
            self.len, other.len,
            "cannot combine bitmaps of different lengths"
        );
        self.check_range(start, stop);
        if start == stop {
            return;
        }
        for word in word_span(start, stop) {
            let mask = range_mask(word, start, stop);
            self.words[word] = op(self.words[word], other.words[word], mask);
        }
    }

    fn apply_fill(&mut self, word: usize, mask: u64, value: bool) {
        if value {
            self.words[word] |= mask;
        } else {
            self.words[word] &= !mask;
        }
    }

    fn oriented(&self, word: usize, value: bool) -> u64 {
        if value {
            self.words[word]
        } else {
            !self.words[word]
        }
    }

    fn check_range(&self, start: usize, stop: usize) {
        assert!(
            start <= stop && stop <= self.len,
            "bitmap range {start}..{stop} out of bounds for length {}",
            self.len
        );
    }
}

/// Words touched by a non-empty range.
const fn word_span(start: usize, stop: usize) -> Range<usize> {
    start / WORD_BITS..stop.div_ceil(WORD_BITS)
}

/// Bits of `word` that fall inside `[start, stop)`.
fn range_mask(word: usize, start: usize, stop: usize) -> u64 {
    let base = word * WORD_BITS;
    let lo = start.saturating_sub(base);
    let hi = (stop - base).min(WORD_BITS);
    let width = hi - lo;
    if width == WORD_BITS {
        u64::MAX
    } else {
        ((1_u64 << width) - 1) << lo
    }
}
