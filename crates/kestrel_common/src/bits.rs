//! Packed bit vectors for LUT and memory initialization data.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of bits stored per `u64` word.
const BITS_PER_WORD: u32 = 64;

/// A fixed-width, LSB-first vector of bits packed 64 per word.
///
/// Bit index 0 is the least significant entry of an INIT truth table (the
/// value read at address 0). Slicing with [`extract`](Self::extract) and
/// re-joining with [`concat`](Self::concat) in the same order reproduces the
/// original vector bit-for-bit.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BitVec {
    width: u32,
    data: Vec<u64>,
}

impl BitVec {
    /// Creates an all-zero vector of the given width.
    pub fn new(width: u32) -> Self {
        Self {
            width,
            data: vec![0; word_count(width)],
        }
    }

    /// Creates a vector of the given width from the low bits of `value`.
    ///
    /// Bits of `value` above `width` are discarded; widths above 64 are
    /// zero-filled beyond bit 63.
    pub fn from_u64(value: u64, width: u32) -> Self {
        let mut v = Self::new(width);
        if !v.data.is_empty() {
            let masked = if width >= 64 {
                value
            } else {
                value & low_mask(width)
            };
            v.data[0] = masked;
        }
        v
    }

    /// Creates a vector from a slice of bools, index 0 first.
    pub fn from_bits(bits: &[bool]) -> Self {
        let mut v = Self::new(bits.len() as u32);
        for (i, &b) in bits.iter().enumerate() {
            v.set(i as u32, b);
        }
        v
    }

    /// Returns the number of bits in this vector.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Gets the bit at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.width()`.
    pub fn get(&self, index: u32) -> bool {
        assert!(
            index < self.width,
            "bit index {index} out of bounds for width {}",
            self.width
        );
        let word = (index / BITS_PER_WORD) as usize;
        let bit = index % BITS_PER_WORD;
        (self.data[word] >> bit) & 1 != 0
    }

    /// Sets the bit at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.width()`.
    pub fn set(&mut self, index: u32, value: bool) {
        assert!(
            index < self.width,
            "bit index {index} out of bounds for width {}",
            self.width
        );
        let word = (index / BITS_PER_WORD) as usize;
        let bit = index % BITS_PER_WORD;
        if value {
            self.data[word] |= 1u64 << bit;
        } else {
            self.data[word] &= !(1u64 << bit);
        }
    }

    /// Extracts the contiguous sub-range `[offset, offset + len)`.
    ///
    /// # Panics
    ///
    /// Panics if the range extends past the end of the vector.
    pub fn extract(&self, offset: u32, len: u32) -> BitVec {
        assert!(
            offset + len <= self.width,
            "extract [{offset}, {}) out of bounds for width {}",
            offset + len,
            self.width
        );
        let mut out = BitVec::new(len);
        for i in 0..len {
            out.set(i, self.get(offset + i));
        }
        out
    }

    /// Concatenates slices in order: `parts[0]` occupies the lowest bits.
    pub fn concat(parts: &[BitVec]) -> BitVec {
        let total: u32 = parts.iter().map(|p| p.width).sum();
        let mut out = BitVec::new(total);
        let mut pos = 0;
        for part in parts {
            for i in 0..part.width {
                out.set(pos + i, part.get(i));
            }
            pos += part.width;
        }
        out
    }

    /// Returns a copy widened to `width` with zeros in the new high bits.
    ///
    /// # Panics
    ///
    /// Panics if `width < self.width()`.
    pub fn zero_extend(&self, width: u32) -> BitVec {
        assert!(width >= self.width, "zero_extend cannot shrink");
        let mut out = BitVec::new(width);
        for i in 0..self.width {
            out.set(i, self.get(i));
        }
        out
    }

    /// Returns a copy shifted left by `n`, growing the width by `n`.
    pub fn shift_left(&self, n: u32) -> BitVec {
        let mut out = BitVec::new(self.width + n);
        for i in 0..self.width {
            out.set(i + n, self.get(i));
        }
        out
    }

    /// Returns the low 64 bits as an integer (the whole vector if narrower).
    pub fn as_u64(&self) -> u64 {
        match self.data.first() {
            Some(&w) if self.width >= 64 => w,
            Some(&w) => w & low_mask(self.width),
            None => 0,
        }
    }

    /// Returns `true` if every bit is zero.
    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|&w| w == 0)
    }
}

impl fmt::Debug for BitVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // MSB-first, the way INIT values are written in netlists.
        write!(f, "{}'b", self.width)?;
        for i in (0..self.width).rev() {
            write!(f, "{}", if self.get(i) { '1' } else { '0' })?;
        }
        Ok(())
    }
}

fn word_count(width: u32) -> usize {
    width.div_ceil(BITS_PER_WORD) as usize
}

fn low_mask(width: u32) -> u64 {
    debug_assert!(width < 64);
    (1u64 << width) - 1
}
