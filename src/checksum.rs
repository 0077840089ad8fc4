//! Rolling checksum used as the weak block sum.
//!
//! This module implements the Adler-style weak checksum of the rsync
//! signature format. Bytes are squared before they are summed, and `s1`
//! starts at [`ROLLSUM_INIT`] so that the window length is folded into `s2`.
//! Adding, removing or replacing a byte costs O(1) regardless of window size.

use serde::{Deserialize, Serialize};

/// Initial value of `s1`, so that the window length is encoded in `s2`.
pub const ROLLSUM_INIT: u32 = 1;

/// Arithmetic used when a byte leaves the window.
///
/// Both variants share `rollin` and `rotate`, so a sliding window always
/// tracks a fresh `update` over the same bytes. They differ only in how
/// [`RollingChecksum::rollout`] treats the `INIT` term:
///
/// - `Exact` subtracts `INIT`, which is the algebraic inverse of `rollin`.
///   Rolling every byte back out returns the digest to `0x0000_0001`, and
///   `rotate` equals `rollout` followed by `rollin`.
/// - `Legacy` adds `INIT`, reproducing the older rollout arithmetic. Digests
///   of a shrinking window drift from a fresh `update` over the same bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RolloutVariant {
    /// `s2 -= count * out^2 + INIT`.
    #[default]
    Exact,
    /// `s2 -= count * out^2 - INIT`.
    Legacy,
}

impl RolloutVariant {
    #[inline]
    const fn adjust(self, s2: u32) -> u32 {
        match self {
            Self::Exact => s2.wrapping_sub(ROLLSUM_INIT),
            Self::Legacy => s2.wrapping_add(ROLLSUM_INIT),
        }
    }
}

#[inline]
const fn square(byte: u8) -> u32 {
    let b = byte as u32;
    b * b
}

/// Rolling checksum state for incremental computation.
///
/// `s1` and `s2` wrap at 32 bits on purpose; only their low 16 bits reach
/// the digest.
///
/// # Example
///
/// ```rust
/// use sumset::RollingChecksum;
///
/// let mut sum = RollingChecksum::new();
/// for &b in &[0u8, 1, 2, 3] {
///     sum.rollin(b);
/// }
/// assert_eq!(sum.digest(), 0x0018_000f);
///
/// sum.rotate(0, 4); // window is now [1, 2, 3, 4]
/// assert_eq!(sum.digest(), 0x0036_001f);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollingChecksum {
    /// Number of bytes in the window
    count: usize,
    /// Sum of squared bytes, plus `INIT`
    s1: u32,
    /// Sum of successive `s1` values
    s2: u32,
    variant: RolloutVariant,
}

impl RollingChecksum {
    /// Create an empty checksum using the [`RolloutVariant::Exact`] arithmetic.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_variant(RolloutVariant::Exact)
    }

    /// Create an empty checksum with an explicit rollout arithmetic.
    #[must_use]
    pub const fn with_variant(variant: RolloutVariant) -> Self {
        Self {
            count: 0,
            s1: ROLLSUM_INIT,
            s2: 0,
            variant,
        }
    }

    /// Create a checksum over `data`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use sumset::RollingChecksum;
    ///
    /// let data: Vec<u8> = (0..=255).collect();
    /// assert_eq!(RollingChecksum::from_bytes(&data).digest(), 0x4100_d581);
    /// ```
    #[must_use]
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut sum = Self::new();
        sum.update(data);
        sum
    }

    /// Reset to the empty window, keeping the selected variant.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::with_variant(self.variant);
    }

    /// Add every byte of `buf` to the window.
    ///
    /// Produces the same state as calling [`rollin`](Self::rollin) for each
    /// byte. Full 16-byte chunks are folded in one step:
    /// `s2 += 16 * s1 + sum((16 - i) * x_i^2)` and `s1 += sum(x_i^2)`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn update(&mut self, buf: &[u8]) {
        const CHUNK: usize = 16;

        let mut s1 = self.s1;
        let mut s2 = self.s2;

        let mut chunks = buf.chunks_exact(CHUNK);
        for chunk in &mut chunks {
            let mut sum = 0u32;
            let mut weighted = 0u32;
            for (i, &byte) in chunk.iter().enumerate() {
                let sq = square(byte);
                sum = sum.wrapping_add(sq);
                weighted = weighted.wrapping_add((CHUNK - i) as u32 * sq);
            }
            s2 = s2
                .wrapping_add(s1.wrapping_mul(CHUNK as u32))
                .wrapping_add(weighted);
            s1 = s1.wrapping_add(sum);
        }
        for &byte in chunks.remainder() {
            s1 = s1.wrapping_add(square(byte));
            s2 = s2.wrapping_add(s1);
        }

        self.s1 = s1;
        self.s2 = s2;
        self.count += buf.len();
    }

    /// Append one byte to the window.
    #[inline]
    pub fn rollin(&mut self, byte: u8) {
        self.s1 = self.s1.wrapping_add(square(byte));
        self.s2 = self.s2.wrapping_add(self.s1);
        self.count += 1;
    }

    /// Remove the oldest byte from the window.
    ///
    /// `byte` must be the oldest byte still in the window. This is not
    /// checked beyond a debug assertion that the window is non-empty.
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub fn rollout(&mut self, byte: u8) {
        debug_assert!(self.count > 0, "rollout on an empty window");
        let sq = square(byte);
        self.s1 = self.s1.wrapping_sub(sq);
        self.s2 = self
            .variant
            .adjust(self.s2.wrapping_sub((self.count as u32).wrapping_mul(sq)));
        self.count -= 1;
    }

    /// Replace the oldest byte `out` with `in_byte` at the end of the window.
    ///
    /// The window length is unchanged. The arithmetic is the same for both
    /// rollout variants.
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub fn rotate(&mut self, out: u8, in_byte: u8) {
        let out_sq = square(out);
        self.s1 = self.s1.wrapping_add(square(in_byte)).wrapping_sub(out_sq);
        self.s2 = self
            .s2
            .wrapping_add(self.s1)
            .wrapping_sub((self.count as u32).wrapping_mul(out_sq))
            .wrapping_sub(ROLLSUM_INIT);
    }

    /// The 32-bit weak sum: `s2` in the high half, `s1` in the low half.
    #[inline]
    #[must_use]
    pub const fn digest(&self) -> u32 {
        (self.s2 << 16) | (self.s1 & 0xffff)
    }

    /// Number of bytes currently in the window.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    /// Check if the window is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Raw `s1` component.
    #[inline]
    #[must_use]
    pub const fn s1(&self) -> u32 {
        self.s1
    }

    /// Raw `s2` component.
    #[inline]
    #[must_use]
    pub const fn s2(&self) -> u32 {
        self.s2
    }

    /// Rollout arithmetic in use.
    #[inline]
    #[must_use]
    pub const fn variant(&self) -> RolloutVariant {
        self.variant
    }
}

impl Default for RollingChecksum {
    fn default() -> Self {
        Self::new()
    }
}

/// Weak sum of a whole block.
#[inline]
#[must_use]
pub fn weak_sum(block: &[u8]) -> u32 {
    RollingChecksum::from_bytes(block).digest()
}
