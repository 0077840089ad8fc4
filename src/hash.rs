//! Strong sums used to confirm weak-sum candidates.
//!
//! The signature magic selects the digest: BLAKE2b with a 32-byte output, or
//! MD4 for the legacy format. A signature stores only the first
//! `strong_sum_len` bytes of each digest.

use std::fmt;

use blake2::Blake2b;
use digest::consts::U32;
use digest::Digest;
use md4::Md4;
use serde::{Deserialize, Serialize};

use crate::signature::SignatureMagic;

/// Largest digest any supported magic produces.
pub const MAX_STRONG_SUM_LEN: usize = 32;

/// Digest length of the BLAKE2 signature format.
pub const BLAKE2_SUM_LEN: usize = 32;

/// Digest length of the MD4 signature format.
pub const MD4_SUM_LEN: usize = 16;

type Blake2b256 = Blake2b<U32>;

/// A strong sum of up to [`MAX_STRONG_SUM_LEN`] bytes.
///
/// Equality, hashing and display only consider the first `len()` bytes.
///
/// # Example
///
/// ```rust
/// use sumset::{StrongSum, SignatureMagic};
///
/// let full = StrongSum::compute(SignatureMagic::Blake2, b"block");
/// assert_eq!(full.len(), 32);
///
/// let short = full.truncated(8);
/// assert_eq!(short.as_bytes(), &full.as_bytes()[..8]);
/// ```
#[derive(Clone, Copy, Serialize, Deserialize)]
pub struct StrongSum {
    bytes: [u8; MAX_STRONG_SUM_LEN],
    len: u8,
}

impl StrongSum {
    /// Compute the full-length digest of `data` for `magic`.
    #[must_use]
    pub fn compute(magic: SignatureMagic, data: &[u8]) -> Self {
        match magic {
            SignatureMagic::Blake2 => Self::from_slice(&Blake2b256::digest(data)),
            SignatureMagic::Md4 => Self::from_slice(&Md4::digest(data)),
        }
    }

    /// Copy at most [`MAX_STRONG_SUM_LEN`] bytes from `bytes`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_slice(bytes: &[u8]) -> Self {
        let len = bytes.len().min(MAX_STRONG_SUM_LEN);
        let mut buf = [0u8; MAX_STRONG_SUM_LEN];
        buf[..len].copy_from_slice(&bytes[..len]);
        Self {
            bytes: buf,
            len: len as u8,
        }
    }

    /// Keep only the first `len` bytes (clamped to the current length).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn truncated(&self, len: usize) -> Self {
        let len = len.min(self.len());
        let mut out = *self;
        out.bytes[len..].fill(0);
        out.len = len as u8;
        out
    }

    /// Significant bytes of the sum.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len()]
    }

    /// Number of significant bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len as usize
    }

    /// Check if the sum has no significant bytes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Compare the first `len` bytes of both sums.
    ///
    /// Returns `false` when either sum is shorter than `len`.
    #[must_use]
    pub fn eq_prefix(&self, other: &Self, len: usize) -> bool {
        len <= self.len() && len <= other.len() && self.bytes[..len] == other.bytes[..len]
    }
}

/// Full-length strong sum of `data`.
#[inline]
#[must_use]
pub fn strong_sum(magic: SignatureMagic, data: &[u8]) -> StrongSum {
    StrongSum::compute(magic, data)
}

impl PartialEq for StrongSum {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for StrongSum {}

impl std::hash::Hash for StrongSum {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl fmt::Debug for StrongSum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StrongSum({})", hex::encode(self.as_bytes()))
    }
}

impl fmt::Display for StrongSum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.as_bytes()))
    }
}

impl Default for StrongSum {
    fn default() -> Self {
        Self {
            bytes: [0u8; MAX_STRONG_SUM_LEN],
            len: 0,
        }
    }
}

impl AsRef<[u8]> for StrongSum {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Truncation always yields a prefix of the requested length
        #[test]
        fn truncation_correct(
            data in prop::collection::vec(any::<u8>(), 0..200),
            len in 0usize..40
        ) {
            let full = StrongSum::compute(SignatureMagic::Blake2, &data);
            let short = full.truncated(len);
            let expected = len.min(BLAKE2_SUM_LEN);
            prop_assert_eq!(short.len(), expected);
            prop_assert_eq!(short.as_bytes(), &full.as_bytes()[..expected]);
        }

        /// Different inputs give different digests
        #[test]
        fn collision_resistant(
            a in prop::collection::vec(any::<u8>(), 1..100),
            b in prop::collection::vec(any::<u8>(), 1..100)
        ) {
            if a != b {
                prop_assert_ne!(
                    StrongSum::compute(SignatureMagic::Md4, &a),
                    StrongSum::compute(SignatureMagic::Md4, &b)
                );
            }
        }
    }
}
