//! Signature sets: ordered per-block fingerprints of a reference blob.
//!
//! Each block of the reference gets a weak sum (the rolling checksum) and a
//! strong sum truncated to `strong_sum_len` bytes. Blocks are kept in the
//! order they were added, which is their position in the reference, so the
//! source offset of block `i` is `i * block_len`.

use std::fmt::{self, Write as _};
use std::io::Read;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::checksum::{weak_sum, RolloutVariant};
use crate::config::{validate_params, SignatureConfig};
use crate::error::{Result, SumsetError};
use crate::format::{record_len, SIGNATURE_HEADER_LEN};
use crate::hash::{StrongSum, BLAKE2_SUM_LEN, MD4_SUM_LEN};
use crate::hashtable::TableKey;

/// Capacity of the first allocation when a set grows from empty.
const INITIAL_CAPACITY: usize = 16;

/// Hash-algorithm identity of a signature, as written in its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum SignatureMagic {
    /// MD4 strong sums, 16 bytes.
    Md4 = 0x7273_0136,
    /// BLAKE2b strong sums, 32 bytes.
    Blake2 = 0x7273_0137,
}

impl SignatureMagic {
    /// Magic used when the caller passes 0.
    pub const DEFAULT: Self = Self::Blake2;

    /// Convert from the raw header value; 0 selects [`Self::DEFAULT`].
    ///
    /// # Errors
    ///
    /// Returns `BadMagic` for any other unknown value.
    pub fn from_u32(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Self::DEFAULT),
            0x7273_0136 => Ok(Self::Md4),
            0x7273_0137 => Ok(Self::Blake2),
            _ => {
                tracing::error!(magic = format_args!("{value:#x}"), "invalid magic");
                Err(SumsetError::BadMagic(value))
            }
        }
    }

    /// Raw header value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    /// Length of the full strong digest for this magic.
    #[must_use]
    pub const fn max_strong_sum_len(self) -> usize {
        match self {
            Self::Md4 => MD4_SUM_LEN,
            Self::Blake2 => BLAKE2_SUM_LEN,
        }
    }

    /// Rollout arithmetic matchers use for this format unless overridden.
    #[must_use]
    pub const fn default_rollout(self) -> RolloutVariant {
        match self {
            Self::Md4 => RolloutVariant::Legacy,
            Self::Blake2 => RolloutVariant::Exact,
        }
    }
}

impl TryFrom<u32> for SignatureMagic {
    type Error = SumsetError;

    fn try_from(value: u32) -> Result<Self> {
        Self::from_u32(value)
    }
}

impl fmt::Display for SignatureMagic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.as_u32())
    }
}

/// Fingerprint of a single reference block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSignature {
    /// Block position in the reference blob.
    pub index: u32,
    /// Rolling checksum of the block.
    pub weak_sum: u32,
    /// Strong sum, already truncated to the set's `strong_sum_len`.
    pub strong_sum: StrongSum,
}

impl BlockSignature {
    /// Create a new block signature.
    #[must_use]
    pub const fn new(index: u32, weak_sum: u32, strong_sum: StrongSum) -> Self {
        Self {
            index,
            weak_sum,
            strong_sum,
        }
    }
}

impl TableKey for BlockSignature {
    #[inline]
    fn table_hash(&self) -> u32 {
        self.weak_sum
    }
}

/// Ordered, growable collection of block signatures plus format metadata.
///
/// # Example
///
/// ```rust
/// use sumset::{SignatureSet, SignatureMagic};
///
/// let mut set = SignatureSet::new(SignatureMagic::Md4.as_u32(), 1024, 8, 0).unwrap();
/// let pos = set.add_block(0x0018_000f, &[0xaa; 16]).unwrap();
///
/// assert_eq!(pos, 0);
/// assert_eq!(set.block(0).unwrap().strong_sum.len(), 8);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureSet {
    magic: SignatureMagic,
    block_len: usize,
    strong_sum_len: usize,
    rollout: RolloutVariant,
    blocks: Vec<BlockSignature>,
}

impl SignatureSet {
    /// Create an empty set from a raw magic value.
    ///
    /// `strong_sum_len` of 0 selects the magic's full digest length. A
    /// nonzero `expected_total_bytes` (the size of the serialized signature
    /// stream) pre-sizes storage to the exact block count it implies.
    ///
    /// # Errors
    ///
    /// Returns `BadMagic` for an unknown magic and `ParamError` for an
    /// out-of-range length. Nothing is allocated in either case.
    pub fn new(
        magic: u32,
        block_len: usize,
        strong_sum_len: usize,
        expected_total_bytes: u64,
    ) -> Result<Self> {
        let magic = SignatureMagic::from_u32(magic)?;
        Self::with_magic(magic, block_len, strong_sum_len, expected_total_bytes)
    }

    /// Create an empty set for a known magic.
    ///
    /// # Errors
    ///
    /// Returns `ParamError` for an out-of-range length.
    pub fn with_magic(
        magic: SignatureMagic,
        block_len: usize,
        strong_sum_len: usize,
        expected_total_bytes: u64,
    ) -> Result<Self> {
        Self::create(
            magic,
            block_len,
            strong_sum_len,
            magic.default_rollout(),
            expected_total_bytes,
        )
    }

    /// Create an empty set from a configuration.
    ///
    /// # Errors
    ///
    /// Returns `ParamError` for an out-of-range length.
    pub fn with_config(config: &SignatureConfig, expected_total_bytes: u64) -> Result<Self> {
        Self::create(
            config.magic,
            config.block_len,
            config.strong_sum_len,
            config.effective_rollout(),
            expected_total_bytes,
        )
    }

    fn create(
        magic: SignatureMagic,
        block_len: usize,
        strong_sum_len: usize,
        rollout: RolloutVariant,
        expected_total_bytes: u64,
    ) -> Result<Self> {
        let strong_sum_len = validate_params(magic, block_len, strong_sum_len)?;

        let mut set = Self {
            magic,
            block_len,
            strong_sum_len,
            rollout,
            blocks: Vec::new(),
        };

        let presize = Self::capacity_for(expected_total_bytes, strong_sum_len);
        if presize > 0 {
            set.blocks
                .try_reserve_exact(presize)
                .map_err(|_| SumsetError::AllocationFailure { requested: presize })?;
        }

        tracing::debug!(
            magic = %magic,
            block_len,
            strong_sum_len,
            capacity = presize,
            "created signature set"
        );
        Ok(set)
    }

    /// Number of blocks a serialized stream of `expected_total_bytes` holds.
    ///
    /// A count that does not fit in `usize` saturates, so reserving it fails
    /// with `AllocationFailure`.
    #[must_use]
    pub fn capacity_for(expected_total_bytes: u64, strong_sum_len: usize) -> usize {
        if expected_total_bytes == 0 {
            return 0;
        }
        let body = expected_total_bytes.saturating_sub(SIGNATURE_HEADER_LEN as u64);
        usize::try_from(body / record_len(strong_sum_len) as u64).unwrap_or(usize::MAX)
    }

    /// Append a block, keeping only the first `strong_sum_len` bytes of
    /// `strong_sum`.
    ///
    /// Returns the position of the new block.
    ///
    /// # Errors
    ///
    /// Returns `ParamError` if `strong_sum` is shorter than the set's
    /// strong-sum length or the block count no longer fits the index type,
    /// and `AllocationFailure` if growing the storage fails.
    pub fn add_block(&mut self, weak_sum: u32, strong_sum: &[u8]) -> Result<usize> {
        if strong_sum.len() < self.strong_sum_len {
            return Err(SumsetError::ParamError(format!(
                "strong sum has {} bytes, signature needs {}",
                strong_sum.len(),
                self.strong_sum_len
            )));
        }
        let position = self.blocks.len();
        let index = u32::try_from(position).map_err(|_| {
            SumsetError::ParamError(format!("block count {position} exceeds u32::MAX"))
        })?;

        if self.blocks.len() == self.blocks.capacity() {
            self.grow()?;
        }
        self.blocks.push(BlockSignature::new(
            index,
            weak_sum,
            StrongSum::from_slice(&strong_sum[..self.strong_sum_len]),
        ));
        Ok(position)
    }

    /// Double the capacity, starting at 16.
    fn grow(&mut self) -> Result<()> {
        let capacity = self.blocks.capacity();
        let target = if capacity == 0 {
            INITIAL_CAPACITY
        } else {
            capacity.saturating_mul(2)
        };
        self.blocks
            .try_reserve_exact(target - self.blocks.len())
            .map_err(|_| SumsetError::AllocationFailure { requested: target })?;
        tracing::trace!(from = capacity, to = target, "grew signature set");
        Ok(())
    }

    /// Build a signature for `data` by hashing each `block_len` chunk.
    ///
    /// The final block may be shorter than `block_len`. Inputs larger than
    /// the configured threshold are hashed in parallel; blocks are always
    /// appended in order.
    ///
    /// # Errors
    ///
    /// Returns `ParamError` for invalid parameters and `AllocationFailure`
    /// if storage cannot be reserved.
    pub fn generate(config: &SignatureConfig, data: &[u8]) -> Result<Self> {
        let mut set = Self::with_config(config, 0)?;
        let magic = set.magic;
        let block_count = data.len().div_ceil(set.block_len);
        set.blocks
            .try_reserve_exact(block_count)
            .map_err(|_| SumsetError::AllocationFailure {
                requested: block_count,
            })?;

        let hash_block = |chunk: &[u8]| (weak_sum(chunk), StrongSum::compute(magic, chunk));
        let sums: Vec<(u32, StrongSum)> = if data.len() > config.parallel_threshold {
            data.par_chunks(set.block_len).map(hash_block).collect()
        } else {
            data.chunks(set.block_len).map(hash_block).collect()
        };

        for (weak, strong) in &sums {
            set.add_block(*weak, strong.as_bytes())?;
        }

        tracing::debug!(
            bytes = data.len(),
            blocks = set.len(),
            parallel = data.len() > config.parallel_threshold,
            "generated signature"
        );
        Ok(set)
    }

    /// Build a signature from everything `reader` yields.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if reading fails, otherwise as
    /// [`generate`](Self::generate).
    pub fn generate_from_reader<R: Read>(config: &SignatureConfig, reader: &mut R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::generate(config, &data)
    }

    /// Hash-algorithm identity.
    #[must_use]
    pub const fn magic(&self) -> SignatureMagic {
        self.magic
    }

    /// Bytes per block.
    #[must_use]
    pub const fn block_len(&self) -> usize {
        self.block_len
    }

    /// Stored strong-sum length.
    #[must_use]
    pub const fn strong_sum_len(&self) -> usize {
        self.strong_sum_len
    }

    /// Rollout arithmetic matchers should use with this set.
    #[must_use]
    pub const fn rollout(&self) -> RolloutVariant {
        self.rollout
    }

    /// Replace the rollout arithmetic, e.g. after parsing a stream, which
    /// does not record it.
    #[must_use]
    pub fn with_rollout(mut self, rollout: RolloutVariant) -> Self {
        self.rollout = rollout;
        self
    }

    /// Number of blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Check if the set holds no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Number of blocks that fit before the next growth.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.blocks.capacity()
    }

    /// All blocks in reference order.
    #[must_use]
    pub fn blocks(&self) -> &[BlockSignature] {
        &self.blocks
    }

    /// Block at `index`, if present.
    #[must_use]
    pub fn block(&self, index: usize) -> Option<&BlockSignature> {
        self.blocks.get(index)
    }

    /// Iterate over blocks in reference order.
    pub fn iter(&self) -> std::slice::Iter<'_, BlockSignature> {
        self.blocks.iter()
    }

    /// Byte offset of block `index` in the reference blob.
    #[must_use]
    pub fn block_offset(&self, index: u32) -> u64 {
        u64::from(index) * self.block_len as u64
    }

    /// Human-readable listing of the set, one block per line.
    #[must_use]
    pub fn render_dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "sumset info: magic={:x}, block_len={}, block_num={}",
            self.magic.as_u32(),
            self.block_len,
            self.len()
        );
        for (i, block) in self.blocks.iter().enumerate() {
            let _ = writeln!(
                out,
                "sum {i:6}: weak={:08x}, strong={}",
                block.weak_sum, block.strong_sum
            );
        }
        out
    }

    /// Log the set at INFO level, one event per block.
    pub fn dump(&self) {
        tracing::info!(
            magic = format_args!("{:x}", self.magic.as_u32()),
            block_len = self.block_len,
            block_num = self.len(),
            "sumset info"
        );
        for (i, block) in self.blocks.iter().enumerate() {
            tracing::info!(
                index = i,
                weak = format_args!("{:08x}", block.weak_sum),
                strong = %block.strong_sum,
                "sum"
            );
        }
    }
}

impl<'a> IntoIterator for &'a SignatureSet {
    type Item = &'a BlockSignature;
    type IntoIter = std::slice::Iter<'a, BlockSignature>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}
