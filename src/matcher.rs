//! Matching a new blob against a reference signature.
//!
//! The signature's blocks are indexed by weak sum in a [`HashTable`]. A
//! scanner slides a `block_len` window over the new data one byte at a time,
//! updating the weak sum with [`RollingChecksum::rotate`]. Every window is
//! probed; the strong sum of the window is computed only when some block's
//! weak sum agrees, and at most once per window.

use std::io::Write;

use crate::checksum::RollingChecksum;
use crate::error::{Result, SumsetError};
use crate::hash::StrongSum;
use crate::hashtable::{HashTable, Probe, TableKey};
use crate::signature::{BlockSignature, SignatureMagic, SignatureSet};

/// Weak-sum index over the blocks of a [`SignatureSet`].
#[derive(Debug)]
pub struct SignatureIndex<'s> {
    set: &'s SignatureSet,
    table: HashTable<'s, BlockSignature>,
}

impl<'s> SignatureIndex<'s> {
    /// Index every block of `set`.
    ///
    /// # Errors
    ///
    /// Returns `AllocationFailure` if the table cannot be allocated.
    pub fn build(set: &'s SignatureSet) -> Result<Self> {
        let bucket_count = set.len().max(1).next_power_of_two();
        let mut table = HashTable::with_capacity(bucket_count, set.len())?;
        for block in set {
            table.insert(block)?;
        }
        tracing::debug!(
            blocks = set.len(),
            buckets = bucket_count,
            "built signature index"
        );
        Ok(Self { set, table })
    }

    /// Signature this index was built from.
    #[must_use]
    pub const fn set(&self) -> &'s SignatureSet {
        self.set
    }

    /// Number of indexed blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Check if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Find the first block whose weak sum is `weak_sum` and whose strong
    /// sum matches `window`.
    #[must_use]
    pub fn find(&self, weak_sum: u32, window: &[u8]) -> Option<&'s BlockSignature> {
        self.find_with(&mut BlockProbe::new(self.set, weak_sum, window))
    }

    /// Find with a caller-owned probe, so its counters can be inspected.
    pub fn find_with(&self, probe: &mut BlockProbe<'_>) -> Option<&'s BlockSignature> {
        self.table.find(probe)
    }
}

/// Lookup key for one window of the new data.
///
/// The window's strong sum is computed on the first weak-sum hit and reused
/// for later candidates in the same chain.
#[derive(Debug)]
pub struct BlockProbe<'d> {
    weak_sum: u32,
    window: &'d [u8],
    magic: SignatureMagic,
    strong_sum_len: usize,
    strong_sum: Option<StrongSum>,
    weak_hits: usize,
    false_matches: usize,
}

impl<'d> BlockProbe<'d> {
    /// Probe for `window`, whose weak sum is `weak_sum`, against `set`.
    #[must_use]
    pub fn new(set: &SignatureSet, weak_sum: u32, window: &'d [u8]) -> Self {
        Self {
            weak_sum,
            window,
            magic: set.magic(),
            strong_sum_len: set.strong_sum_len(),
            strong_sum: None,
            weak_hits: 0,
            false_matches: 0,
        }
    }

    /// Whether the strong sum has been computed.
    #[must_use]
    pub const fn computed_strong_sum(&self) -> bool {
        self.strong_sum.is_some()
    }

    /// Candidates whose weak sum matched.
    #[must_use]
    pub const fn weak_hits(&self) -> usize {
        self.weak_hits
    }

    /// Candidates whose weak sum matched but whose strong sum did not.
    #[must_use]
    pub const fn false_matches(&self) -> usize {
        self.false_matches
    }

    fn window_sum(&mut self) -> StrongSum {
        if let Some(sum) = self.strong_sum {
            return sum;
        }
        let sum = StrongSum::compute(self.magic, self.window);
        self.strong_sum = Some(sum);
        sum
    }
}

impl TableKey for BlockProbe<'_> {
    #[inline]
    fn table_hash(&self) -> u32 {
        self.weak_sum
    }
}

impl Probe<BlockSignature> for BlockProbe<'_> {
    fn matches(&mut self, entry: &BlockSignature) -> bool {
        if entry.weak_sum != self.weak_sum {
            return false;
        }
        self.weak_hits += 1;
        if self
            .window_sum()
            .eq_prefix(&entry.strong_sum, self.strong_sum_len)
        {
            true
        } else {
            self.false_matches += 1;
            false
        }
    }
}

/// One step of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchEvent {
    /// `len` bytes at `offset` in the new data equal reference block `index`.
    Block {
        /// Matched block position in the signature.
        index: u32,
        /// Start of the match in the scanned data.
        offset: u64,
        /// Match length; shorter than `block_len` only for a final block.
        len: usize,
    },
    /// A byte with no matching block.
    Literal(u8),
}

/// Counters gathered during a scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Number of block matches.
    pub matched_blocks: usize,
    /// Bytes covered by block matches.
    pub matched_bytes: u64,
    /// Bytes emitted as literals.
    pub literal_bytes: u64,
    /// Weak-sum agreements seen while probing.
    pub weak_hits: usize,
    /// Weak-sum agreements rejected by the strong sum.
    pub false_matches: usize,
    /// Windows whose strong sum was computed.
    pub strong_sums_computed: usize,
}

impl ScanStats {
    fn absorb(&mut self, probe: &BlockProbe<'_>) {
        self.weak_hits += probe.weak_hits;
        self.false_matches += probe.false_matches;
        if probe.computed_strong_sum() {
            self.strong_sums_computed += 1;
        }
    }

    /// Fraction of scanned bytes covered by matches.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn match_ratio(&self) -> f64 {
        let total = self.matched_bytes + self.literal_bytes;
        if total == 0 {
            return 0.0;
        }
        self.matched_bytes as f64 / total as f64
    }
}

/// Reconstruction instruction derived from a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOp {
    /// Copy `len` bytes from `offset` in the reference.
    Copy {
        /// Source offset in the reference blob.
        offset: u64,
        /// Number of bytes to copy.
        len: u64,
    },
    /// Insert these bytes.
    Literal(Vec<u8>),
}

impl MatchOp {
    /// Bytes this operation produces.
    #[must_use]
    pub fn output_len(&self) -> u64 {
        match self {
            Self::Copy { len, .. } => *len,
            Self::Literal(data) => data.len() as u64,
        }
    }
}

/// Scanner over new data for one signature.
///
/// # Example
///
/// ```rust
/// use sumset::{Matcher, SignatureBuilder, SignatureIndex, SignatureSet};
///
/// let reference = b"0123456789abcdefghijklmnopqrstuv";
/// let config = SignatureBuilder::new().block_len(8).build().unwrap();
/// let set = SignatureSet::generate(&config, reference).unwrap();
/// let index = SignatureIndex::build(&set).unwrap();
///
/// let new_data = b"XX0123456789abcdefghijklmnopqrstuv";
/// let (ops, stats) = Matcher::new(&index).collect_ops(new_data);
///
/// assert_eq!(stats.matched_blocks, 4);
/// assert_eq!(stats.literal_bytes, 2);
/// assert_eq!(sumset::apply_ops(reference, &ops).unwrap(), new_data);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Matcher<'i, 's> {
    index: &'i SignatureIndex<'s>,
}

impl<'i, 's> Matcher<'i, 's> {
    /// Create a matcher over `index`.
    #[must_use]
    pub const fn new(index: &'i SignatureIndex<'s>) -> Self {
        Self { index }
    }

    /// Scan `data` with a rolling window, reporting every step to `sink`.
    ///
    /// The window advances one byte per miss and a whole window per hit. In
    /// the last `block_len - 1` bytes the window shrinks with `rollout`, so a
    /// short final reference block can still match.
    pub fn scan<F>(&self, data: &[u8], mut sink: F) -> ScanStats
    where
        F: FnMut(MatchEvent),
    {
        let set = self.index.set();
        let block_len = set.block_len();
        let mut stats = ScanStats::default();

        if self.index.is_empty() {
            for &byte in data {
                sink(MatchEvent::Literal(byte));
            }
            stats.literal_bytes = data.len() as u64;
            self.log_stats(data.len(), &stats);
            return stats;
        }

        let mut sum = RollingChecksum::with_variant(set.rollout());
        let mut start = 0usize;
        let mut end = block_len.min(data.len());
        sum.update(&data[start..end]);

        while start < data.len() {
            let window = &data[start..end];
            let mut probe = BlockProbe::new(set, sum.digest(), window);
            let hit = self.index.find_with(&mut probe);
            stats.absorb(&probe);

            if let Some(block) = hit {
                sink(MatchEvent::Block {
                    index: block.index,
                    offset: start as u64,
                    len: window.len(),
                });
                stats.matched_blocks += 1;
                stats.matched_bytes += window.len() as u64;

                start = end;
                end = (start + block_len).min(data.len());
                sum.reset();
                sum.update(&data[start..end]);
            } else {
                let out = data[start];
                sink(MatchEvent::Literal(out));
                stats.literal_bytes += 1;

                if end < data.len() {
                    sum.rotate(out, data[end]);
                    end += 1;
                } else {
                    sum.rollout(out);
                }
                start += 1;
            }
        }

        self.log_stats(data.len(), &stats);
        stats
    }

    /// Scan `data` probing only at multiples of `block_len`.
    ///
    /// Cheaper than [`scan`](Self::scan) but finds only blocks that did not
    /// move. A block without a match is reported byte by byte.
    pub fn scan_aligned<F>(&self, data: &[u8], mut sink: F) -> ScanStats
    where
        F: FnMut(MatchEvent),
    {
        let set = self.index.set();
        let mut stats = ScanStats::default();
        let mut offset = 0u64;

        for chunk in data.chunks(set.block_len()) {
            let weak = RollingChecksum::from_bytes(chunk).digest();
            let mut probe = BlockProbe::new(set, weak, chunk);
            let hit = self.index.find_with(&mut probe);
            stats.absorb(&probe);

            if let Some(block) = hit {
                sink(MatchEvent::Block {
                    index: block.index,
                    offset,
                    len: chunk.len(),
                });
                stats.matched_blocks += 1;
                stats.matched_bytes += chunk.len() as u64;
            } else {
                for &byte in chunk {
                    sink(MatchEvent::Literal(byte));
                }
                stats.literal_bytes += chunk.len() as u64;
            }
            offset += chunk.len() as u64;
        }

        self.log_stats(data.len(), &stats);
        stats
    }

    /// Scan `data` and turn the events into reconstruction operations.
    ///
    /// Adjacent literal bytes are merged, and so are copies of contiguous
    /// reference ranges.
    #[must_use]
    pub fn collect_ops(&self, data: &[u8]) -> (Vec<MatchOp>, ScanStats) {
        let set = self.index.set();
        let mut ops = Vec::new();
        let stats = self.scan(data, |event| match event {
            MatchEvent::Block { index, len, .. } => {
                push_copy(&mut ops, set.block_offset(index), len as u64);
            }
            MatchEvent::Literal(byte) => push_literal_byte(&mut ops, byte),
        });
        (ops, stats)
    }

    fn log_stats(&self, scanned: usize, stats: &ScanStats) {
        tracing::debug!(
            scanned,
            matched_blocks = stats.matched_blocks,
            matched_bytes = stats.matched_bytes,
            literal_bytes = stats.literal_bytes,
            weak_hits = stats.weak_hits,
            false_matches = stats.false_matches,
            strong_sums = stats.strong_sums_computed,
            "scan complete"
        );
    }
}

fn push_copy(ops: &mut Vec<MatchOp>, offset: u64, len: u64) {
    if let Some(MatchOp::Copy {
        offset: prev_offset,
        len: prev_len,
    }) = ops.last_mut()
    {
        if *prev_offset + *prev_len == offset {
            *prev_len += len;
            return;
        }
    }
    ops.push(MatchOp::Copy { offset, len });
}

fn push_literal_byte(ops: &mut Vec<MatchOp>, byte: u8) {
    if let Some(MatchOp::Literal(prev)) = ops.last_mut() {
        prev.push(byte);
        return;
    }
    ops.push(MatchOp::Literal(vec![byte]));
}

/// Write the blob described by `ops` to `output`.
///
/// # Errors
///
/// Returns `Format` if a copy reaches past the end of `reference`, or an
/// I/O error if writing fails.
pub fn write_ops<W: Write>(reference: &[u8], ops: &[MatchOp], output: &mut W) -> Result<()> {
    for op in ops {
        match op {
            MatchOp::Copy { offset, len } => {
                let range = usize::try_from(*offset)
                    .ok()
                    .zip(usize::try_from(*len).ok())
                    .and_then(|(start, len)| Some(start..start.checked_add(len)?))
                    .filter(|range| range.end <= reference.len())
                    .ok_or_else(|| {
                        SumsetError::Format(format!(
                            "copy of {len} bytes at {offset} is outside the {}-byte reference",
                            reference.len()
                        ))
                    })?;
                output.write_all(&reference[range])?;
            }
            MatchOp::Literal(data) => output.write_all(data)?,
        }
    }
    Ok(())
}

/// Rebuild the blob described by `ops` in memory.
///
/// # Errors
///
/// As [`write_ops`].
pub fn apply_ops(reference: &[u8], ops: &[MatchOp]) -> Result<Vec<u8>> {
    let total: u64 = ops.iter().map(MatchOp::output_len).sum();
    let mut out = Vec::with_capacity(usize::try_from(total).unwrap_or(0));
    write_ops(reference, ops, &mut out)?;
    Ok(out)
}
