//! # Sumset
//!
//! Block signatures and weak-sum matching for rsync-style delta encoding.
//!
//! A reference blob is cut into fixed-size blocks. Each block gets a cheap
//! rolling weak sum and a truncated strong sum (BLAKE2b or MD4), and the
//! resulting [`SignatureSet`] can be written in the compact big-endian
//! signature format. To find what a new blob shares with the reference, the
//! set is indexed by weak sum and a window is rolled over the new data one
//! byte at a time; strong sums are computed only for weak-sum hits.
//!
//! ## Features
//!
//! - **Rolling Checksum**: squared-byte Adler variant with O(1) rotate
//! - **Strong Sums**: BLAKE2b-256 or MD4, truncated per signature
//! - **Hash Table**: generic chained multi-map with lazy-comparison probes
//! - **Signature Format**: 12-byte header plus one record per block
//!
//! ## Example
//!
//! ```rust
//! use sumset::{Matcher, SignatureBuilder, SignatureIndex, SignatureSet};
//!
//! let reference = b"The quick brown fox jumps over the lazy dog.";
//! let config = SignatureBuilder::new().block_len(8).strong_sum_len(8).build().unwrap();
//!
//! // Signature of the reference, through the wire format and back
//! let signature = SignatureSet::generate(&config, reference).unwrap();
//! let signature = SignatureSet::from_bytes(&signature.to_bytes().unwrap()).unwrap();
//!
//! // Match a modified blob and rebuild it
//! let modified = b">> The quick brown fox jumps over the lazy dog.";
//! let index = SignatureIndex::build(&signature).unwrap();
//! let (ops, stats) = Matcher::new(&index).collect_ops(modified);
//!
//! assert_eq!(stats.literal_bytes, 3);
//! assert_eq!(sumset::apply_ops(reference, &ops).unwrap(), modified);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

mod checksum;
mod config;
mod error;
mod format;
mod hash;
mod hashtable;
mod matcher;
mod signature;

pub use checksum::{weak_sum, RollingChecksum, RolloutVariant, ROLLSUM_INIT};
pub use config::{
    SignatureBuilder, SignatureConfig, DEFAULT_BLOCK_LEN, DEFAULT_PARALLEL_THRESHOLD,
};
pub use error::{Result, SumsetError};
pub use format::{peek_magic, record_len, SignatureHeader, SIGNATURE_HEADER_LEN};
pub use hash::{strong_sum, StrongSum, BLAKE2_SUM_LEN, MAX_STRONG_SUM_LEN, MD4_SUM_LEN};
pub use hashtable::{mix32, HashTable, Iter, Probe, TableKey};
pub use matcher::{
    apply_ops, write_ops, BlockProbe, MatchEvent, MatchOp, Matcher, ScanStats, SignatureIndex,
};
pub use signature::{BlockSignature, SignatureMagic, SignatureSet};
