//! Binary signature stream.
//!
//! A serialized signature is a header followed by one record per block, all
//! integers big-endian:
//!
//! ```text
//! ┌─────────┬───────────┬────────────────┐
//! │  MAGIC  │ BLOCK_LEN │ STRONG_SUM_LEN │
//! │ 4 bytes │  4 bytes  │    4 bytes     │
//! └─────────┴───────────┴────────────────┘
//! ┌──────────┬────────────────────────────┐
//! │ WEAK_SUM │ STRONG_SUM                 │  x block count
//! │ 4 bytes  │ STRONG_SUM_LEN bytes       │
//! └──────────┴────────────────────────────┘
//! ```
//!
//! The stream carries no block count; records run to end of input.

use std::io::{Read, Write};

use crate::error::{Result, SumsetError};
use crate::signature::{SignatureMagic, SignatureSet};

/// Size of the stream header in bytes.
pub const SIGNATURE_HEADER_LEN: usize = 12;

/// Size of one block record for a given strong-sum length.
#[inline]
#[must_use]
pub const fn record_len(strong_sum_len: usize) -> usize {
    4 + strong_sum_len
}

/// Decoded stream header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Raw magic value.
    pub magic: u32,
    /// Bytes per block.
    pub block_len: u32,
    /// Bytes of strong sum per record.
    pub strong_sum_len: u32,
}

impl SignatureHeader {
    /// Header describing `set`.
    ///
    /// # Errors
    ///
    /// Returns `Format` if a length does not fit in 32 bits.
    pub fn for_set(set: &SignatureSet) -> Result<Self> {
        let block_len = u32::try_from(set.block_len()).map_err(|_| {
            SumsetError::Format(format!("block_len {} does not fit in u32", set.block_len()))
        })?;
        let strong_sum_len = u32::try_from(set.strong_sum_len()).map_err(|_| {
            SumsetError::Format(format!(
                "strong_sum_len {} does not fit in u32",
                set.strong_sum_len()
            ))
        })?;
        Ok(Self {
            magic: set.magic().as_u32(),
            block_len,
            strong_sum_len,
        })
    }

    /// Encode header to bytes.
    #[must_use]
    pub fn encode(&self) -> [u8; SIGNATURE_HEADER_LEN] {
        let mut buf = [0u8; SIGNATURE_HEADER_LEN];
        buf[0..4].copy_from_slice(&self.magic.to_be_bytes());
        buf[4..8].copy_from_slice(&self.block_len.to_be_bytes());
        buf[8..12].copy_from_slice(&self.strong_sum_len.to_be_bytes());
        buf
    }

    /// Decode header from bytes. Values are not validated here.
    #[must_use]
    pub fn decode(buf: &[u8; SIGNATURE_HEADER_LEN]) -> Self {
        let word = |i: usize| u32::from_be_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);
        Self {
            magic: word(0),
            block_len: word(4),
            strong_sum_len: word(8),
        }
    }

    /// Read header from a reader.
    ///
    /// # Errors
    ///
    /// Returns `Format` if the input ends before a full header, or an I/O
    /// error if reading fails.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; SIGNATURE_HEADER_LEN];
        match read_full(reader, &mut buf)? {
            SIGNATURE_HEADER_LEN => Ok(Self::decode(&buf)),
            n => Err(SumsetError::Format(format!(
                "truncated header: {n} of {SIGNATURE_HEADER_LEN} bytes"
            ))),
        }
    }

    /// Write header to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.encode())?;
        Ok(())
    }
}

/// Fill `buf` from `reader`, stopping early only at end of input.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

impl SignatureSet {
    /// Exact size of the serialized stream.
    #[must_use]
    pub fn serialized_len(&self) -> usize {
        SIGNATURE_HEADER_LEN + self.len() * record_len(self.strong_sum_len())
    }

    /// Serialize the set to `writer`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        SignatureHeader::for_set(self)?.write_to(writer)?;
        for block in self {
            writer.write_all(&block.weak_sum.to_be_bytes())?;
            writer.write_all(block.strong_sum.as_bytes())?;
        }
        Ok(())
    }

    /// Serialize the set into a new buffer.
    ///
    /// # Errors
    ///
    /// Returns `Format` if a length does not fit the header fields.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.serialized_len());
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    /// Parse a signature stream, reading records until end of input.
    ///
    /// `expected_total_bytes` is the stream size if known (0 otherwise) and
    /// is used only to pre-size storage.
    ///
    /// # Errors
    ///
    /// Returns `BadMagic` or `ParamError` for an invalid header, `Format`
    /// for a truncated header or record, and I/O errors from `reader`.
    pub fn read_from<R: Read>(reader: &mut R, expected_total_bytes: u64) -> Result<Self> {
        let header = SignatureHeader::read_from(reader)?;
        let mut set = Self::new(
            header.magic,
            header.block_len as usize,
            header.strong_sum_len as usize,
            expected_total_bytes,
        )?;

        let mut record = vec![0u8; record_len(set.strong_sum_len())];
        loop {
            match read_full(reader, &mut record)? {
                0 => break,
                n if n == record.len() => {
                    let weak = u32::from_be_bytes([record[0], record[1], record[2], record[3]]);
                    set.add_block(weak, &record[4..])?;
                }
                n => {
                    tracing::error!(
                        block = set.len(),
                        got = n,
                        want = record.len(),
                        "truncated signature record"
                    );
                    return Err(SumsetError::Format(format!(
                        "truncated record {}: {n} of {} bytes",
                        set.len(),
                        record.len()
                    )));
                }
            }
        }

        tracing::debug!(
            magic = %set.magic(),
            blocks = set.len(),
            "parsed signature stream"
        );
        Ok(set)
    }

    /// Parse a complete in-memory signature stream.
    ///
    /// # Errors
    ///
    /// As [`read_from`](Self::read_from).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = bytes;
        Self::read_from(&mut reader, bytes.len() as u64)
    }
}

/// Magic of a stream, without parsing the rest.
///
/// # Errors
///
/// Returns `Format` for fewer than 4 bytes and `BadMagic` for an unknown
/// value.
pub fn peek_magic(bytes: &[u8]) -> Result<SignatureMagic> {
    let head: [u8; 4] = bytes
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| SumsetError::Format("stream shorter than magic".to_string()))?;
    SignatureMagic::from_u32(u32::from_be_bytes(head))
}
