//! Signature parameters and their builder.

use serde::{Deserialize, Serialize};

use crate::checksum::RolloutVariant;
use crate::error::{Result, SumsetError};
use crate::signature::SignatureMagic;

/// Default block length in bytes.
pub const DEFAULT_BLOCK_LEN: usize = 2048;

/// Inputs larger than this are hashed in parallel during generation.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 64 * 1024;

/// Parameters that define a signature set and its matching behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureConfig {
    /// Hash-algorithm identity.
    pub magic: SignatureMagic,
    /// Bytes per block.
    pub block_len: usize,
    /// Stored strong-sum length; 0 selects the magic's full digest length.
    pub strong_sum_len: usize,
    /// Rollout arithmetic; `None` lets the magic decide.
    pub rollout: Option<RolloutVariant>,
    /// Reference blobs above this size are hashed with rayon.
    pub parallel_threshold: usize,
}

impl SignatureConfig {
    /// Strong-sum length after applying the "0 means full length" default.
    #[must_use]
    pub const fn effective_strong_sum_len(&self) -> usize {
        if self.strong_sum_len == 0 {
            self.magic.max_strong_sum_len()
        } else {
            self.strong_sum_len
        }
    }

    /// Rollout arithmetic after applying the magic's default.
    #[must_use]
    pub fn effective_rollout(&self) -> RolloutVariant {
        self.rollout.unwrap_or_else(|| self.magic.default_rollout())
    }

    /// Check the parameters without allocating anything.
    ///
    /// # Errors
    ///
    /// Returns `ParamError` for a zero block length or a strong-sum length
    /// above the magic's maximum.
    pub fn validate(&self) -> Result<()> {
        validate_params(self.magic, self.block_len, self.strong_sum_len).map(|_| ())
    }
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            magic: SignatureMagic::Blake2,
            block_len: DEFAULT_BLOCK_LEN,
            strong_sum_len: 0,
            rollout: None,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

/// Resolve and check signature parameters, returning the strong-sum length.
pub(crate) fn validate_params(
    magic: SignatureMagic,
    block_len: usize,
    strong_sum_len: usize,
) -> Result<usize> {
    let max = magic.max_strong_sum_len();
    let strong_sum_len = if strong_sum_len == 0 { max } else { strong_sum_len };
    if strong_sum_len > max {
        tracing::error!(strong_sum_len, magic = %magic, "invalid strong_sum_len");
        return Err(SumsetError::ParamError(format!(
            "strong_sum_len {strong_sum_len} is outside 1..={max} for magic {magic}"
        )));
    }
    if block_len == 0 {
        tracing::error!(block_len, "invalid block_len");
        return Err(SumsetError::ParamError(
            "block_len must be at least 1".to_string(),
        ));
    }
    Ok(strong_sum_len)
}

/// Builder for [`SignatureConfig`].
///
/// # Example
///
/// ```rust
/// use sumset::{SignatureBuilder, SignatureMagic};
///
/// let config = SignatureBuilder::new()
///     .magic(SignatureMagic::Md4)
///     .block_len(1024)
///     .build()
///     .unwrap();
///
/// // Zero strong-sum length resolves to the full MD4 digest.
/// assert_eq!(config.strong_sum_len, 16);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SignatureBuilder {
    config: SignatureConfig,
}

impl SignatureBuilder {
    /// Create a new builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the hash-algorithm identity.
    #[must_use]
    pub fn magic(mut self, magic: SignatureMagic) -> Self {
        self.config.magic = magic;
        self
    }

    /// Set the block length.
    #[must_use]
    pub fn block_len(mut self, len: usize) -> Self {
        self.config.block_len = len;
        self
    }

    /// Set the stored strong-sum length (0 for the full digest).
    #[must_use]
    pub fn strong_sum_len(mut self, len: usize) -> Self {
        self.config.strong_sum_len = len;
        self
    }

    /// Force a rollout arithmetic instead of the magic's default.
    #[must_use]
    pub fn rollout(mut self, variant: RolloutVariant) -> Self {
        self.config.rollout = Some(variant);
        self
    }

    /// Set the size above which generation hashes blocks in parallel.
    #[must_use]
    pub fn parallel_threshold(mut self, bytes: usize) -> Self {
        self.config.parallel_threshold = bytes;
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ParamError` if the block length or strong-sum length is out
    /// of range.
    pub fn build(self) -> Result<SignatureConfig> {
        let mut config = self.config;
        config.strong_sum_len =
            validate_params(config.magic, config.block_len, config.strong_sum_len)?;
        Ok(config)
    }
}
