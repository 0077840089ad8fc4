//! Generic open-chaining hash table with caller-defined keys.
//!
//! The table is a multi-map from a 32-bit key hash to borrowed entries. It
//! never owns entries: it stores `&'a E` and the caller keeps the backing
//! collection alive. Each bucket is a chain of slots in a shared arena,
//! linked by index, and new slots are appended at the chain tail so the
//! first entry inserted is the first one [`HashTable::find`] sees.
//!
//! Lookups go through a [`Probe`], whose `matches` may mutate the probe.
//! This lets a caller defer expensive work (such as a strong checksum) until
//! a candidate with the same cheap key turns up, and compute it only once.

use std::fmt;
use std::iter::FusedIterator;

use crate::error::{Result, SumsetError};

/// Hash capability shared by stored entries and lookup probes.
///
/// Entries and probes that should meet must return the same hash.
pub trait TableKey {
    /// Raw 32-bit hash of the key. It is mixed before bucket selection, so
    /// it need not be well distributed.
    fn table_hash(&self) -> u32;
}

/// Comparison capability used by [`HashTable::find`].
pub trait Probe<E: ?Sized>: TableKey {
    /// Whether `entry` is the one being looked for.
    ///
    /// Called in chain (insertion) order and never again after the first
    /// `true`.
    fn matches(&mut self, entry: &E) -> bool;
}

/// MurmurHash3 32-bit finalizer.
#[inline]
#[must_use]
pub const fn mix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

#[derive(Debug, Clone, Copy)]
struct Chain {
    head: usize,
    tail: usize,
}

struct Slot<'a, E> {
    entry: &'a E,
    next: Option<usize>,
}

/// Multi-map from [`TableKey`] hashes to borrowed entries.
///
/// The bucket count is fixed at construction and must be a power of two,
/// because buckets are selected by masking the mixed hash. This is checked
/// only by a debug assertion.
///
/// # Example
///
/// ```rust
/// use sumset::{HashTable, Probe, TableKey};
///
/// struct Word(&'static str);
///
/// impl TableKey for Word {
///     fn table_hash(&self) -> u32 {
///         self.0.len() as u32
///     }
/// }
///
/// struct Lookup(&'static str);
///
/// impl TableKey for Lookup {
///     fn table_hash(&self) -> u32 {
///         self.0.len() as u32
///     }
/// }
///
/// impl Probe<Word> for Lookup {
///     fn matches(&mut self, entry: &Word) -> bool {
///         self.0 == entry.0
///     }
/// }
///
/// let words = [Word("cat"), Word("dog"), Word("emu")];
/// let mut table = HashTable::new(8).unwrap();
/// for w in &words {
///     table.insert(w).unwrap();
/// }
///
/// assert_eq!(table.find(&mut Lookup("dog")).map(|w| w.0), Some("dog"));
/// assert!(table.find(&mut Lookup("cow")).is_none());
/// ```
pub struct HashTable<'a, E> {
    buckets: Vec<Option<Chain>>,
    slots: Vec<Slot<'a, E>>,
}

impl<'a, E: TableKey> HashTable<'a, E> {
    /// Create an empty table with `bucket_count` buckets.
    ///
    /// A count of 0 is treated as 1. Any other count must be a power of two.
    ///
    /// # Errors
    ///
    /// Returns `AllocationFailure` if the bucket array cannot be allocated.
    pub fn new(bucket_count: usize) -> Result<Self> {
        Self::with_capacity(bucket_count, 0)
    }

    /// Create an empty table with room for `entries` entries.
    ///
    /// # Errors
    ///
    /// Returns `AllocationFailure` if either array cannot be allocated.
    pub fn with_capacity(bucket_count: usize, entries: usize) -> Result<Self> {
        let bucket_count = bucket_count.max(1);
        debug_assert!(
            bucket_count.is_power_of_two(),
            "bucket_count {bucket_count} is not a power of two"
        );

        let mut buckets = Vec::new();
        buckets
            .try_reserve_exact(bucket_count)
            .map_err(|_| SumsetError::AllocationFailure {
                requested: bucket_count,
            })?;
        buckets.resize(bucket_count, None);

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(entries)
            .map_err(|_| SumsetError::AllocationFailure { requested: entries })?;

        Ok(Self { buckets, slots })
    }

    /// Bucket that a raw hash maps to.
    #[inline]
    #[must_use]
    pub fn bucket_index(&self, hash: u32) -> usize {
        mix32(hash) as usize & (self.buckets.len() - 1)
    }

    /// Add `entry` at the tail of its bucket chain and return it.
    ///
    /// Equal entries are all kept.
    ///
    /// # Errors
    ///
    /// Returns `AllocationFailure` if the slot arena cannot grow.
    pub fn insert(&mut self, entry: &'a E) -> Result<&'a E> {
        let bucket = self.bucket_index(entry.table_hash());
        self.slots
            .try_reserve(1)
            .map_err(|_| SumsetError::AllocationFailure {
                requested: self.slots.len() + 1,
            })?;

        let slot = self.slots.len();
        self.slots.push(Slot { entry, next: None });

        let chain = match self.buckets[bucket] {
            Some(Chain { head, tail }) => {
                self.slots[tail].next = Some(slot);
                Chain { head, tail: slot }
            }
            None => Chain {
                head: slot,
                tail: slot,
            },
        };
        self.buckets[bucket] = Some(chain);
        Ok(entry)
    }

    /// Return the first entry in `key`'s chain that `key` matches.
    ///
    /// The table itself is never modified; only `key` may be.
    pub fn find<K>(&self, key: &mut K) -> Option<&'a E>
    where
        K: Probe<E> + ?Sized,
    {
        let mut next = self.buckets[self.bucket_index(key.table_hash())].map(|c| c.head);
        while let Some(i) = next {
            let slot = &self.slots[i];
            if key.matches(slot.entry) {
                return Some(slot.entry);
            }
            next = slot.next;
        }
        None
    }

    /// Iterate over every entry, bucket by bucket, in chain order.
    pub fn iter(&self) -> Iter<'_, 'a, E> {
        Iter {
            table: self,
            bucket: 0,
            next: None,
            remaining: self.slots.len(),
        }
    }
}

impl<'a, E> HashTable<'a, E> {
    /// Number of entries inserted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of buckets.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

impl<E> fmt::Debug for HashTable<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashTable")
            .field("bucket_count", &self.buckets.len())
            .field("count", &self.slots.len())
            .finish()
    }
}

/// One-shot iterator over a [`HashTable`].
pub struct Iter<'t, 'a, E> {
    table: &'t HashTable<'a, E>,
    bucket: usize,
    next: Option<usize>,
    remaining: usize,
}

impl<'a, E> Iterator for Iter<'_, 'a, E> {
    type Item = &'a E;

    fn next(&mut self) -> Option<&'a E> {
        loop {
            if let Some(i) = self.next {
                let slot = &self.table.slots[i];
                self.next = slot.next;
                self.remaining -= 1;
                return Some(slot.entry);
            }
            let chain = self.table.buckets.get(self.bucket)?;
            self.next = chain.map(|c| c.head);
            self.bucket += 1;
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<E> ExactSizeIterator for Iter<'_, '_, E> {}

impl<E> FusedIterator for Iter<'_, '_, E> {}

impl<'t, 'a, E: TableKey> IntoIterator for &'t HashTable<'a, E> {
    type Item = &'a E;
    type IntoIter = Iter<'t, 'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
