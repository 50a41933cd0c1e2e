//! Relation catalog: the linear-hashing directory state and its on-disk header.
//!
//! Header layout (little-endian, [`Catalog::SIZE`] bytes):
//! ```text
//! +-------+---------+-------+-------+----+--------+-------+--------------+-------+
//! | magic | version | attrs | depth | sp | npages | ntups | choice (64)  | crc32 |
//! +-------+---------+-------+-------+----+--------+-------+--------------+-------+
//! ```
//!
//! The directory invariant is `page_count == 2^depth + split_pointer` with
//! `split_pointer < 2^depth`.

use crate::chvec::ChoiceVector;
use linhash_common::bits::{Bits, MAX_BITS, low_bits};
use linhash_common::page::PAGE_SIZE;
use linhash_common::{LinHashError, Result};

/// Largest supported number of attributes per tuple.
pub const MAX_ATTRIBUTES: usize = 100;

/// Largest depth a relation may be created with.
pub const MAX_DEPTH: u32 = MAX_BITS - 1;

/// Linear-hashing directory state of one relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    attribute_count: u32,
    depth: u32,
    split_pointer: u32,
    page_count: u32,
    tuple_count: u32,
    choice_vector: ChoiceVector,
}

impl Catalog {
    /// Magic bytes identifying a catalog header.
    pub const MAGIC: [u8; 4] = *b"LHRL";
    /// Current format version.
    pub const VERSION: u32 = 1;
    /// Size of the serialized header in bytes.
    pub const SIZE: usize = 28 + ChoiceVector::SIZE + 4;

    /// Creates the catalog of a fresh relation with `2^depth` buckets.
    pub fn new(attribute_count: usize, depth: u32, choice_vector: ChoiceVector) -> Result<Self> {
        if attribute_count == 0 || attribute_count > MAX_ATTRIBUTES {
            return Err(LinHashError::InvalidParameter {
                name: "attribute_count".to_string(),
                value: attribute_count.to_string(),
            });
        }
        if depth > MAX_DEPTH {
            return Err(LinHashError::InvalidParameter {
                name: "depth".to_string(),
                value: depth.to_string(),
            });
        }

        Ok(Self {
            attribute_count: attribute_count as u32,
            depth,
            split_pointer: 0,
            page_count: 1u32 << depth,
            tuple_count: 0,
            choice_vector,
        })
    }

    pub fn attribute_count(&self) -> usize {
        self.attribute_count as usize
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn split_pointer(&self) -> u32 {
        self.split_pointer
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn tuple_count(&self) -> u32 {
        self.tuple_count
    }

    pub fn choice_vector(&self) -> &ChoiceVector {
        &self.choice_vector
    }

    /// Verifies `page_count == 2^depth + split_pointer` and `split_pointer < 2^depth`.
    pub fn check_invariant(&self) -> Result<()> {
        let base = 1u64 << self.depth.min(MAX_BITS);
        let sp = self.split_pointer as u64;
        if self.depth >= MAX_BITS || sp >= base || self.page_count as u64 != base + sp {
            return Err(LinHashError::StorageCorrupted(format!(
                "directory invariant violated: depth={} sp={} npages={}",
                self.depth, self.split_pointer, self.page_count
            )));
        }
        Ok(())
    }

    /// Returns the bucket a tuple with combined hash `hash` belongs to.
    pub fn bucket_for(&self, hash: Bits) -> u32 {
        if self.depth == 0 {
            return 0;
        }
        let low = low_bits(hash, self.depth);
        if low < self.split_pointer {
            low_bits(hash, self.depth + 1)
        } else {
            low
        }
    }

    /// Number of inserts between two splits.
    pub fn capacity_threshold(&self) -> u32 {
        (PAGE_SIZE as u32 / (10 * self.attribute_count.max(1))).max(1)
    }

    /// Returns true if the current tuple count triggers a split.
    pub fn should_split(&self) -> bool {
        self.tuple_count > 0 && self.tuple_count % self.capacity_threshold() == 0
    }

    /// Number of low hash bits that address a bucket.
    pub fn addressing_width(&self) -> u32 {
        if self.split_pointer == 0 {
            self.depth
        } else {
            self.depth + 1
        }
    }

    /// Id of the bucket the next split creates: `2^depth + split_pointer`.
    pub fn next_bucket_id(&self) -> Result<u32> {
        1u32.checked_shl(self.depth)
            .and_then(|base| base.checked_add(self.split_pointer))
            .ok_or_else(|| {
                LinHashError::StorageWriteFailure(format!(
                    "relation cannot grow past depth {}",
                    self.depth
                ))
            })
    }

    /// Counts one successful insert.
    pub fn record_insert(&mut self) {
        self.tuple_count = self.tuple_count.wrapping_add(1);
    }

    /// Accounts for a completed split: one more page, split pointer advanced
    /// and wrapped into the next depth once every bucket of this round split.
    pub fn advance_split_pointer(&mut self) {
        self.page_count += 1;
        self.split_pointer += 1;
        if self.split_pointer as u64 == 1u64 << self.depth {
            self.split_pointer = 0;
            self.depth += 1;
        }
    }

    fn checksum(data: &[u8]) -> u32 {
        crc32fast::hash(data)
    }

    /// Serializes the header.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut data = [0u8; Self::SIZE];
        data[0..4].copy_from_slice(&Self::MAGIC);
        data[4..8].copy_from_slice(&Self::VERSION.to_le_bytes());
        data[8..12].copy_from_slice(&self.attribute_count.to_le_bytes());
        data[12..16].copy_from_slice(&self.depth.to_le_bytes());
        data[16..20].copy_from_slice(&self.split_pointer.to_le_bytes());
        data[20..24].copy_from_slice(&self.page_count.to_le_bytes());
        data[24..28].copy_from_slice(&self.tuple_count.to_le_bytes());
        data[28..28 + ChoiceVector::SIZE].copy_from_slice(&self.choice_vector.to_bytes());

        let crc_at = Self::SIZE - 4;
        let crc = Self::checksum(&data[..crc_at]);
        data[crc_at..].copy_from_slice(&crc.to_le_bytes());
        data
    }

    /// Deserializes and validates a header.
    pub fn from_bytes(data: &[u8; Self::SIZE]) -> Result<Self> {
        let corrupted = |reason: String| LinHashError::StorageCorrupted(reason);
        let read_u32 =
            |at: usize| u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);

        if data[0..4] != Self::MAGIC {
            return Err(corrupted("invalid catalog magic bytes".to_string()));
        }
        let version = read_u32(4);
        if version != Self::VERSION {
            return Err(corrupted(format!("unsupported catalog version: {}", version)));
        }
        let crc_at = Self::SIZE - 4;
        let stored = read_u32(crc_at);
        let computed = Self::checksum(&data[..crc_at]);
        if stored != computed {
            return Err(corrupted(format!(
                "catalog checksum mismatch: stored {:08x}, computed {:08x}",
                stored, computed
            )));
        }

        let attribute_count = read_u32(8);
        if attribute_count == 0 || attribute_count as usize > MAX_ATTRIBUTES {
            return Err(corrupted(format!(
                "catalog attribute count {} out of range",
                attribute_count
            )));
        }
        let choice_vector =
            ChoiceVector::from_bytes(&data[28..28 + ChoiceVector::SIZE], attribute_count as usize)?;

        let catalog = Self {
            attribute_count,
            depth: read_u32(12),
            split_pointer: read_u32(16),
            page_count: read_u32(20),
            tuple_count: read_u32(24),
            choice_vector,
        };
        catalog.check_invariant()?;
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(attrs: usize, depth: u32) -> Catalog {
        Catalog::new(attrs, depth, ChoiceVector::round_robin(attrs)).unwrap()
    }

    #[test]
    fn test_new_catalog() {
        let c = catalog(3, 2);
        assert_eq!(c.attribute_count(), 3);
        assert_eq!(c.depth(), 2);
        assert_eq!(c.split_pointer(), 0);
        assert_eq!(c.page_count(), 4);
        assert_eq!(c.tuple_count(), 0);
        c.check_invariant().unwrap();
    }

    #[test]
    fn test_new_rejects_bad_parameters() {
        let cv = ChoiceVector::round_robin(1);
        assert!(matches!(
            Catalog::new(0, 0, cv.clone()),
            Err(LinHashError::InvalidParameter { .. })
        ));
        assert!(Catalog::new(MAX_ATTRIBUTES + 1, 0, cv.clone()).is_err());
        assert!(Catalog::new(1, MAX_DEPTH + 1, cv.clone()).is_err());
        assert!(Catalog::new(MAX_ATTRIBUTES, MAX_DEPTH, cv).is_ok());
    }

    #[test]
    fn test_capacity_threshold() {
        assert_eq!(catalog(1, 0).capacity_threshold(), 102);
        assert_eq!(catalog(2, 0).capacity_threshold(), 51);
        assert_eq!(catalog(3, 0).capacity_threshold(), 34);
        assert_eq!(catalog(MAX_ATTRIBUTES, 0).capacity_threshold(), 1);
    }

    #[test]
    fn test_should_split_on_global_count() {
        let mut c = catalog(2, 0);
        assert!(!c.should_split());
        for _ in 0..50 {
            c.record_insert();
            assert!(!c.should_split());
        }
        c.record_insert();
        assert!(c.should_split());
        c.record_insert();
        assert!(!c.should_split());
    }

    #[test]
    fn test_bucket_for_depth_zero() {
        let c = catalog(1, 0);
        assert_eq!(c.bucket_for(0), 0);
        assert_eq!(c.bucket_for(u32::MAX), 0);
    }

    #[test]
    fn test_bucket_for_respects_split_pointer() {
        let mut c = catalog(1, 2);
        // No split yet: low 2 bits.
        assert_eq!(c.bucket_for(0b110), 0b10);
        assert_eq!(c.bucket_for(0b100), 0b00);

        // After splitting bucket 0, hashes landing below sp use 3 bits.
        c.advance_split_pointer();
        assert_eq!(c.split_pointer(), 1);
        assert_eq!(c.page_count(), 5);
        assert_eq!(c.bucket_for(0b100), 0b100);
        assert_eq!(c.bucket_for(0b000), 0b000);
        assert_eq!(c.bucket_for(0b101), 0b01);
        assert_eq!(c.bucket_for(0b110), 0b10);
    }

    #[test]
    fn test_bucket_for_is_always_in_range() {
        let mut c = catalog(1, 0);
        for _ in 0..40 {
            for h in [0u32, 1, 2, 3, 0xdead_beef, 0x1234_5678, u32::MAX] {
                assert!(c.bucket_for(h) < c.page_count());
            }
            c.advance_split_pointer();
            c.check_invariant().unwrap();
        }
    }

    #[test]
    fn test_advance_split_pointer_wraps() {
        let mut c = catalog(1, 0);
        assert_eq!(c.next_bucket_id().unwrap(), 1);
        c.advance_split_pointer();
        assert_eq!((c.depth(), c.split_pointer(), c.page_count()), (1, 0, 2));

        assert_eq!(c.next_bucket_id().unwrap(), 2);
        c.advance_split_pointer();
        assert_eq!((c.depth(), c.split_pointer(), c.page_count()), (1, 1, 3));
        assert_eq!(c.addressing_width(), 2);

        assert_eq!(c.next_bucket_id().unwrap(), 3);
        c.advance_split_pointer();
        assert_eq!((c.depth(), c.split_pointer(), c.page_count()), (2, 0, 4));
        assert_eq!(c.addressing_width(), 2);
    }

    #[test]
    fn test_header_roundtrip() {
        let mut c = catalog(3, 1);
        c.record_insert();
        c.record_insert();
        c.advance_split_pointer();

        let bytes = c.to_bytes();
        assert_eq!(&bytes[0..4], b"LHRL");
        assert_eq!(Catalog::from_bytes(&bytes).unwrap(), c);
    }

    #[test]
    fn test_header_rejects_bad_magic() {
        let mut bytes = catalog(1, 0).to_bytes();
        bytes[0] = b'X';
        let err = Catalog::from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn test_header_rejects_checksum_mismatch() {
        let mut bytes = catalog(2, 3).to_bytes();
        bytes[24] ^= 0x01;
        let err = Catalog::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, LinHashError::StorageCorrupted(_)));
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_header_rejects_broken_invariant() {
        let mut c = catalog(1, 2);
        c.page_count = 7;
        let err = Catalog::from_bytes(&c.to_bytes()).unwrap_err();
        assert!(err.to_string().contains("invariant"));
    }
}
