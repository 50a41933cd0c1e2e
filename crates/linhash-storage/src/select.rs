//! Partial-match selection.
//!
//! A selection turns a query pattern into the set of buckets that may hold
//! matching tuples, then scans those buckets (primary page and overflow chain)
//! one page at a time, yielding matches lazily in storage order.

use crate::bucket::BucketPage;
use crate::catalog::Catalog;
use crate::disk::DiskManager;
use crate::pattern::QueryPattern;
use crate::tuple::Tuple;
use linhash_common::bits::{Bits, bit_is_set, bits_string, low_bits, low_mask, set_bit};
use linhash_common::page::{FileKind, PageId};
use linhash_common::{LinHashError, Result};
use std::collections::HashSet;
use std::iter::FusedIterator;

/// Lists the buckets a query must scan, in enumeration order without repeats.
///
/// `known` holds the combined-hash bits fixed by the pattern and `unknown`
/// marks the bits it leaves open. Every assignment of the unknown bits within
/// the low `width` addressing bits is enumerated, at most `page_count` of them.
/// An address past the last bucket belongs to a bucket that has not split yet
/// and is folded onto it by keeping only the low `depth` bits.
pub fn candidate_buckets(
    known: Bits,
    unknown: Bits,
    width: u32,
    depth: u32,
    page_count: u32,
) -> Vec<u32> {
    let width_mask = low_mask(width);
    let relevant = unknown & width_mask;
    let positions: Vec<u32> = (0..width).filter(|&pos| bit_is_set(relevant, pos)).collect();
    let base = known & width_mask & !relevant;

    let assignments = (1u64 << positions.len()).min(page_count as u64);
    let mut seen = HashSet::new();
    let mut buckets = Vec::new();

    for assignment in 0..assignments {
        let mut address = base;
        for (j, &pos) in positions.iter().enumerate() {
            if (assignment >> j) & 1 == 1 {
                address = set_bit(address, pos);
            }
        }
        let bucket = if address < page_count {
            address
        } else {
            low_bits(address, depth)
        };
        if seen.insert(bucket) {
            buckets.push(bucket);
        }
    }

    buckets
}

/// A lazy scan over the tuples of a relation matching a query pattern.
///
/// Holds at most one page at a time. After an error the selection is
/// finished and yields nothing further.
pub struct Selection<'a> {
    disk: &'a DiskManager,
    pattern: QueryPattern,
    known: Bits,
    unknown: Bits,
    candidates: Vec<u32>,
    /// Index of the next candidate bucket to open.
    next_candidate: usize,
    /// Page being scanned, with the byte offset of the next tuple on it.
    current: Option<BucketPage>,
    offset: usize,
    /// Overflow pages followed in the current bucket.
    hops: u32,
    done: bool,
}

impl<'a> Selection<'a> {
    pub(crate) fn new(disk: &'a DiskManager, catalog: &Catalog, pattern: QueryPattern) -> Self {
        let attr_hashes: Vec<Option<Bits>> = (0..catalog.attribute_count())
            .map(|attr| pattern.known_hash(attr))
            .collect();

        let mut known: Bits = 0;
        let mut unknown: Bits = 0;
        for (i, item) in catalog.choice_vector().iter().enumerate() {
            match attr_hashes.get(item.attr as usize).copied().flatten() {
                Some(hash) => {
                    if bit_is_set(hash, item.bit as u32) {
                        known = set_bit(known, i as u32);
                    }
                }
                None => unknown = set_bit(unknown, i as u32),
            }
        }

        let candidates = candidate_buckets(
            known,
            unknown,
            catalog.addressing_width(),
            catalog.depth(),
            catalog.page_count(),
        );
        tracing::debug!(
            relation = disk.relation(),
            pattern = %pattern,
            known = %bits_string(known),
            unknown = %bits_string(unknown),
            candidates = ?candidates,
            "starting selection"
        );

        Self {
            disk,
            pattern,
            known,
            unknown,
            candidates,
            next_candidate: 0,
            current: None,
            offset: 0,
            hops: 0,
            done: false,
        }
    }

    /// Combined-hash bits fixed by the pattern.
    pub fn known_mask(&self) -> Bits {
        self.known
    }

    /// Combined-hash bits the pattern leaves open.
    pub fn unknown_mask(&self) -> Bits {
        self.unknown
    }

    /// Buckets this selection scans, in scan order.
    pub fn candidates(&self) -> &[u32] {
        &self.candidates
    }

    pub fn pattern(&self) -> &QueryPattern {
        &self.pattern
    }

    /// Returns the next matching tuple, or `None` once every candidate
    /// bucket has been scanned.
    pub fn next_tuple(&mut self) -> Result<Option<Tuple>> {
        if self.done {
            return Ok(None);
        }
        match self.advance() {
            Ok(Some(tuple)) => Ok(Some(tuple)),
            Ok(None) => {
                self.finish();
                Ok(None)
            }
            Err(e) => {
                if e.is_fatal() {
                    tracing::error!(
                        relation = self.disk.relation(),
                        error = %e,
                        "selection failed"
                    );
                }
                self.finish();
                Err(e)
            }
        }
    }

    fn advance(&mut self) -> Result<Option<Tuple>> {
        loop {
            let Some(page) = &self.current else {
                let Some(&bucket) = self.candidates.get(self.next_candidate) else {
                    return Ok(None);
                };
                self.next_candidate += 1;
                self.load(FileKind::Data, PageId(bucket))?;
                self.hops = 0;
                continue;
            };

            match page.read_tuple_at(self.offset)? {
                Some((tuple, next)) => {
                    self.offset = next;
                    if self.pattern.matches(&tuple) {
                        return Ok(Some(tuple));
                    }
                }
                None => {
                    let link = page.overflow();
                    if !link.is_valid() {
                        self.current = None;
                        continue;
                    }
                    self.hops += 1;
                    if self.hops > self.disk.num_pages(FileKind::Overflow) {
                        return Err(LinHashError::StorageCorrupted(format!(
                            "overflow chain of bucket {} does not terminate",
                            self.candidates[self.next_candidate - 1]
                        )));
                    }
                    self.load(FileKind::Overflow, link)?;
                }
            }
        }
    }

    fn load(&mut self, kind: FileKind, page_id: PageId) -> Result<()> {
        let data = self.disk.read_page(kind, page_id)?;
        self.current = Some(BucketPage::from_bytes(data));
        self.offset = 0;
        Ok(())
    }

    fn finish(&mut self) {
        self.done = true;
        self.current = None;
        self.next_candidate = self.candidates.len();
    }

    /// Ends the selection, releasing the held page.
    pub fn close(mut self) {
        self.finish();
        tracing::debug!(relation = self.disk.relation(), "selection closed");
    }
}

impl Iterator for Selection<'_> {
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_tuple().transpose()
    }
}

impl FusedIterator for Selection<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chvec::ChoiceVector;

    #[test]
    fn test_depth_zero_has_single_candidate() {
        assert_eq!(candidate_buckets(0, u32::MAX, 0, 0, 1), vec![0]);
        assert_eq!(candidate_buckets(u32::MAX, 0, 0, 0, 1), vec![0]);
    }

    #[test]
    fn test_fully_known_address() {
        // d=2, sp=0: width 2, known low bits 0b10.
        assert_eq!(candidate_buckets(0b1110, 0, 2, 2, 4), vec![2]);
    }

    #[test]
    fn test_one_unknown_bit() {
        // Bit 0 unknown, bit 1 known set.
        assert_eq!(candidate_buckets(0b10, 0b01, 2, 2, 4), vec![2, 3]);
    }

    #[test]
    fn test_all_unknown_enumerates_every_bucket() {
        assert_eq!(candidate_buckets(0, u32::MAX, 2, 2, 4), vec![0, 1, 2, 3]);
        // d=2, sp=1: width 3, 8 assignments capped at 5 pages.
        assert_eq!(candidate_buckets(0, u32::MAX, 3, 2, 5), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_cap_limits_enumeration_to_page_count() {
        // d=1, sp=1: width 2, 4 assignments, only 3 pages exist.
        let buckets = candidate_buckets(0, 0b11, 2, 1, 3);
        assert_eq!(buckets, vec![0, 1, 2]);
    }

    #[test]
    fn test_unsplit_address_folds_onto_parent() {
        // d=2, sp=1, pages 0..=4. Bit 2 unknown, low bits known 0b11.
        // Address 0b111 = 7 has no page; bucket 3 has not split, so it holds them.
        let buckets = candidate_buckets(0b011, 0b100, 3, 2, 5);
        assert_eq!(buckets, vec![3]);

        // Low bits 0b00: bucket 0 has split into 0 and 4.
        let buckets = candidate_buckets(0b000, 0b100, 3, 2, 5);
        assert_eq!(buckets, vec![0, 4]);
    }

    #[test]
    fn test_fully_known_unsplit_address_folds() {
        // d=1, sp=1: bucket 1 not yet split, address 0b11 folds to 1.
        assert_eq!(candidate_buckets(0b11, 0, 2, 1, 3), vec![1]);
        assert_eq!(candidate_buckets(0b10, 0, 2, 1, 3), vec![2]);
    }

    #[test]
    fn test_candidates_are_unique_and_in_range() {
        let mut catalog = Catalog::new(1, 0, ChoiceVector::round_robin(1)).unwrap();
        for _ in 0..40 {
            let pages = catalog.page_count();
            for unknown in [0u32, 0b1, 0b10, 0b101, 0b11111, u32::MAX] {
                for known in [0u32, 0b10101, u32::MAX] {
                    let buckets = candidate_buckets(
                        known,
                        unknown,
                        catalog.addressing_width(),
                        catalog.depth(),
                        pages,
                    );
                    let unique: HashSet<_> = buckets.iter().collect();
                    assert_eq!(unique.len(), buckets.len());
                    assert!(buckets.iter().all(|&b| b < pages));
                    assert!(!buckets.is_empty());
                }
            }
            catalog.advance_split_pointer();
        }
    }

    #[test]
    fn test_fully_known_candidate_is_bucket_for() {
        // With every bit known the single candidate is the insert address.
        let mut catalog = Catalog::new(1, 0, ChoiceVector::round_robin(1)).unwrap();
        for _ in 0..40 {
            for hash in [0u32, 1, 6, 0xdead_beef, 0x1234_5678, u32::MAX] {
                let buckets = candidate_buckets(
                    hash,
                    0,
                    catalog.addressing_width(),
                    catalog.depth(),
                    catalog.page_count(),
                );
                assert_eq!(buckets, vec![catalog.bucket_for(hash)]);
            }
            catalog.advance_split_pointer();
        }
    }
}
