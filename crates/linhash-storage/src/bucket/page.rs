//! Bucket page implementation.
//!
//! Page layout:
//! ```text
//! +---------------------+
//! | Header (12)         |  free offset, overflow link, tuple count
//! +---------------------+
//! | tuple\0 tuple\0 ... |  <- Grows upward from DATA_START
//! +---------------------+
//! |                     |
//! | Free Space          |
//! |                     |
//! +---------------------+
//! ```

use super::constants::{BUCKET_HEADER_SIZE, DATA_CAPACITY, DATA_START, TUPLE_TERMINATOR};
use crate::tuple::Tuple;
use linhash_common::page::{PAGE_SIZE, PageId};
use linhash_common::{LinHashError, Result};

/// Bucket page header.
///
/// Layout (12 bytes):
/// - free_offset: 4 bytes (bytes of tuple data in use)
/// - overflow: 4 bytes (next page in the chain, `PageId::NONE` if last)
/// - tuple_count: 4 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketPageHeader {
    /// Bytes of tuple data in use, relative to DATA_START.
    pub free_offset: u32,
    /// Next overflow page of this bucket.
    pub overflow: PageId,
    /// Number of tuples stored on this page.
    pub tuple_count: u32,
}

impl BucketPageHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = BUCKET_HEADER_SIZE;

    /// Creates the header of an empty page.
    pub fn new() -> Self {
        Self {
            free_offset: 0,
            overflow: PageId::NONE,
            tuple_count: 0,
        }
    }

    /// Returns the amount of free space available.
    pub fn free_space(&self) -> usize {
        DATA_CAPACITY.saturating_sub(self.free_offset as usize)
    }

    /// Serializes to bytes.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.free_offset.to_le_bytes());
        buf[4..8].copy_from_slice(&self.overflow.0.to_le_bytes());
        buf[8..12].copy_from_slice(&self.tuple_count.to_le_bytes());
        buf
    }

    /// Deserializes from bytes.
    pub fn from_bytes(buf: &[u8]) -> Self {
        Self {
            free_offset: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            overflow: PageId(u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]])),
            tuple_count: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
        }
    }
}

impl Default for BucketPageHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// A primary or overflow page holding the tuples of one bucket.
#[derive(Clone)]
pub struct BucketPage {
    /// Page data buffer.
    data: Box<[u8; PAGE_SIZE]>,
}

impl BucketPage {
    /// Creates a new empty page with no overflow link.
    pub fn new() -> Self {
        let mut data = Box::new([0u8; PAGE_SIZE]);
        data[..BucketPageHeader::SIZE].copy_from_slice(&BucketPageHeader::new().to_bytes());
        Self { data }
    }

    /// Creates a page from raw page data.
    pub fn from_bytes(data: [u8; PAGE_SIZE]) -> Self {
        Self {
            data: Box::new(data),
        }
    }

    /// Returns the raw page data.
    pub fn as_bytes(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    /// Returns the page header.
    pub fn header(&self) -> BucketPageHeader {
        BucketPageHeader::from_bytes(&self.data[..BucketPageHeader::SIZE])
    }

    fn set_header(&mut self, header: BucketPageHeader) {
        self.data[..BucketPageHeader::SIZE].copy_from_slice(&header.to_bytes());
    }

    /// Returns the number of tuples on this page.
    pub fn tuple_count(&self) -> u32 {
        self.header().tuple_count
    }

    /// Returns the amount of free space available.
    pub fn free_space(&self) -> usize {
        self.header().free_space()
    }

    /// Returns the next page of the overflow chain.
    pub fn overflow(&self) -> PageId {
        self.header().overflow
    }

    /// Links this page to the next page of the overflow chain.
    pub fn set_overflow(&mut self, page_id: PageId) {
        let mut header = self.header();
        header.overflow = page_id;
        self.set_header(header);
    }

    /// Returns the tuple data region that is in use.
    pub fn used_data(&self) -> &[u8] {
        let used = (self.header().free_offset as usize).min(DATA_CAPACITY);
        &self.data[DATA_START..DATA_START + used]
    }

    /// Returns true if the page can fit a tuple of the given size.
    pub fn can_fit(&self, tuple: &Tuple) -> bool {
        self.free_space() >= tuple.size_on_disk()
    }

    /// Appends a tuple after the existing ones.
    ///
    /// Returns `PageFull` if the tuple and its terminator do not fit.
    pub fn add_tuple(&mut self, tuple: &Tuple) -> Result<()> {
        let mut header = self.header();
        let size = tuple.size_on_disk();
        if header.free_space() < size {
            return Err(LinHashError::PageFull);
        }

        let start = DATA_START + header.free_offset as usize;
        let bytes = tuple.as_bytes();
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        self.data[start + bytes.len()] = TUPLE_TERMINATOR;

        header.free_offset += size as u32;
        header.tuple_count += 1;
        self.set_header(header);

        Ok(())
    }

    /// Reads the tuple stored at `offset` within the data region.
    ///
    /// Returns the tuple and the offset of the next one, or `None` once
    /// `offset` reaches the end of the used region.
    pub fn read_tuple_at(&self, offset: usize) -> Result<Option<(Tuple, usize)>> {
        let used = self.used_data();
        if offset >= used.len() {
            return Ok(None);
        }

        let rest = &used[offset..];
        let len = rest
            .iter()
            .position(|&b| b == TUPLE_TERMINATOR)
            .ok_or_else(|| {
                LinHashError::StorageCorrupted(format!(
                    "unterminated tuple at page offset {}",
                    DATA_START + offset
                ))
            })?;

        let tuple = Tuple::from_stored(&rest[..len]).ok_or_else(|| {
            LinHashError::StorageCorrupted(format!(
                "tuple at page offset {} is not valid UTF-8",
                DATA_START + offset
            ))
        })?;

        Ok(Some((tuple, offset + len + 1)))
    }

    /// Iterates over the tuples of this page in storage order.
    pub fn iter(&self) -> BucketPageIter<'_> {
        BucketPageIter {
            page: self,
            offset: 0,
            done: false,
        }
    }

    /// Reads every tuple of this page.
    pub fn tuples(&self) -> Result<Vec<Tuple>> {
        self.iter().collect()
    }
}

impl Default for BucketPage {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BucketPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketPage")
            .field("header", &self.header())
            .finish()
    }
}

/// Iterator over tuples in a bucket page.
pub struct BucketPageIter<'a> {
    page: &'a BucketPage,
    offset: usize,
    done: bool,
}

impl Iterator for BucketPageIter<'_> {
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.page.read_tuple_at(self.offset) {
            Ok(Some((tuple, next))) => {
                self.offset = next;
                Some(Ok(tuple))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
