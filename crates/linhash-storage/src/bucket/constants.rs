//! Bucket page layout constants.

use linhash_common::page::PAGE_SIZE;

/// Size of the bucket page header in bytes.
pub const BUCKET_HEADER_SIZE: usize = 12;

/// Offset where tuple data begins.
pub const DATA_START: usize = BUCKET_HEADER_SIZE;

/// Bytes available for tuple data on one page.
pub const DATA_CAPACITY: usize = PAGE_SIZE - BUCKET_HEADER_SIZE;

/// Terminator written after every stored tuple.
pub const TUPLE_TERMINATOR: u8 = 0;
