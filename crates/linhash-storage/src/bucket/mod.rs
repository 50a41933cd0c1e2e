//! Bucket storage.
//!
//! This module provides the page format shared by primary and overflow pages:
//! - BucketPage: packed, NUL-terminated tuples plus an overflow link
//! - BucketPageIter: storage-order iteration over a page's tuples

pub mod constants;
mod page;

pub use page::{BucketPage, BucketPageHeader, BucketPageIter};
