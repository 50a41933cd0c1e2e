//! LinHash common types, errors, and utilities.
//!
//! This crate provides shared definitions used by the storage engine and the CLI.

pub mod bits;
pub mod config;
pub mod error;
pub mod page;

pub use bits::{Bits, MAX_BITS};
pub use config::StorageConfig;
pub use error::{LinHashError, Result};
pub use page::{FileKind, MAX_TUPLE_LEN, PAGE_SIZE, PageId};
