//! LinHash storage engine.
//!
//! This crate provides the on-disk linear-hashed relation:
//! - DiskManager: page-granular I/O on a relation's files
//! - BucketPage: packed tuple pages with overflow links
//! - Catalog: directory state (depth, split pointer, counts) and header codec
//! - Relation: create/open/close, insert with bucket splitting, statistics
//! - Selection: partial-match queries over candidate buckets
//! - Projection: attribute selection for query output

pub mod bucket;
pub mod catalog;
pub mod chvec;
pub mod disk;
pub mod pattern;
pub mod project;
pub mod relation;
pub mod select;
pub mod stats;
pub mod tuple;

pub use bucket::{BucketPage, BucketPageHeader, BucketPageIter};
pub use catalog::{Catalog, MAX_ATTRIBUTES};
pub use chvec::{CHVEC_LEN, ChoiceItem, ChoiceVector};
pub use disk::{DiskManager, DiskManagerConfig};
pub use pattern::{PatternField, QueryPattern, glob_match};
pub use project::Projection;
pub use relation::{OpenMode, Relation};
pub use select::{Selection, candidate_buckets};
pub use stats::{BucketStats, PageStats, RelationStats};
pub use tuple::{Tuple, hash_bytes};
