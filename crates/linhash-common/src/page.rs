//! Page identifiers and size constants shared by the storage layer.

use serde::{Deserialize, Serialize};

/// Page size in bytes for both primary and overflow pages.
pub const PAGE_SIZE: usize = 1024;

/// Maximum length of a serialized tuple in bytes.
pub const MAX_TUPLE_LEN: usize = 200;

/// Identifier of a page within one relation file.
///
/// For the data file the page id is also the bucket id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageId(pub u32);

impl PageId {
    /// Sentinel terminating an overflow chain.
    pub const NONE: PageId = PageId(u32::MAX);

    /// Returns true if this id refers to a page.
    pub fn is_valid(&self) -> bool {
        self.0 != u32::MAX
    }

    /// Returns the byte offset of this page within its file.
    pub fn file_offset(&self) -> u64 {
        (self.0 as u64) * (PAGE_SIZE as u64)
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.0)
        } else {
            write!(f, "-")
        }
    }
}

/// The page files that make up a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    /// Primary bucket pages, indexed by bucket id.
    Data,
    /// Overflow pages, appended as chains grow.
    Overflow,
}

impl FileKind {
    /// File extension used on disk.
    pub fn extension(&self) -> &'static str {
        match self {
            FileKind::Data => "data",
            FileKind::Overflow => "ovflow",
        }
    }

    /// Short prefix used when rendering page ids in diagnostics.
    pub fn tag(&self) -> &'static str {
        match self {
            FileKind::Data => "d",
            FileKind::Overflow => "ov",
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}
