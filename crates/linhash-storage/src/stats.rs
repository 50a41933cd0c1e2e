//! Relation statistics report.

use crate::chvec::ChoiceVector;
use linhash_common::page::{FileKind, PageId};
use std::fmt;

/// Occupancy of one page in a bucket chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageStats {
    pub file: FileKind,
    pub page_id: PageId,
    pub tuple_count: u32,
    pub free_space: usize,
    pub overflow: PageId,
}

/// A primary page and its overflow chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketStats {
    pub bucket: u32,
    pub pages: Vec<PageStats>,
}

impl BucketStats {
    /// Tuples stored across the whole chain.
    pub fn tuple_count(&self) -> u64 {
        self.pages.iter().map(|p| p.tuple_count as u64).sum()
    }
}

/// Global relation state plus per-bucket page occupancy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationStats {
    pub name: String,
    pub attribute_count: usize,
    pub depth: u32,
    pub split_pointer: u32,
    pub page_count: u32,
    pub tuple_count: u32,
    pub overflow_pages: u32,
    pub choice_vector: ChoiceVector,
    pub buckets: Vec<BucketStats>,
}

impl fmt::Display for PageStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}{},{},{},{})",
            self.file.tag(),
            self.page_id,
            self.tuple_count,
            self.free_space,
            self.overflow
        )
    }
}

impl fmt::Display for RelationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Global Info: {}", self.name)?;
        writeln!(
            f,
            "#attrs:{}  #pages:{}  #tuples:{}  d:{}  sp:{}  #ovflow:{}",
            self.attribute_count,
            self.page_count,
            self.tuple_count,
            self.depth,
            self.split_pointer,
            self.overflow_pages
        )?;
        writeln!(f, "Choice vector")?;
        writeln!(f, "{}", self.choice_vector)?;
        writeln!(f, "Bucket Info:")?;
        writeln!(f, "{:<4} Info on pages in bucket", "#")?;
        writeln!(f, "{:<4} (pageID,#tuples,freebytes,ovflow)", "")?;
        for bucket in &self.buckets {
            write!(f, "[{:>2}]  ", bucket.bucket)?;
            for (i, page) in bucket.pages.iter().enumerate() {
                if i > 0 {
                    write!(f, " -> ")?;
                }
                write!(f, "{}", page)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_stats_display() {
        let page = PageStats {
            file: FileKind::Data,
            page_id: PageId(3),
            tuple_count: 12,
            free_space: 40,
            overflow: PageId::NONE,
        };
        assert_eq!(page.to_string(), "(d3,12,40,-)");

        let page = PageStats {
            file: FileKind::Overflow,
            page_id: PageId(0),
            tuple_count: 1,
            free_space: 990,
            overflow: PageId(5),
        };
        assert_eq!(page.to_string(), "(ov0,1,990,5)");
    }

    #[test]
    fn test_relation_stats_display() {
        let stats = RelationStats {
            name: "emp".to_string(),
            attribute_count: 2,
            depth: 0,
            split_pointer: 0,
            page_count: 1,
            tuple_count: 2,
            overflow_pages: 0,
            choice_vector: ChoiceVector::round_robin(2),
            buckets: vec![BucketStats {
                bucket: 0,
                pages: vec![PageStats {
                    file: FileKind::Data,
                    page_id: PageId(0),
                    tuple_count: 2,
                    free_space: 1000,
                    overflow: PageId::NONE,
                }],
            }],
        };

        let text = stats.to_string();
        assert!(text.contains("#attrs:2  #pages:1  #tuples:2  d:0  sp:0"));
        assert!(text.contains("[ 0]  (d0,2,1000,-)"));
        assert_eq!(stats.buckets[0].tuple_count(), 2);
    }
}
