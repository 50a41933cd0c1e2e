//! Linear-hashed relations.
//!
//! A relation is a directory of buckets. Bucket `b` is primary page `b` of the
//! data file plus a chain of overflow pages. Inserts are routed by the
//! combined hash of the tuple; every `capacity_threshold` inserts the bucket
//! under the split pointer is split into itself and bucket `2^depth + sp`.

use crate::bucket::BucketPage;
use crate::catalog::Catalog;
use crate::chvec::ChoiceVector;
use crate::disk::{DiskManager, DiskManagerConfig};
use crate::pattern::QueryPattern;
use crate::select::Selection;
use crate::stats::{BucketStats, PageStats, RelationStats};
use crate::tuple::Tuple;
use linhash_common::bits::low_bits;
use linhash_common::page::{FileKind, PageId};
use linhash_common::{LinHashError, Result, StorageConfig};
use std::io::BufRead;

/// How a relation is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Queries and statistics only.
    Read,
    /// Inserts allowed; the catalog is written back on flush and close.
    Write,
}

/// An open relation.
pub struct Relation {
    name: String,
    catalog: Catalog,
    disk: DiskManager,
    mode: OpenMode,
    /// Catalog changed since it was last written.
    dirty: bool,
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(LinHashError::InvalidParameter {
            name: "relation".to_string(),
            value: name.to_string(),
        });
    }
    Ok(())
}

impl Relation {
    /// Creates a relation with `page_count == 2^depth` empty buckets and opens
    /// it for writing.
    ///
    /// All arguments are validated before any file is created.
    pub fn create(
        config: &StorageConfig,
        name: &str,
        attribute_count: usize,
        page_count: u32,
        depth: u32,
        descriptor: &str,
    ) -> Result<Self> {
        validate_name(name)?;
        let choice_vector = ChoiceVector::parse(descriptor, attribute_count)?;
        let catalog = Catalog::new(attribute_count, depth, choice_vector)?;
        if page_count != catalog.page_count() {
            return Err(LinHashError::InvalidParameter {
                name: "page_count".to_string(),
                value: format!("{} (depth {} needs {})", page_count, depth, catalog.page_count()),
            });
        }

        let disk = DiskManager::create(DiskManagerConfig::for_relation(config, name, true))?;
        let empty = BucketPage::new();
        for bucket in 0..page_count {
            let page_id = disk.allocate_page(FileKind::Data, empty.as_bytes())?;
            if page_id.0 != bucket {
                return Err(LinHashError::StorageCorrupted(format!(
                    "allocated page {} while creating bucket {}",
                    page_id, bucket
                )));
            }
        }
        disk.write_info(&catalog.to_bytes())?;
        disk.flush()?;

        tracing::info!(
            relation = name,
            attributes = attribute_count,
            pages = page_count,
            depth,
            "created relation"
        );

        Ok(Self {
            name: name.to_string(),
            catalog,
            disk,
            mode: OpenMode::Write,
            dirty: false,
        })
    }

    /// Returns true if a relation called `name` exists under `config`.
    pub fn exists(config: &StorageConfig, name: &str) -> bool {
        DiskManager::exists(config, name)
    }

    /// Removes every file of the relation called `name`.
    pub fn delete(config: &StorageConfig, name: &str) -> Result<()> {
        validate_name(name)?;
        if !Self::exists(config, name) {
            return Err(LinHashError::RelationNotFound(name.to_string()));
        }
        DiskManager::delete(config, name)?;
        tracing::info!(relation = name, "deleted relation");
        Ok(())
    }

    /// Opens an existing relation, validating its catalog header.
    pub fn open(config: &StorageConfig, name: &str, mode: OpenMode) -> Result<Self> {
        validate_name(name)?;
        let disk = DiskManager::open(DiskManagerConfig::for_relation(
            config,
            name,
            mode == OpenMode::Write,
        ))?;

        let mut header = [0u8; Catalog::SIZE];
        disk.read_info(&mut header)?;
        let catalog = Catalog::from_bytes(&header)?;

        let data_pages = disk.num_pages(FileKind::Data);
        if data_pages < catalog.page_count() {
            return Err(LinHashError::StorageCorrupted(format!(
                "{} has {} primary pages, catalog expects {}",
                name,
                data_pages,
                catalog.page_count()
            )));
        }

        tracing::info!(
            relation = name,
            ?mode,
            pages = catalog.page_count(),
            tuples = catalog.tuple_count(),
            "opened relation"
        );

        Ok(Self {
            name: name.to_string(),
            catalog,
            disk,
            mode,
            dirty: false,
        })
    }

    /// Writes the catalog back (in write mode) and releases the files.
    pub fn close(mut self) -> Result<()> {
        self.flush()?;
        tracing::info!(
            relation = %self.name,
            tuples = self.catalog.tuple_count(),
            "closed relation"
        );
        Ok(())
    }

    /// Persists the catalog header and syncs the relation files.
    pub fn flush(&mut self) -> Result<()> {
        if self.mode == OpenMode::Read {
            return Ok(());
        }
        self.disk.write_info(&self.catalog.to_bytes())?;
        self.disk.flush()?;
        self.dirty = false;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn attribute_count(&self) -> usize {
        self.catalog.attribute_count()
    }

    pub fn depth(&self) -> u32 {
        self.catalog.depth()
    }

    pub fn split_pointer(&self) -> u32 {
        self.catalog.split_pointer()
    }

    pub fn page_count(&self) -> u32 {
        self.catalog.page_count()
    }

    pub fn tuple_count(&self) -> u32 {
        self.catalog.tuple_count()
    }

    pub fn choice_vector(&self) -> &ChoiceVector {
        self.catalog.choice_vector()
    }

    /// Returns true if the in-memory catalog has unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn ensure_writable(&self) -> Result<()> {
        match self.mode {
            OpenMode::Write => Ok(()),
            OpenMode::Read => Err(LinHashError::ReadOnly(self.name.clone())),
        }
    }

    fn fatal(&self, err: LinHashError) -> LinHashError {
        if err.is_fatal() {
            tracing::error!(relation = %self.name, error = %err, "storage failure");
        }
        err
    }

    /// Inserts a tuple and returns the bucket it was routed to.
    ///
    /// May split one bucket afterwards; the returned id is the bucket the
    /// tuple was placed in before that split.
    pub fn insert(&mut self, tuple: &Tuple) -> Result<PageId> {
        self.ensure_writable()?;
        let actual = tuple.field_count();
        if actual != self.attribute_count() {
            return Err(LinHashError::MalformedTuple {
                expected: self.attribute_count(),
                actual,
            });
        }

        let hash = tuple.combined_hash(self.catalog.choice_vector());
        let bucket = PageId(self.catalog.bucket_for(hash));
        self.append_to_bucket(bucket, tuple)
            .map_err(|e| self.fatal(e))?;

        self.catalog.record_insert();
        self.dirty = true;

        if self.catalog.should_split() {
            self.split_bucket().map_err(|e| self.fatal(e))?;
        }

        Ok(bucket)
    }

    /// Parses `line` as a tuple of this relation and inserts it.
    pub fn insert_str(&mut self, line: &str) -> Result<PageId> {
        let tuple = Tuple::parse(line, self.attribute_count())?;
        self.insert(&tuple)
    }

    /// Inserts one tuple per line of `reader`, skipping blank lines.
    ///
    /// A malformed line stops the load with its 1-based line number; the
    /// lines before it stay inserted. Returns the number of tuples inserted.
    pub fn insert_from_reader<R: BufRead>(&mut self, reader: R) -> Result<u64> {
        self.ensure_writable()?;
        let mut inserted = 0u64;
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let tuple = Tuple::parse(&line, self.attribute_count()).map_err(|e| {
                LinHashError::InputLine {
                    line: index + 1,
                    source: Box::new(e),
                }
            })?;
            self.insert(&tuple)?;
            inserted += 1;
        }
        tracing::debug!(relation = %self.name, inserted, "bulk insert finished");
        Ok(inserted)
    }

    /// Appends `tuple` to the first page of `bucket`'s chain with room,
    /// growing the chain if every page is full.
    fn append_to_bucket(&self, bucket: PageId, tuple: &Tuple) -> Result<()> {
        let mut primary = BucketPage::from_bytes(self.disk.read_page(FileKind::Data, bucket)?);
        match primary.add_tuple(tuple) {
            Ok(()) => return self.disk.write_page(FileKind::Data, bucket, primary.as_bytes()),
            Err(LinHashError::PageFull) => {}
            Err(e) => return Err(e),
        }

        let mut link = primary.overflow();
        if !link.is_valid() {
            let new_page = self.allocate_overflow(tuple)?;
            primary.set_overflow(new_page);
            return self.disk.write_page(FileKind::Data, bucket, primary.as_bytes());
        }

        let max_hops = self.disk.num_pages(FileKind::Overflow);
        let mut hops = 0;
        loop {
            hops += 1;
            if hops > max_hops {
                return Err(LinHashError::StorageCorrupted(format!(
                    "overflow chain of bucket {} does not terminate",
                    bucket
                )));
            }

            let mut page = BucketPage::from_bytes(self.disk.read_page(FileKind::Overflow, link)?);
            match page.add_tuple(tuple) {
                Ok(()) => return self.disk.write_page(FileKind::Overflow, link, page.as_bytes()),
                Err(LinHashError::PageFull) => {}
                Err(e) => return Err(e),
            }

            let next = page.overflow();
            if !next.is_valid() {
                let new_page = self.allocate_overflow(tuple)?;
                page.set_overflow(new_page);
                return self.disk.write_page(FileKind::Overflow, link, page.as_bytes());
            }
            link = next;
        }
    }

    /// Allocates an overflow page that already holds `tuple`.
    fn allocate_overflow(&self, tuple: &Tuple) -> Result<PageId> {
        let mut page = BucketPage::new();
        page.add_tuple(tuple).map_err(|_| {
            LinHashError::StorageWriteFailure(format!(
                "fresh overflow page rejected a {} byte tuple",
                tuple.size_on_disk()
            ))
        })?;
        let page_id = self.disk.allocate_page(FileKind::Overflow, page.as_bytes())?;
        tracing::debug!(relation = %self.name, page = page_id.0, "allocated overflow page");
        Ok(page_id)
    }

    /// Visits the primary page of `bucket` and then each overflow page in chain order.
    fn walk_chain<F>(&self, bucket: PageId, mut visit: F) -> Result<()>
    where
        F: FnMut(FileKind, PageId, &BucketPage) -> Result<()>,
    {
        let primary = BucketPage::from_bytes(self.disk.read_page(FileKind::Data, bucket)?);
        visit(FileKind::Data, bucket, &primary)?;

        let max_hops = self.disk.num_pages(FileKind::Overflow);
        let mut link = primary.overflow();
        let mut hops = 0;
        while link.is_valid() {
            hops += 1;
            if hops > max_hops {
                return Err(LinHashError::StorageCorrupted(format!(
                    "overflow chain of bucket {} does not terminate",
                    bucket
                )));
            }
            let page = BucketPage::from_bytes(self.disk.read_page(FileKind::Overflow, link)?);
            visit(FileKind::Overflow, link, &page)?;
            link = page.overflow();
        }
        Ok(())
    }

    /// Reads every tuple of `bucket`, chain order then page order.
    pub fn bucket_tuples(&self, bucket: u32) -> Result<Vec<Tuple>> {
        if bucket >= self.page_count() {
            return Err(LinHashError::InvalidParameter {
                name: "bucket".to_string(),
                value: bucket.to_string(),
            });
        }
        let mut tuples = Vec::new();
        self.walk_chain(PageId(bucket), |_, _, page| {
            for tuple in page.iter() {
                tuples.push(tuple?);
            }
            Ok(())
        })?;
        Ok(tuples)
    }

    /// Splits the bucket under the split pointer into itself and bucket
    /// `2^depth + sp`, then advances the split pointer.
    fn split_bucket(&mut self) -> Result<()> {
        let new_id = self.catalog.next_bucket_id()?;
        let allocated = self
            .disk
            .allocate_page(FileKind::Data, BucketPage::new().as_bytes())?;
        if allocated.0 != new_id {
            return Err(LinHashError::StorageCorrupted(format!(
                "split expected new bucket {}, store allocated {}",
                new_id, allocated
            )));
        }

        let old = PageId(self.catalog.split_pointer());
        let tuples = self.bucket_tuples(old.0)?;
        self.disk
            .write_page(FileKind::Data, old, BucketPage::new().as_bytes())?;

        let width = self.catalog.depth() + 1;
        let mut moved = 0usize;
        for tuple in &tuples {
            let hash = tuple.combined_hash(self.catalog.choice_vector());
            let target = PageId(low_bits(hash, width));
            if target != old {
                moved += 1;
            }
            self.append_to_bucket(target, tuple)?;
        }

        self.catalog.advance_split_pointer();
        self.dirty = true;

        tracing::info!(
            relation = %self.name,
            bucket = old.0,
            new_bucket = new_id,
            tuples = tuples.len(),
            moved,
            depth = self.catalog.depth(),
            sp = self.catalog.split_pointer(),
            "split bucket"
        );
        Ok(())
    }

    /// Starts a partial-match selection over this relation.
    pub fn select(&self, pattern: &str) -> Result<Selection<'_>> {
        let pattern = QueryPattern::parse(pattern, self.attribute_count())?;
        Ok(Selection::new(&self.disk, &self.catalog, pattern))
    }

    /// Collects global state and the page chain of every bucket.
    pub fn stats(&self) -> Result<RelationStats> {
        let mut buckets = Vec::with_capacity(self.page_count() as usize);
        for bucket in 0..self.page_count() {
            let mut pages = Vec::new();
            self.walk_chain(PageId(bucket), |file, page_id, page| {
                pages.push(PageStats {
                    file,
                    page_id,
                    tuple_count: page.tuple_count(),
                    free_space: page.free_space(),
                    overflow: page.overflow(),
                });
                Ok(())
            })
            .map_err(|e| self.fatal(e))?;
            buckets.push(BucketStats { bucket, pages });
        }

        Ok(RelationStats {
            name: self.name.clone(),
            attribute_count: self.attribute_count(),
            depth: self.depth(),
            split_pointer: self.split_pointer(),
            page_count: self.page_count(),
            tuple_count: self.tuple_count(),
            overflow_pages: self.disk.num_pages(FileKind::Overflow),
            choice_vector: self.choice_vector().clone(),
            buckets,
        })
    }
}

impl Drop for Relation {
    fn drop(&mut self) {
        if self.dirty {
            tracing::warn!(
                relation = %self.name,
                "relation dropped without close, catalog changes not saved"
            );
        }
    }
}
