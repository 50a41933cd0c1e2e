//! Disk manager for page-level file I/O on one relation.
//!
//! A relation owns three files: `<name>.info` holds the catalog header,
//! `<name>.data` the primary bucket pages and `<name>.ovflow` the overflow
//! pages. Page files are arrays of `PAGE_SIZE` blocks addressed by `PageId`.

use linhash_common::page::{FileKind, PAGE_SIZE, PageId};
use linhash_common::{LinHashError, Result, StorageConfig};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Extension of the catalog header file.
pub const INFO_EXTENSION: &str = "info";

/// Configuration for the disk manager.
#[derive(Debug, Clone)]
pub struct DiskManagerConfig {
    /// Directory holding the relation files.
    pub data_dir: PathBuf,
    /// Relation name, used as the file stem.
    pub relation: String,
    /// Enable fsync after writes.
    pub fsync_enabled: bool,
    /// Open files for writing.
    pub writable: bool,
}

impl DiskManagerConfig {
    /// Builds a disk manager configuration for `relation` under `storage`.
    pub fn for_relation(storage: &StorageConfig, relation: &str, writable: bool) -> Self {
        Self {
            data_dir: storage.data_dir.clone(),
            relation: relation.to_string(),
            fsync_enabled: storage.fsync_enabled,
            writable,
        }
    }

    fn path(&self, extension: &str) -> PathBuf {
        self.data_dir.join(format!("{}.{}", self.relation, extension))
    }
}

/// Manages reading and writing the files of a single relation.
pub struct DiskManager {
    /// Configuration.
    config: DiskManagerConfig,
    /// Catalog header file.
    info: Mutex<File>,
    /// Page file handles keyed by kind.
    files: Mutex<HashMap<FileKind, FileHandle>>,
}

/// Handle for an open page file.
struct FileHandle {
    /// The file handle.
    file: File,
    /// Number of pages in the file.
    num_pages: u32,
}

impl FileHandle {
    fn new(file: File) -> Result<Self> {
        let file_size = file.metadata()?.len();
        let num_pages = (file_size / PAGE_SIZE as u64) as u32;
        Ok(Self { file, num_pages })
    }
}

impl DiskManager {
    /// Creates the relation files, failing if the relation already exists.
    pub fn create(config: DiskManagerConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let info_path = config.path(INFO_EXTENSION);
        let info = match OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&info_path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(LinHashError::RelationExists(config.relation.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut files = HashMap::new();
        for kind in [FileKind::Data, FileKind::Overflow] {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(config.path(kind.extension()))?;
            files.insert(kind, FileHandle::new(file)?);
        }

        Ok(Self {
            config,
            info: Mutex::new(info),
            files: Mutex::new(files),
        })
    }

    /// Opens the files of an existing relation.
    pub fn open(config: DiskManagerConfig) -> Result<Self> {
        let open = |path: &Path| -> Result<File> {
            OpenOptions::new()
                .read(true)
                .write(config.writable)
                .open(path)
                .map_err(|e| match e.kind() {
                    ErrorKind::NotFound => LinHashError::RelationNotFound(config.relation.clone()),
                    _ => LinHashError::Io(e),
                })
        };

        let info = open(&config.path(INFO_EXTENSION))?;
        let mut files = HashMap::new();
        for kind in [FileKind::Data, FileKind::Overflow] {
            let file = open(&config.path(kind.extension()))?;
            files.insert(kind, FileHandle::new(file)?);
        }

        Ok(Self {
            config,
            info: Mutex::new(info),
            files: Mutex::new(files),
        })
    }

    /// Returns true if the catalog file of `relation` exists.
    pub fn exists(storage: &StorageConfig, relation: &str) -> bool {
        storage.relation_file(relation, INFO_EXTENSION).is_file()
    }

    /// Removes all files of `relation`. Missing files are ignored.
    pub fn delete(storage: &StorageConfig, relation: &str) -> Result<()> {
        for extension in [
            INFO_EXTENSION,
            FileKind::Data.extension(),
            FileKind::Overflow.extension(),
        ] {
            let path = storage.relation_file(relation, extension);
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    /// Returns the relation name.
    pub fn relation(&self) -> &str {
        &self.config.relation
    }

    /// Reads the catalog header into `buf`.
    pub fn read_info(&self, buf: &mut [u8]) -> Result<()> {
        let mut info = self.info.lock();
        info.seek(SeekFrom::Start(0))?;
        info.read_exact(buf).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => LinHashError::StorageCorrupted(format!(
                "{}.{} is truncated",
                self.config.relation, INFO_EXTENSION
            )),
            _ => LinHashError::Io(e),
        })
    }

    /// Overwrites the catalog header with `data`.
    pub fn write_info(&self, data: &[u8]) -> Result<()> {
        let mut info = self.info.lock();
        info.seek(SeekFrom::Start(0))?;
        info.write_all(data)?;
        if self.config.fsync_enabled {
            info.sync_all()?;
        }
        Ok(())
    }

    /// Reads a page from disk.
    pub fn read_page(&self, kind: FileKind, page_id: PageId) -> Result<[u8; PAGE_SIZE]> {
        let mut files = self.files.lock();
        let handle = files
            .get_mut(&kind)
            .ok_or_else(|| LinHashError::StorageCorrupted(format!("{} file not open", kind)))?;

        if !page_id.is_valid() || page_id.0 >= handle.num_pages {
            return Err(LinHashError::StorageCorrupted(format!(
                "page {} does not exist in {}.{}",
                page_id,
                self.config.relation,
                kind.extension()
            )));
        }

        handle.file.seek(SeekFrom::Start(page_id.file_offset()))?;
        let mut buffer = [0u8; PAGE_SIZE];
        handle.file.read_exact(&mut buffer)?;

        Ok(buffer)
    }

    /// Writes an existing page back to disk.
    pub fn write_page(
        &self,
        kind: FileKind,
        page_id: PageId,
        data: &[u8; PAGE_SIZE],
    ) -> Result<()> {
        let mut files = self.files.lock();
        let handle = files
            .get_mut(&kind)
            .ok_or_else(|| LinHashError::StorageCorrupted(format!("{} file not open", kind)))?;

        if !page_id.is_valid() || page_id.0 >= handle.num_pages {
            return Err(LinHashError::StorageCorrupted(format!(
                "write to unallocated page {} in {}.{}",
                page_id,
                self.config.relation,
                kind.extension()
            )));
        }

        handle.file.seek(SeekFrom::Start(page_id.file_offset()))?;
        handle.file.write_all(data)?;

        if self.config.fsync_enabled {
            handle.file.sync_all()?;
        }

        Ok(())
    }

    /// Appends a page initialised with `data` to the end of a file.
    ///
    /// Returns the PageId of the newly allocated page. Ids are sequential.
    pub fn allocate_page(&self, kind: FileKind, data: &[u8; PAGE_SIZE]) -> Result<PageId> {
        let mut files = self.files.lock();
        let handle = files
            .get_mut(&kind)
            .ok_or_else(|| LinHashError::StorageCorrupted(format!("{} file not open", kind)))?;

        let page_id = PageId(handle.num_pages);
        if !page_id.is_valid() {
            return Err(LinHashError::StorageWriteFailure(format!(
                "{}.{} has no page ids left",
                self.config.relation,
                kind.extension()
            )));
        }

        handle.file.seek(SeekFrom::Start(page_id.file_offset()))?;
        handle.file.write_all(data)?;

        if self.config.fsync_enabled {
            handle.file.sync_all()?;
        }

        handle.num_pages += 1;
        tracing::trace!(
            relation = %self.config.relation,
            file = %kind,
            page = page_id.0,
            "allocated page"
        );

        Ok(page_id)
    }

    /// Returns the number of pages in a file.
    pub fn num_pages(&self, kind: FileKind) -> u32 {
        self.files
            .lock()
            .get(&kind)
            .map(|handle| handle.num_pages)
            .unwrap_or(0)
    }

    /// Flushes all pending writes to disk.
    pub fn flush(&self) -> Result<()> {
        if !self.config.writable {
            return Ok(());
        }
        self.info.lock().sync_all()?;
        let files = self.files.lock();
        for handle in files.values() {
            handle.file.sync_all()?;
        }
        Ok(())
    }
}

impl Drop for DiskManager {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
