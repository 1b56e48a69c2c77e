use std::{
    collections::BTreeMap,
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use tracing::{debug, info, warn};

use crate::{
    storage::{
        DIRECTORY_OFFSET_POSITION, chunk_chain,
        config::BucketConfig,
        directory::Directory,
        header::{BucketHeader, PageGeometry},
        page_table::PageTable,
    },
    types::{
        HEADER_PREFIX_SIZE, Offset, PageIndex,
        blob::{self, Blob, BlobKey, BlobMetadata},
        error::{BucketError, Result},
        page::PageState,
    },
    utils::file_io,
};

/// A single-file blob store.
///
/// Holding a `Bucket` means the bucket is open; [`Bucket::close`] consumes it.
/// `upload` and `delete` are serialized by an internal write lock. `get`,
/// `get_metadata` and `list_blobs` only take the in-memory mirrors briefly and
/// are not ordered against a concurrent mutation of the same blob.
pub struct Bucket {
    path: PathBuf,
    file: File,
    header: RwLock<BucketHeader>,
    directory: RwLock<Directory>,
    write_lock: Mutex<()>,
}

impl Bucket {
    /// Opens the bucket at `path` if the file exists, otherwise creates it
    /// with `config`.
    pub fn open_or_create<P: AsRef<Path>>(path: P, config: &BucketConfig) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::open(path)
        } else {
            Self::create_with(path, config)
        }
    }

    pub fn create<P: AsRef<Path>>(path: P, page_size: u32, page_count: u32) -> Result<Self> {
        Self::create_with(path, &BucketConfig::new(page_size, page_count))
    }

    /// Creates a fresh bucket, truncating any existing file at `path`.
    pub fn create_with<P: AsRef<Path>>(path: P, config: &BucketConfig) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .read(true)
            .truncate(true)
            .open(path)?;

        let header = BucketHeader::new(config);
        let directory = Directory::new();
        file_io::write_all_at(&file, &header.to_bytes(), 0)?;
        file_io::write_all_at(&file, &directory.to_bytes(), header.directory_offset)?;
        file.sync_data()?;

        info!(
            path = %path.display(),
            page_size = config.page_size,
            page_count = config.page_count,
            "created bucket"
        );
        Ok(Self::from_parts(path, file, header, directory))
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        let mut prefix = [0u8; HEADER_PREFIX_SIZE];
        file_io::read_exact_at(&file, &mut prefix, 0)
            .map_err(|_| BucketError::corrupt_header("Header too short"))?;
        let header_size = BucketHeader::size_from_prefix(&prefix)?;
        let file_size = file.metadata()?.len();
        if header_size as u64 > file_size {
            return Err(BucketError::corrupt_header("Page table truncated"));
        }

        let mut header_bytes = vec![0u8; header_size];
        file_io::read_exact_at(&file, &mut header_bytes, 0)
            .map_err(|_| BucketError::corrupt_header("Page table truncated"))?;
        let header = BucketHeader::from_bytes(&header_bytes)?;

        if header.directory_offset > file_size {
            return Err(BucketError::corrupt_header(format!(
                "directory offset {} is past end of file ({} bytes)",
                header.directory_offset, file_size
            )));
        }
        let footer = file_io::read_to_end_at(&file, header.directory_offset)?;
        let directory = Directory::from_bytes(&footer)?;
        Self::check_directory(&header, &directory)?;

        info!(
            path = %path.display(),
            blobs = directory.len(),
            free_pages = header.page_table.free_count(),
            "opened bucket"
        );
        Ok(Self::from_parts(path, file, header, directory))
    }

    fn from_parts(path: &Path, file: File, header: BucketHeader, directory: Directory) -> Self {
        Self {
            path: path.to_path_buf(),
            file,
            header: RwLock::new(header),
            directory: RwLock::new(directory),
            write_lock: Mutex::new(()),
        }
    }

    fn check_directory(header: &BucketHeader, directory: &Directory) -> Result<()> {
        let geometry = header.geometry();
        for (name, head) in directory.iter() {
            let used = geometry
                .page_index(head)
                .and_then(|index| header.page_table.state(index))
                == Some(PageState::Used);
            if !used {
                return Err(BucketError::corrupt_header(format!(
                    "blob '{}' points at {}, which is not a used page",
                    name, head
                )));
            }
            if head >= header.directory_offset {
                return Err(BucketError::corrupt_header(format!(
                    "blob '{}' starts past the directory offset",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Syncs outstanding writes and closes the backing file.
    pub fn close(self) -> Result<()> {
        let _guard = self.lock_writes();
        self.file.sync_all()?;
        info!(path = %self.path.display(), "closed bucket");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A copy of the current header, page table included.
    pub fn header(&self) -> BucketHeader {
        self.read_header().clone()
    }

    pub fn free_pages(&self) -> usize {
        self.read_header().page_table.free_count()
    }

    /// Stores `content` under `name` and returns its head offset.
    pub fn upload(&self, name: &str, content: &[u8]) -> Result<Offset> {
        let _guard = self.lock_writes();

        blob::validate_name(name)?;
        if content.len() > u32::MAX as usize {
            return Err(BucketError::Validation {
                reason: format!("content of {} bytes does not fit in u32", content.len()),
            });
        }
        if self.read_directory().contains(name) {
            return Err(BucketError::AlreadyExists {
                name: name.to_string(),
            });
        }

        let framed = Blob::new(name, content).to_framed_bytes();
        let (pages, geometry, previous_offset, directory_offset) = {
            let mut header = self.write_header();
            let geometry = header.geometry();
            let pages = header
                .page_table
                .allocate(framed.len(), geometry.payload_capacity())?;
            let highest = pages.iter().copied().max().unwrap_or_default();
            let previous_offset = header.directory_offset;
            let directory_offset = header.grow_directory_offset(highest);
            (pages, geometry, previous_offset, directory_offset)
        };

        let head = match self.commit_upload(name, geometry, &pages, &framed, directory_offset) {
            Ok(head) => head,
            Err(e) => {
                warn!(name, error = %e, "upload failed, releasing reserved pages");
                self.rollback_upload(name, &pages, previous_offset);
                return Err(e);
            }
        };

        info!(name, head, size = content.len(), pages = pages.len(), "uploaded blob");
        Ok(head)
    }

    /// Chunks first, then page states and `directory_offset`, footer last.
    fn commit_upload(
        &self,
        name: &str,
        geometry: PageGeometry,
        pages: &[PageIndex],
        framed: &[u8],
        directory_offset: Offset,
    ) -> Result<Offset> {
        let head = chunk_chain::write_blob(&self.file, geometry, pages, framed)?;
        self.persist_page_states(pages, PageState::Used)?;
        self.persist_directory_offset(directory_offset)?;

        self.write_directory().insert(name.to_string(), head);
        self.persist_directory(directory_offset)?;
        Ok(head)
    }

    /// Undoes a failed upload in memory and, as far as the file allows, on
    /// disk. Chunk writes may have clobbered the old footer, so it is always
    /// rewritten at the restored offset.
    fn rollback_upload(&self, name: &str, pages: &[PageIndex], previous_offset: Offset) {
        self.write_directory().remove(name);
        {
            let mut header = self.write_header();
            header.page_table.free(pages);
            header.directory_offset = previous_offset;
        }

        let restored = self
            .persist_page_states(pages, PageState::Free)
            .and_then(|_| self.persist_directory_offset(previous_offset))
            .and_then(|_| self.persist_directory(previous_offset));
        if let Err(e) = restored {
            warn!(name, error = %e, "could not restore bucket file after failed upload");
        }
    }

    pub fn get<K: Into<BlobKey>>(&self, key: K) -> Result<Blob> {
        let key = key.into();
        let (name, head) = self.resolve(&key)?;
        let geometry = self.geometry();

        let blob = chunk_chain::read_blob(&self.file, geometry, |index| self.page_state(index), head)
            .inspect_err(|e| warn!(%key, error = %e, "failed to read blob"))?;
        if blob.name != name {
            warn!(%key, stored = %blob.name, "blob name does not match directory");
            return Err(BucketError::corrupt_data(
                head,
                format!("chain holds blob '{}', directory says '{}'", blob.name, name),
            ));
        }
        Ok(blob)
    }

    pub fn get_metadata<K: Into<BlobKey>>(&self, key: K) -> Result<BlobMetadata> {
        let key = key.into();
        let (_, head) = self.resolve(&key)?;
        let geometry = self.geometry();

        chunk_chain::read_metadata(&self.file, geometry, |index| self.page_state(index), head)
            .inspect_err(|e| warn!(%key, error = %e, "failed to read blob metadata"))
    }

    pub fn delete<K: Into<BlobKey>>(&self, key: K) -> Result<()> {
        let _guard = self.lock_writes();

        let key = key.into();
        let (name, head) = self.resolve(&key)?;
        let geometry = self.geometry();
        let pages = chunk_chain::chain_pages(&self.file, geometry, |index| self.page_state(index), head)
            .inspect_err(|e| warn!(%key, error = %e, "refusing to delete corrupt chain"))?;

        let directory_offset = {
            let mut header = self.write_header();
            header.page_table.free(&pages);
            header.directory_offset
        };
        self.persist_page_states(&pages, PageState::Free)?;

        self.write_directory().remove(&name);
        self.persist_directory(directory_offset)?;

        info!(name = %name, head, pages = pages.len(), "deleted blob");
        Ok(())
    }

    /// Snapshot of every blob name and its head offset.
    pub fn list_blobs(&self) -> BTreeMap<String, Offset> {
        self.read_directory().snapshot()
    }

    fn resolve(&self, key: &BlobKey) -> Result<(String, Offset)> {
        self.read_directory()
            .resolve(key)
            .ok_or_else(|| BucketError::NotFound {
                key: key.to_string(),
            })
    }

    fn geometry(&self) -> PageGeometry {
        self.read_header().geometry()
    }

    /// State of a single page, read under a short header lock per chain link.
    fn page_state(&self, index: PageIndex) -> Option<PageState> {
        self.read_header().page_table.state(index)
    }

    fn persist_page_states(&self, pages: &[PageIndex], state: PageState) -> Result<()> {
        for index in pages {
            file_io::write_all_at(&self.file, &[state.as_u8()], PageTable::byte_offset(*index))?;
        }
        Ok(())
    }

    fn persist_directory_offset(&self, directory_offset: Offset) -> Result<()> {
        file_io::write_all_at(
            &self.file,
            &(directory_offset as i64).to_be_bytes(),
            DIRECTORY_OFFSET_POSITION,
        )?;
        Ok(())
    }

    /// Rewrites the footer: truncate at `directory_offset`, then write the
    /// current snapshot.
    fn persist_directory(&self, directory_offset: Offset) -> Result<()> {
        let bytes = self.read_directory().to_bytes();
        self.file.set_len(directory_offset)?;
        file_io::write_all_at(&self.file, &bytes, directory_offset)?;
        self.file.sync_data()?;
        debug!(directory_offset, bytes = bytes.len(), "persisted directory");
        Ok(())
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn read_header(&self) -> RwLockReadGuard<'_, BucketHeader> {
        self.header.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_header(&self) -> RwLockWriteGuard<'_, BucketHeader> {
        self.header.write().unwrap_or_else(|e| e.into_inner())
    }

    fn read_directory(&self) -> RwLockReadGuard<'_, Directory> {
        self.directory.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_directory(&self) -> RwLockWriteGuard<'_, Directory> {
        self.directory.write().unwrap_or_else(|e| e.into_inner())
    }
}
