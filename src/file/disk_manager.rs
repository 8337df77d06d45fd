use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::debug;

use super::error::{FileError, FileResult};
use super::{DiskManager, PAGE_SIZE, PageId};

/// Magic number for the space map page: "BPSM" in ASCII
pub const MAGIC_NUMBER: u32 = 0x4250534D;

/// Current space map format version
pub const VERSION: u32 = 1;

/// Bytes in front of the allocation bitmap: magic, version, page count
const HEADER_SIZE: usize = 16;

/// Largest number of page ids (the space map page included) the bitmap can track
pub const MAX_PAGES: usize = (PAGE_SIZE - HEADER_SIZE) * 8;

/// Reserved id of the space map page
const SPACE_MAP_PAGE: PageId = 0;

/// Single-file page store.
///
/// Page `k` lives at byte offset `k * PAGE_SIZE`. Page 0 holds the space map,
/// a bitmap of allocated page ids that is rewritten on every allocation
/// change so allocations survive a reopen.
pub struct PagedDiskManager {
    file: File,
    path: PathBuf,
    /// One flag per tracked page id; index 0 is the space map itself
    allocated: Vec<bool>,
}

impl PagedDiskManager {
    /// Create a new database file with an empty space map
    pub fn create<P: AsRef<Path>>(path: P) -> FileResult<Self> {
        let path = path.as_ref();

        if path.exists() {
            return Err(FileError::FileAlreadyExists(path.display().to_string()));
        }

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        let mut manager = Self {
            file,
            path: path.to_path_buf(),
            allocated: vec![true],
        };
        manager.write_space_map()?;
        debug!("created database file {}", path.display());

        Ok(manager)
    }

    /// Open an existing database file and load its space map
    pub fn open<P: AsRef<Path>>(path: P) -> FileResult<Self> {
        let path_ref = path.as_ref();
        let path = path_ref
            .canonicalize()
            .map_err(|_| FileError::FileNotFound(path_ref.display().to_string()))?;

        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;

        let mut header = vec![0u8; PAGE_SIZE];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut header)
            .map_err(|_| FileError::CorruptSpaceMap("truncated header page".to_string()))?;
        let allocated = decode_space_map(&header)?;

        debug!(
            "opened database file {} ({} pages tracked)",
            path.display(),
            allocated.len()
        );

        Ok(Self {
            file,
            path,
            allocated,
        })
    }

    /// Open the file if it exists, otherwise create it
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> FileResult<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// Path of the underlying database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if a page id is currently allocated
    pub fn is_allocated(&self, page_id: PageId) -> bool {
        page_id != SPACE_MAP_PAGE && self.allocated.get(page_id).copied().unwrap_or(false)
    }

    /// Number of allocated data pages (the space map page excluded)
    pub fn allocated_pages(&self) -> usize {
        self.allocated.iter().skip(1).filter(|&&a| a).count()
    }

    /// Sync the file to disk (flush all OS buffers)
    pub fn sync(&mut self) -> FileResult<()> {
        self.file.sync_data()?;
        Ok(())
    }

    /// First-fit search for `count` contiguous free ids. May return a run
    /// that extends past the currently tracked range.
    fn find_free_run(&self, count: usize) -> PageId {
        let mut run_start = self.allocated.len();
        let mut run_len = 0;

        for id in 1..self.allocated.len() {
            if self.allocated[id] {
                run_len = 0;
                continue;
            }
            if run_len == 0 {
                run_start = id;
            }
            run_len += 1;
            if run_len == count {
                return run_start;
            }
        }

        if run_len > 0 {
            run_start
        } else {
            self.allocated.len()
        }
    }

    fn check_page(&self, page_id: PageId, len: usize) -> FileResult<()> {
        if len != PAGE_SIZE {
            return Err(FileError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: len,
            });
        }
        if !self.is_allocated(page_id) {
            return Err(FileError::PageNotAllocated(page_id));
        }
        Ok(())
    }

    fn write_space_map(&mut self) -> FileResult<()> {
        let buf = encode_space_map(&self.allocated);
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&buf)?;
        Ok(())
    }
}

impl DiskManager for PagedDiskManager {
    fn allocate_pages(&mut self, count: usize) -> FileResult<PageId> {
        if count == 0 {
            return Err(FileError::InvalidRunSize(count));
        }

        let first = self.find_free_run(count);
        let end = first
            .checked_add(count)
            .filter(|&end| end <= MAX_PAGES)
            .ok_or(FileError::DiskFull(count))?;

        let tracked = self.allocated.len();
        if end > tracked {
            self.allocated.resize(end, false);
        }
        self.allocated[first..end].fill(true);

        if let Err(err) = self.write_space_map() {
            self.allocated[first..end].fill(false);
            self.allocated.truncate(tracked);
            return Err(err);
        }

        debug!("allocated pages {}..{}", first, end);
        Ok(first)
    }

    fn deallocate_page(&mut self, page_id: PageId) -> FileResult<()> {
        if !self.is_allocated(page_id) {
            return Err(FileError::PageNotAllocated(page_id));
        }

        self.allocated[page_id] = false;
        if let Err(err) = self.write_space_map() {
            self.allocated[page_id] = true;
            return Err(err);
        }

        debug!("deallocated page {}", page_id);
        Ok(())
    }

    fn read_page(&mut self, page_id: PageId, buffer: &mut [u8]) -> FileResult<()> {
        self.check_page(page_id, buffer.len())?;

        let offset = (page_id * PAGE_SIZE) as u64;
        self.file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < PAGE_SIZE {
            let n = self.file.read(&mut buffer[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        // Pages never written read back as zeros
        buffer[filled..].fill(0);

        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, buffer: &[u8]) -> FileResult<()> {
        self.check_page(page_id, buffer.len())?;

        let offset = (page_id * PAGE_SIZE) as u64;
        let required_size = offset + PAGE_SIZE as u64;

        // Extend file if necessary to ensure we can write at this offset
        let current_size = self.file.metadata()?.len();
        if current_size < required_size {
            self.file.set_len(required_size)?;
        }

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buffer)?;
        // No sync here; the OS batches writes until sync() is called

        Ok(())
    }
}

/// Serialize the allocation flags into a full space map page
fn encode_space_map(allocated: &[bool]) -> Vec<u8> {
    let mut buf = vec![0u8; PAGE_SIZE];

    buf[0..4].copy_from_slice(&MAGIC_NUMBER.to_le_bytes());
    buf[4..8].copy_from_slice(&VERSION.to_le_bytes());
    buf[8..16].copy_from_slice(&(allocated.len() as u64).to_le_bytes());

    for (id, _) in allocated.iter().enumerate().filter(|(_, a)| **a) {
        buf[HEADER_SIZE + id / 8] |= 1 << (id % 8);
    }

    buf
}

/// Parse a space map page back into allocation flags
fn decode_space_map(buf: &[u8]) -> FileResult<Vec<bool>> {
    let magic = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if magic != MAGIC_NUMBER {
        return Err(FileError::CorruptSpaceMap(format!(
            "bad magic number {:#010x}",
            magic
        )));
    }

    let version = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
    if version != VERSION {
        return Err(FileError::CorruptSpaceMap(format!(
            "unsupported version {}",
            version
        )));
    }

    let mut count_bytes = [0u8; 8];
    count_bytes.copy_from_slice(&buf[8..16]);
    let count = u64::from_le_bytes(count_bytes) as usize;
    if count == 0 || count > MAX_PAGES {
        return Err(FileError::CorruptSpaceMap(format!(
            "invalid page count {}",
            count
        )));
    }

    let mut allocated: Vec<bool> = (0..count)
        .map(|id| buf[HEADER_SIZE + id / 8] & (1 << (id % 8)) != 0)
        .collect();
    allocated[SPACE_MAP_PAGE] = true;

    Ok(allocated)
}
