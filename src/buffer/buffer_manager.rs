use ahash::AHashMap;
use log::{debug, warn};

use super::error::{BufferError, BufferResult};
use super::frame::FrameDesc;
use super::replacer::{Clock, Replacer};
use super::FrameId;
use crate::config::PoolConfig;
use crate::file::{DiskManager, PAGE_SIZE, PageId};

/// Where the content of a page comes from when it is not resident
#[derive(Debug, Clone, Copy)]
pub enum PinMode<'a> {
    /// Read the page from disk
    DiskIo,
    /// Use the given bytes as the page's full content; no disk access.
    /// Fails if the page is already resident and pinned.
    MemCopy(&'a [u8]),
}

/// Counters describing the work done by a buffer pool
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub disk_reads: u64,
    pub disk_writes: u64,
}

/// Caches disk pages in a fixed number of frames.
///
/// Pinned pages are never evicted. A dirty page is written back before its
/// frame is reused and on every explicit flush. The manager performs no
/// locking; callers sharing it across threads must serialize access.
pub struct BufferManager<D: DiskManager> {
    disk: D,
    /// Frame contents, one `PAGE_SIZE` buffer per frame
    pool: Vec<Box<[u8]>>,
    frames: Vec<FrameDesc>,
    /// Resident pages only
    directory: AHashMap<PageId, FrameId>,
    replacer: Box<dyn Replacer>,
    stats: PoolStats,
}

impl<D: DiskManager> BufferManager<D> {
    /// Create a buffer pool with `capacity` frames and the clock policy
    pub fn new(disk: D, capacity: usize) -> BufferResult<Self> {
        Self::with_replacer(disk, capacity, Box::new(Clock::new(capacity)))
    }

    /// Create a buffer pool as described by `config`
    pub fn from_config(disk: D, config: &PoolConfig) -> BufferResult<Self> {
        let replacer = config.replacement_policy.build(config.capacity);
        Self::with_replacer(disk, config.capacity, replacer)
    }

    /// Create a buffer pool driven by a caller-supplied policy
    pub fn with_replacer(
        disk: D,
        capacity: usize,
        replacer: Box<dyn Replacer>,
    ) -> BufferResult<Self> {
        if capacity == 0 {
            return Err(BufferError::InvalidCapacity(capacity));
        }

        debug!(
            "creating buffer pool: {} frames, {} policy",
            capacity,
            replacer.name()
        );

        Ok(Self {
            disk,
            pool: (0..capacity)
                .map(|_| vec![0u8; PAGE_SIZE].into_boxed_slice())
                .collect(),
            frames: (0..capacity).map(FrameDesc::new).collect(),
            directory: AHashMap::with_capacity(capacity),
            replacer,
            stats: PoolStats::default(),
        })
    }

    /// Allocate `count` contiguous pages on disk and pin the first one with
    /// `content` as its initial bytes.
    ///
    /// If the first page cannot be pinned, the whole run is deallocated
    /// again before the pin error is returned.
    pub fn allocate_pages(&mut self, content: &[u8], count: usize) -> BufferResult<PageId> {
        let first = self.disk.allocate_pages(count)?;

        let frame_id = match self.pin_frame(first, PinMode::MemCopy(content)) {
            Ok(frame_id) => frame_id,
            Err(err) => {
                for page_id in first..first + count {
                    if let Err(dealloc_err) = self.disk.deallocate_page(page_id) {
                        warn!(
                            "failed to roll back allocation of page {}: {}",
                            page_id, dealloc_err
                        );
                    }
                }
                return Err(err);
            }
        };

        self.replacer.on_new_page(&self.frames[frame_id]);
        debug!(
            "allocated {} page(s) starting at {} into frame {}",
            count, first, frame_id
        );

        Ok(first)
    }

    /// Drop a page from the pool (if resident) and deallocate it on disk
    pub fn free_page(&mut self, page_id: PageId) -> BufferResult<()> {
        if let Some(&frame_id) = self.directory.get(&page_id) {
            let frame = &mut self.frames[frame_id];
            if frame.is_pinned() {
                return Err(BufferError::PagePinned(page_id));
            }

            self.directory.remove(&page_id);
            frame.reset();
            self.replacer.on_free_page(frame);
            debug!("freed page {} from frame {}", page_id, frame_id);
        }

        self.disk.deallocate_page(page_id)?;
        Ok(())
    }

    /// Pin a page and return the bytes of the frame holding it.
    ///
    /// On a hit the pin count is incremented. On a miss a victim frame is
    /// reclaimed (written back first if dirty) and filled according to
    /// `mode`.
    pub fn pin_page(&mut self, page_id: PageId, mode: PinMode<'_>) -> BufferResult<&mut [u8]> {
        let frame_id = self.pin_frame(page_id, mode)?;
        Ok(&mut self.pool[frame_id])
    }

    /// Release one pin on a page. `dirty` marks the page modified; the flag
    /// stays set until the page is flushed.
    pub fn unpin_page(&mut self, page_id: PageId, dirty: bool) -> BufferResult<()> {
        let frame_id = match self.directory.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return Err(BufferError::InvalidUnpin(page_id)),
        };

        let frame = &mut self.frames[frame_id];
        if frame.pin_count == 0 {
            return Err(BufferError::InvalidUnpin(page_id));
        }

        frame.pin_count -= 1;
        frame.dirty |= dirty;
        self.replacer.on_unpin(frame);

        Ok(())
    }

    /// Write a page to disk if it is resident and dirty
    pub fn flush_page(&mut self, page_id: PageId) -> BufferResult<()> {
        if let Some(&frame_id) = self.directory.get(&page_id) {
            self.flush_frame(frame_id)?;
        }
        Ok(())
    }

    /// Write every resident dirty page to disk, in frame order
    pub fn flush_all_pages(&mut self) -> BufferResult<()> {
        for frame_id in 0..self.frames.len() {
            self.flush_frame(frame_id)?;
        }
        Ok(())
    }

    /// Total number of frames
    pub fn num_buffers(&self) -> usize {
        self.frames.len()
    }

    /// Number of frames with a pin count of zero
    pub fn num_unpinned(&self) -> usize {
        self.frames.iter().filter(|f| !f.is_pinned()).count()
    }

    /// Bytes of a resident page
    pub fn page(&self, page_id: PageId) -> Option<&[u8]> {
        self.directory
            .get(&page_id)
            .map(|&frame_id| &self.pool[frame_id][..])
    }

    /// Mutable bytes of a pinned page. Modifications must be reported with
    /// `unpin_page(page_id, true)`.
    pub fn page_mut(&mut self, page_id: PageId) -> BufferResult<&mut [u8]> {
        match self.directory.get(&page_id) {
            Some(&frame_id) if self.frames[frame_id].is_pinned() => {
                Ok(&mut self.pool[frame_id])
            }
            _ => Err(BufferError::PageNotPinned(page_id)),
        }
    }

    /// Whether the page currently occupies a frame
    pub fn is_resident(&self, page_id: PageId) -> bool {
        self.directory.contains_key(&page_id)
    }

    /// Pin count of a resident page
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        self.directory
            .get(&page_id)
            .map(|&frame_id| self.frames[frame_id].pin_count)
    }

    /// Whether a resident page has changes not yet written to disk
    pub fn is_dirty(&self, page_id: PageId) -> bool {
        self.directory
            .get(&page_id)
            .is_some_and(|&frame_id| self.frames[frame_id].dirty)
    }

    /// The frame table, in frame order
    pub fn frames(&self) -> &[FrameDesc] {
        &self.frames
    }

    /// Name of the replacement policy in use
    pub fn replacer_name(&self) -> &'static str {
        self.replacer.name()
    }

    /// Hit, miss, eviction and disk I/O counters since construction
    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    /// The underlying disk manager
    pub fn disk(&self) -> &D {
        &self.disk
    }

    /// Mutable access to the disk manager. Pages it holds may be stale
    /// while dirty copies sit in the pool.
    pub fn disk_mut(&mut self) -> &mut D {
        &mut self.disk
    }

    fn pin_frame(&mut self, page_id: PageId, mode: PinMode<'_>) -> BufferResult<FrameId> {
        if let PinMode::MemCopy(content) = mode
            && content.len() != PAGE_SIZE
        {
            return Err(BufferError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: content.len(),
            });
        }

        if let Some(&frame_id) = self.directory.get(&page_id) {
            let frame = &mut self.frames[frame_id];
            if matches!(mode, PinMode::MemCopy(_)) && frame.is_pinned() {
                return Err(BufferError::AlreadyPinned(page_id));
            }

            frame.pin_count += 1;
            self.replacer.on_pin(frame);
            self.stats.hits += 1;
            debug!("buffer pool hit for page {} in frame {}", page_id, frame_id);
            return Ok(frame_id);
        }

        let frame_id = self
            .replacer
            .pick_victim()
            .ok_or(BufferError::PoolExhausted(self.frames.len()))?;
        if self.frames.get(frame_id).is_none_or(FrameDesc::is_pinned) {
            warn!(
                "{} policy picked unusable frame {}",
                self.replacer.name(),
                frame_id
            );
            return Err(BufferError::PoolExhausted(self.frames.len()));
        }

        self.stats.misses += 1;
        debug!(
            "buffer pool miss for page {}, using frame {}",
            page_id, frame_id
        );
        self.evict(frame_id)?;

        // The frame is empty from here on; a failed read leaves it that way
        match mode {
            PinMode::MemCopy(content) => self.pool[frame_id].copy_from_slice(content),
            PinMode::DiskIo => {
                self.disk.read_page(page_id, &mut self.pool[frame_id])?;
                self.stats.disk_reads += 1;
            }
        }

        let frame = &mut self.frames[frame_id];
        frame.page_id = Some(page_id);
        frame.pin_count = 1;
        frame.dirty = false;
        self.directory.insert(page_id, frame_id);
        self.replacer.on_pin(frame);

        Ok(frame_id)
    }

    /// Empty a victim frame, writing its page back first if dirty
    fn evict(&mut self, frame_id: FrameId) -> BufferResult<()> {
        let old_page = match self.frames[frame_id].page_id {
            Some(page_id) => page_id,
            None => return Ok(()),
        };

        self.flush_frame(frame_id)?;

        let frame = &mut self.frames[frame_id];
        self.directory.remove(&old_page);
        frame.reset();
        self.replacer.on_free_page(frame);
        self.stats.evictions += 1;
        debug!("evicted page {} from frame {}", old_page, frame_id);

        Ok(())
    }

    fn flush_frame(&mut self, frame_id: FrameId) -> BufferResult<()> {
        let frame = &mut self.frames[frame_id];
        if let Some(page_id) = frame.page_id
            && frame.dirty
        {
            self.disk.write_page(page_id, &self.pool[frame_id])?;
            frame.dirty = false;
            self.stats.disk_writes += 1;
            debug!("flushed page {} from frame {}", page_id, frame_id);
        }
        Ok(())
    }
}

impl<D: DiskManager> Drop for BufferManager<D> {
    fn drop(&mut self) {
        // Flush all dirty pages when the buffer manager is dropped
        if let Err(err) = self.flush_all_pages() {
            warn!("failed to flush buffer pool on drop: {}", err);
        }
    }
}
