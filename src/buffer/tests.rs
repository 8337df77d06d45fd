//! Buffer pool tests against an in-memory disk that records every call

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use crate::buffer::{BufferError, BufferManager, FrameDesc, FrameId, PinMode, Replacer};
    use crate::file::{DiskManager, FileError, FileResult, PAGE_SIZE, PageId};

    #[derive(Default)]
    struct RecordingDisk {
        pages: HashMap<PageId, Vec<u8>>,
        allocated: HashSet<PageId>,
        next_page_id: PageId,
        reads: Vec<PageId>,
        writes: Vec<(PageId, Vec<u8>)>,
        deallocations: Vec<PageId>,
        /// Make every `write_page` fail with an I/O error
        fail_writes: bool,
    }

    impl DiskManager for RecordingDisk {
        fn allocate_pages(&mut self, count: usize) -> FileResult<PageId> {
            let first = self.next_page_id;
            self.next_page_id += count;
            self.allocated.extend(first..first + count);
            Ok(first)
        }

        fn deallocate_page(&mut self, page_id: PageId) -> FileResult<()> {
            if !self.allocated.remove(&page_id) {
                return Err(FileError::PageNotAllocated(page_id));
            }
            self.deallocations.push(page_id);
            Ok(())
        }

        fn read_page(&mut self, page_id: PageId, buffer: &mut [u8]) -> FileResult<()> {
            if !self.allocated.contains(&page_id) {
                return Err(FileError::PageNotAllocated(page_id));
            }
            match self.pages.get(&page_id) {
                Some(data) => buffer.copy_from_slice(data),
                None => buffer.fill(0),
            }
            self.reads.push(page_id);
            Ok(())
        }

        fn write_page(&mut self, page_id: PageId, buffer: &[u8]) -> FileResult<()> {
            if !self.allocated.contains(&page_id) {
                return Err(FileError::PageNotAllocated(page_id));
            }
            if self.fail_writes {
                return Err(FileError::Io(std::io::Error::other("write failed")));
            }
            self.pages.insert(page_id, buffer.to_vec());
            self.writes.push((page_id, buffer.to_vec()));
            Ok(())
        }
    }

    /// Policy that always proposes the same frame
    struct FixedVictim(Option<FrameId>);

    impl Replacer for FixedVictim {
        fn on_new_page(&mut self, _frame: &FrameDesc) {}
        fn on_free_page(&mut self, _frame: &FrameDesc) {}
        fn on_pin(&mut self, _frame: &FrameDesc) {}
        fn on_unpin(&mut self, _frame: &FrameDesc) {}

        fn pick_victim(&mut self) -> Option<FrameId> {
            self.0
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    fn setup(capacity: usize) -> BufferManager<RecordingDisk> {
        BufferManager::new(RecordingDisk::default(), capacity).unwrap()
    }

    fn page_with(byte: u8) -> Vec<u8> {
        vec![byte; PAGE_SIZE]
    }

    /// Allocate `count` page ids directly on disk, bypassing the pool
    fn disk_pages(bm: &mut BufferManager<RecordingDisk>, count: usize) -> Vec<PageId> {
        let first = bm.disk_mut().allocate_pages(count).unwrap();
        (first..first + count).collect()
    }

    #[test]
    fn test_pin_count_tracks_pins_minus_unpins() {
        let mut bm = setup(2);
        let page_id = disk_pages(&mut bm, 1)[0];

        for _ in 0..3 {
            bm.pin_page(page_id, PinMode::DiskIo).unwrap();
        }
        assert_eq!(bm.pin_count(page_id), Some(3));

        bm.unpin_page(page_id, false).unwrap();
        bm.unpin_page(page_id, false).unwrap();
        assert_eq!(bm.pin_count(page_id), Some(1));

        bm.unpin_page(page_id, false).unwrap();
        assert_eq!(bm.pin_count(page_id), Some(0));

        let result = bm.unpin_page(page_id, false);
        assert!(matches!(result, Err(BufferError::InvalidUnpin(_))));
        assert_eq!(bm.pin_count(page_id), Some(0));

        // Only the first pin touched the disk
        assert_eq!(bm.disk().reads, vec![page_id]);
    }

    #[test]
    fn test_unpin_non_resident_page() {
        let mut bm = setup(2);
        let result = bm.unpin_page(12, true);
        assert!(matches!(result, Err(BufferError::InvalidUnpin(12))));
    }

    #[test]
    fn test_flush_writes_once() {
        let mut bm = setup(2);
        let page_id = bm.allocate_pages(&page_with(0), 1).unwrap();

        bm.page_mut(page_id).unwrap()[0] = 9;
        bm.unpin_page(page_id, true).unwrap();
        assert!(bm.is_dirty(page_id));

        bm.flush_page(page_id).unwrap();
        assert_eq!(bm.disk().writes.len(), 1);
        assert_eq!(bm.disk().writes[0].0, page_id);
        assert_eq!(bm.disk().writes[0].1[0], 9);
        assert!(!bm.is_dirty(page_id));

        bm.flush_page(page_id).unwrap();
        assert_eq!(bm.disk().writes.len(), 1);
    }

    #[test]
    fn test_flush_non_resident_is_noop() {
        let mut bm = setup(1);
        bm.flush_page(5).unwrap();
        assert!(bm.disk().writes.is_empty());
    }

    #[test]
    fn test_dirty_flag_is_sticky() {
        let mut bm = setup(2);
        let page_id = bm.allocate_pages(&page_with(0), 1).unwrap();
        bm.pin_page(page_id, PinMode::DiskIo).unwrap();

        bm.unpin_page(page_id, true).unwrap();
        bm.unpin_page(page_id, false).unwrap();
        assert!(bm.is_dirty(page_id));

        bm.flush_page(page_id).unwrap();
        assert!(!bm.is_dirty(page_id));
    }

    #[test]
    fn test_pool_exhausted_until_unpin() {
        let capacity = 3;
        let mut bm = setup(capacity);
        let pages = disk_pages(&mut bm, capacity + 1);

        for &page_id in &pages[..capacity] {
            bm.pin_page(page_id, PinMode::DiskIo).unwrap();
        }
        assert_eq!(bm.num_unpinned(), 0);

        let result = bm.pin_page(pages[capacity], PinMode::DiskIo);
        assert!(matches!(result, Err(BufferError::PoolExhausted(3))));
        assert!(!bm.is_resident(pages[capacity]));

        bm.unpin_page(pages[1], false).unwrap();
        bm.pin_page(pages[capacity], PinMode::DiskIo).unwrap();
        assert!(bm.is_resident(pages[capacity]));
        assert!(!bm.is_resident(pages[1]));
        assert_eq!(bm.num_unpinned(), 0);
    }

    #[test]
    fn test_clock_order_through_manager() {
        let mut bm = setup(3);
        let pages = disk_pages(&mut bm, 5);

        // Frames 0, 1, 2
        for &page_id in &pages[..3] {
            bm.pin_page(page_id, PinMode::DiskIo).unwrap();
        }

        // Frame 0 pinned, frame 1 referenced, frame 2 free
        bm.unpin_page(pages[1], false).unwrap();
        bm.unpin_page(pages[2], false).unwrap();
        bm.free_page(pages[2]).unwrap();

        bm.pin_page(pages[3], PinMode::DiskIo).unwrap();
        assert_eq!(bm.frames()[2].page_id, Some(pages[3]));
        assert!(bm.is_resident(pages[1]));

        // Frame 1 lost its second chance on the previous sweep
        bm.pin_page(pages[4], PinMode::DiskIo).unwrap();
        assert_eq!(bm.frames()[1].page_id, Some(pages[4]));
        assert!(!bm.is_resident(pages[1]));
        assert_eq!(bm.stats().evictions, 1);
    }

    #[test]
    fn test_eviction_writes_dirty_victim_only() {
        let mut bm = setup(1);
        let pages = disk_pages(&mut bm, 3);

        bm.pin_page(pages[0], PinMode::DiskIo).unwrap();
        bm.unpin_page(pages[0], false).unwrap();

        // Clean victim: no write
        bm.pin_page(pages[1], PinMode::DiskIo).unwrap()[0] = 5;
        assert!(bm.disk().writes.is_empty());
        bm.unpin_page(pages[1], true).unwrap();

        // Dirty victim: written before the frame is reused
        bm.pin_page(pages[2], PinMode::DiskIo).unwrap();
        assert_eq!(bm.disk().writes.len(), 1);
        assert_eq!(bm.disk().writes[0].0, pages[1]);
        assert_eq!(bm.disk().writes[0].1[0], 5);
        assert_eq!(bm.disk().reads, pages);

        assert!(!bm.is_dirty(pages[2]));
        assert!(!bm.is_resident(pages[1]));
    }

    #[test]
    fn test_free_pinned_page() {
        let mut bm = setup(2);
        let page_id = bm.allocate_pages(&page_with(3), 1).unwrap();

        let result = bm.free_page(page_id);
        assert!(matches!(result, Err(BufferError::PagePinned(_))));
        assert!(bm.is_resident(page_id));
        assert!(bm.disk().deallocations.is_empty());
        assert!(bm.disk().allocated.contains(&page_id));
    }

    #[test]
    fn test_free_unpinned_page() {
        let mut bm = setup(2);
        let page_id = bm.allocate_pages(&page_with(3), 1).unwrap();
        bm.unpin_page(page_id, true).unwrap();

        bm.free_page(page_id).unwrap();
        assert!(!bm.is_resident(page_id));
        assert_eq!(bm.disk().deallocations, vec![page_id]);
        assert!(bm.frames().iter().all(|f| f.is_empty() && !f.dirty));

        // The freed dirty page is never written back
        bm.flush_all_pages().unwrap();
        assert!(bm.disk().writes.is_empty());
    }

    #[test]
    fn test_free_non_resident_page() {
        let mut bm = setup(2);
        let page_id = disk_pages(&mut bm, 1)[0];

        bm.free_page(page_id).unwrap();
        assert_eq!(bm.disk().deallocations, vec![page_id]);

        let result = bm.free_page(page_id);
        assert!(matches!(
            result,
            Err(BufferError::File(FileError::PageNotAllocated(_)))
        ));
    }

    #[test]
    fn test_allocate_rolls_back_whole_run() {
        let mut bm = setup(1);
        bm.allocate_pages(&page_with(0), 1).unwrap();

        let result = bm.allocate_pages(&page_with(1), 4);
        assert!(matches!(result, Err(BufferError::PoolExhausted(1))));

        let disk = bm.disk();
        assert_eq!(disk.deallocations, vec![1, 2, 3, 4]);
        assert_eq!(disk.allocated.len(), 1);
        for page_id in 1..5 {
            assert!(!bm.is_resident(page_id));
        }
    }

    #[test]
    fn test_allocate_does_not_read_disk() {
        let mut bm = setup(2);
        let page_id = bm.allocate_pages(&page_with(4), 3).unwrap();

        assert_eq!(page_id, 0);
        assert_eq!(bm.page(page_id).unwrap(), &page_with(4)[..]);
        assert!(bm.disk().reads.is_empty());
        assert!(!bm.is_resident(1));
        assert_eq!(bm.disk().allocated.len(), 3);
    }

    #[test]
    fn test_flush_all_scans_past_empty_frames() {
        let mut bm = setup(3);
        let pages = disk_pages(&mut bm, 3);

        for &page_id in &pages {
            bm.pin_page(page_id, PinMode::DiskIo).unwrap();
            bm.unpin_page(page_id, true).unwrap();
        }

        // Leave a hole in frame 1
        bm.free_page(pages[1]).unwrap();
        assert!(bm.frames()[1].is_empty());

        bm.flush_all_pages().unwrap();
        let written: Vec<PageId> = bm.disk().writes.iter().map(|(id, _)| *id).collect();
        assert_eq!(written, vec![pages[0], pages[2]]);
        assert!(bm.frames().iter().all(|f| !f.dirty));
    }

    #[test]
    fn test_buffer_counts() {
        let mut bm = setup(4);
        let pages = disk_pages(&mut bm, 3);
        assert_eq!(bm.num_buffers(), 4);
        assert_eq!(bm.num_unpinned(), 4);

        bm.pin_page(pages[0], PinMode::DiskIo).unwrap();
        bm.pin_page(pages[0], PinMode::DiskIo).unwrap();
        bm.pin_page(pages[1], PinMode::DiskIo).unwrap();
        assert_eq!(bm.num_unpinned(), 2);

        bm.unpin_page(pages[0], false).unwrap();
        assert_eq!(bm.num_unpinned(), 2);
        bm.unpin_page(pages[0], false).unwrap();
        assert_eq!(bm.num_unpinned(), 3);

        assert!(matches!(
            bm.pin_page(pages[2], PinMode::MemCopy(&[0u8; 3])),
            Err(BufferError::InvalidPageSize { actual: 3, .. })
        ));
        assert_eq!(bm.num_unpinned(), 3);
        assert_eq!(bm.num_buffers(), 4);
    }

    #[test]
    fn test_substituted_policy() {
        let mut bm =
            BufferManager::with_replacer(RecordingDisk::default(), 3, Box::new(FixedVictim(Some(2))))
                .unwrap();
        assert_eq!(bm.replacer_name(), "fixed");

        let page_id = bm.allocate_pages(&page_with(1), 1).unwrap();
        assert_eq!(bm.frames()[2].page_id, Some(page_id));

        // The stub proposes a pinned frame; the manager refuses it
        let result = bm.allocate_pages(&page_with(2), 1);
        assert!(matches!(result, Err(BufferError::PoolExhausted(3))));
        assert_eq!(bm.pin_count(page_id), Some(1));
        assert_eq!(bm.disk().deallocations, vec![1]);
    }

    #[test]
    fn test_policy_without_victim() {
        let mut bm =
            BufferManager::with_replacer(RecordingDisk::default(), 2, Box::new(FixedVictim(None)))
                .unwrap();
        let page_id = disk_pages(&mut bm, 1)[0];

        let result = bm.pin_page(page_id, PinMode::DiskIo);
        assert!(matches!(result, Err(BufferError::PoolExhausted(2))));
        assert_eq!(bm.num_unpinned(), 2);
    }

    #[test]
    fn test_policy_out_of_range_frame() {
        let mut bm =
            BufferManager::with_replacer(RecordingDisk::default(), 3, Box::new(FixedVictim(Some(3))))
                .unwrap();
        let page_id = disk_pages(&mut bm, 1)[0];

        let result = bm.pin_page(page_id, PinMode::DiskIo);
        assert!(matches!(result, Err(BufferError::PoolExhausted(3))));
        assert!(!bm.is_resident(page_id));
        assert_eq!(bm.num_unpinned(), 3);
        assert!(bm.disk().reads.is_empty());
    }

    #[test]
    fn test_failed_write_back_keeps_victim() {
        let mut bm = setup(1);
        let pages = disk_pages(&mut bm, 2);

        bm.pin_page(pages[0], PinMode::MemCopy(&page_with(9))).unwrap();
        bm.unpin_page(pages[0], true).unwrap();

        bm.disk_mut().fail_writes = true;
        let result = bm.pin_page(pages[1], PinMode::DiskIo);
        assert!(matches!(result, Err(BufferError::File(FileError::Io(_)))));

        // The dirty page stays resident with its bytes and can be retried
        assert!(bm.is_resident(pages[0]));
        assert!(bm.is_dirty(pages[0]));
        assert_eq!(bm.pin_count(pages[0]), Some(0));
        assert_eq!(bm.page(pages[0]), Some(&page_with(9)[..]));
        assert!(!bm.is_resident(pages[1]));
        assert!(bm.disk().reads.is_empty());

        bm.disk_mut().fail_writes = false;
        bm.pin_page(pages[1], PinMode::DiskIo).unwrap();
        assert_eq!(bm.disk().pages.get(&pages[0]), Some(&page_with(9)));
        assert!(!bm.is_resident(pages[0]));
    }

    #[test]
    fn test_stats() {
        let mut bm = setup(1);
        let pages = disk_pages(&mut bm, 2);

        bm.pin_page(pages[0], PinMode::DiskIo).unwrap();
        bm.pin_page(pages[0], PinMode::DiskIo).unwrap();
        bm.unpin_page(pages[0], true).unwrap();
        bm.unpin_page(pages[0], false).unwrap();
        bm.pin_page(pages[1], PinMode::DiskIo).unwrap();

        let stats = bm.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.disk_reads, 2);
        assert_eq!(stats.disk_writes, 1);
    }
}
