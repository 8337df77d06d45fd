use super::FrameId;
use crate::file::PageId;

/// Bookkeeping for one slot of the buffer pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameDesc {
    index: FrameId,
    /// Page currently held by the frame, `None` when the frame is empty
    pub page_id: Option<PageId>,
    pub pin_count: u32,
    /// Set when the in-memory copy may differ from disk; cleared only by a flush
    pub dirty: bool,
}

impl FrameDesc {
    /// An empty, unpinned, clean frame at slot `index`
    pub fn new(index: FrameId) -> Self {
        Self {
            index,
            page_id: None,
            pin_count: 0,
            dirty: false,
        }
    }

    /// Slot of this frame in the pool, fixed for its lifetime
    pub fn index(&self) -> FrameId {
        self.index
    }

    /// Whether no page is loaded
    pub fn is_empty(&self) -> bool {
        self.page_id.is_none()
    }

    /// Whether any caller holds a pin, which makes the frame ineligible for eviction
    pub fn is_pinned(&self) -> bool {
        self.pin_count > 0
    }

    /// Return the frame to its freshly constructed state
    pub fn reset(&mut self) {
        self.page_id = None;
        self.pin_count = 0;
        self.dirty = false;
    }
}
