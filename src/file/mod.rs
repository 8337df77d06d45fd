mod disk_manager;
mod error;

pub use disk_manager::PagedDiskManager;
pub use error::{FileError, FileResult};

/// Page size in bytes (8KB)
pub const PAGE_SIZE: usize = 8192;

/// Page ID type
pub type PageId = usize;

/// Stable storage underneath the buffer pool.
///
/// Implementations are assumed reliable and synchronous: every call either
/// completes or returns an error before control goes back to the caller.
pub trait DiskManager {
    /// Reserve `count` contiguous page ids and return the first one
    fn allocate_pages(&mut self, count: usize) -> FileResult<PageId>;

    /// Release a previously allocated page id
    fn deallocate_page(&mut self, page_id: PageId) -> FileResult<()>;

    /// Fill `buffer` with the page's bytes
    fn read_page(&mut self, page_id: PageId, buffer: &mut [u8]) -> FileResult<()>;

    /// Persist `buffer` as the page's bytes
    fn write_page(&mut self, page_id: PageId, buffer: &[u8]) -> FileResult<()>;
}
