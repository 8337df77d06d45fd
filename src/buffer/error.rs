use thiserror::Error;

use crate::file::{FileError, PageId};

#[derive(Debug, Error)]
pub enum BufferError {
    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Page already pinned: page_id={0}")]
    AlreadyPinned(PageId),

    #[error("Invalid unpin: page_id={0} is not resident or not pinned")]
    InvalidUnpin(PageId),

    #[error("Page is pinned: page_id={0}")]
    PagePinned(PageId),

    #[error("Page not pinned: page_id={0}")]
    PageNotPinned(PageId),

    #[error("Buffer pool exhausted: all {0} frames are pinned")]
    PoolExhausted(usize),

    #[error("Invalid page size: expected {expected}, got {actual}")]
    InvalidPageSize { expected: usize, actual: usize },

    #[error("Invalid buffer pool capacity: {0} (must be >= 1)")]
    InvalidCapacity(usize),
}

pub type BufferResult<T> = Result<T, BufferError>;
