use std::io;
use thiserror::Error;

use super::PageId;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("File already exists: {0}")]
    FileAlreadyExists(String),

    #[error("Invalid page size: expected {expected}, got {actual}")]
    InvalidPageSize { expected: usize, actual: usize },

    #[error("Page not allocated: page_id={0}")]
    PageNotAllocated(PageId),

    #[error("Invalid run size: {0}")]
    InvalidRunSize(usize),

    #[error("Disk full: cannot allocate {0} more pages")]
    DiskFull(usize),

    #[error("Corrupt space map: {0}")]
    CorruptSpaceMap(String),
}

pub type FileResult<T> = Result<T, FileError>;
