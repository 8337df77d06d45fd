use thiserror::Error;

use crate::buffer::BufferError;
use crate::file::{FileError, PageId};

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Unknown command: {0} (try 'help')")]
    UnknownCommand(String),

    #[error("Wrong number of arguments for '{0}' (try 'help')")]
    Usage(String),

    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument { arg: String, reason: String },

    #[error("Page not resident: page_id={0}")]
    NotResident(PageId),

    #[error("Write out of bounds: offset {offset} + {len} bytes exceeds page size")]
    OutOfBounds { offset: usize, len: usize },
}

pub type ShellResult<T> = Result<T, ShellError>;
