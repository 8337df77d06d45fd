pub mod buffer;
pub mod config;
pub mod file;
pub mod shell;

pub use buffer::{
    BufferError, BufferManager, BufferResult, Clock, FrameDesc, FrameId, FrameState, PinMode,
    PoolStats, Replacer,
};
pub use config::{ConfigError, ConfigResult, PoolConfig, ReplacementPolicy};
pub use file::{DiskManager, FileError, FileResult, PAGE_SIZE, PageId, PagedDiskManager};
