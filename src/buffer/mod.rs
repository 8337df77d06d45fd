mod buffer_manager;
mod error;
mod frame;
mod replacer;
mod tests;

pub use buffer_manager::{BufferManager, PinMode, PoolStats};
pub use error::{BufferError, BufferResult};
pub use frame::FrameDesc;
pub use replacer::{Clock, FrameState, Replacer};

/// Index of a frame in the buffer pool; fixed for the lifetime of the pool
pub type FrameId = usize;
