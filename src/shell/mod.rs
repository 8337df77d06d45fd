//! Interactive commands over a buffer pool

mod command;
mod error;

pub use command::{Command, DEFAULT_READ_LEN, HELP};
pub use error::{ShellError, ShellResult};

use prettytable::{Table, row};

use crate::buffer::{BufferManager, PinMode};
use crate::file::{DiskManager, PAGE_SIZE};

/// Bytes per line of a hex dump
const DUMP_WIDTH: usize = 16;

pub struct Shell<D: DiskManager> {
    buffer_manager: BufferManager<D>,
}

impl<D: DiskManager> Shell<D> {
    pub fn new(buffer_manager: BufferManager<D>) -> Self {
        Self { buffer_manager }
    }

    pub fn buffer_manager(&self) -> &BufferManager<D> {
        &self.buffer_manager
    }

    pub fn into_buffer_manager(self) -> BufferManager<D> {
        self.buffer_manager
    }

    /// Run one command and return the text to show the user
    pub fn execute(&mut self, command: &Command) -> ShellResult<String> {
        let bm = &mut self.buffer_manager;

        let output = match command {
            Command::New { count, fill } => {
                let content = vec![*fill; PAGE_SIZE];
                let first = bm.allocate_pages(&content, *count)?;
                format!(
                    "allocated pages {}..{}, page {} pinned",
                    first,
                    first + count,
                    first
                )
            }
            Command::Pin(page_id) => {
                bm.pin_page(*page_id, PinMode::DiskIo)?;
                let pins = bm.pin_count(*page_id).unwrap_or(0);
                format!("page {} pinned ({} pins)", page_id, pins)
            }
            Command::Unpin { page_id, dirty } => {
                bm.unpin_page(*page_id, *dirty)?;
                let pins = bm.pin_count(*page_id).unwrap_or(0);
                format!("page {} unpinned ({} pins)", page_id, pins)
            }
            Command::Write {
                page_id,
                offset,
                text,
            } => {
                let bytes = text.as_bytes();
                let end = offset
                    .checked_add(bytes.len())
                    .filter(|&end| end <= PAGE_SIZE)
                    .ok_or(ShellError::OutOfBounds {
                        offset: *offset,
                        len: bytes.len(),
                    })?;
                bm.page_mut(*page_id)?[*offset..end].copy_from_slice(bytes);
                format!(
                    "wrote {} bytes to page {}; unpin with 'dirty' to keep them",
                    bytes.len(),
                    page_id
                )
            }
            Command::Read { page_id, len } => {
                let data = bm
                    .page(*page_id)
                    .ok_or(ShellError::NotResident(*page_id))?;
                hex_dump(&data[..(*len).min(PAGE_SIZE)])
            }
            Command::Free(page_id) => {
                bm.free_page(*page_id)?;
                format!("page {} freed", page_id)
            }
            Command::Flush(page_id) => {
                bm.flush_page(*page_id)?;
                format!("page {} flushed", page_id)
            }
            Command::FlushAll => {
                bm.flush_all_pages()?;
                "all dirty pages flushed".to_string()
            }
            Command::Frames => render_frames(bm),
            Command::Stats => render_stats(bm),
            Command::Help => HELP.to_string(),
            Command::Quit => String::new(),
        };

        Ok(output)
    }
}

fn render_frames<D: DiskManager>(bm: &BufferManager<D>) -> String {
    let mut table = Table::new();
    table.set_titles(row!["frame", "page", "pins", "dirty"]);

    for frame in bm.frames() {
        let page = frame
            .page_id
            .map_or_else(|| "-".to_string(), |id| id.to_string());
        let dirty = if frame.dirty { "yes" } else { "no" };
        table.add_row(row![frame.index(), page, frame.pin_count, dirty]);
    }

    table.to_string()
}

fn render_stats<D: DiskManager>(bm: &BufferManager<D>) -> String {
    let stats = bm.stats();
    let resident = bm.frames().iter().filter(|f| !f.is_empty()).count();

    format!(
        "frames: {}  unpinned: {}  resident: {}  policy: {}\n\
         hits: {}  misses: {}  evictions: {}  disk reads: {}  disk writes: {}",
        bm.num_buffers(),
        bm.num_unpinned(),
        resident,
        bm.replacer_name(),
        stats.hits,
        stats.misses,
        stats.evictions,
        stats.disk_reads,
        stats.disk_writes
    )
}

fn hex_dump(data: &[u8]) -> String {
    data.chunks(DUMP_WIDTH)
        .enumerate()
        .map(|(i, chunk)| {
            let bytes: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
            format!("{:04x}: {}", i * DUMP_WIDTH, bytes.join(" "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}
