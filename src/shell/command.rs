use std::str::FromStr;

use super::error::ShellError;
use crate::file::PageId;

/// Bytes shown by `read` when no length is given
pub const DEFAULT_READ_LEN: usize = 32;

pub const HELP: &str = "\
new <count> [fill-byte]         allocate <count> pages, pin the first
pin <pid>                       pin a page (reads it from disk on a miss)
unpin <pid> [dirty]             release one pin, optionally marking the page dirty
write <pid> <offset> <text>     copy text into a pinned page
read <pid> [len]                hex dump of a resident page
free <pid>                      drop a page from the pool and deallocate it
flush <pid>                     write a dirty page to disk
flushall                        write every dirty page to disk
frames                          show the frame table
stats                           show pool counters
help                            show this message
quit | exit                     leave the shell";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    New { count: usize, fill: u8 },
    Pin(PageId),
    Unpin { page_id: PageId, dirty: bool },
    Write { page_id: PageId, offset: usize, text: String },
    Read { page_id: PageId, len: usize },
    Free(PageId),
    Flush(PageId),
    FlushAll,
    Frames,
    Stats,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = ShellError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };
        let args: Vec<&str> = rest.split_whitespace().collect();

        let command = match name.to_ascii_lowercase().as_str() {
            "new" => {
                expect_args(name, &args, 1, 2)?;
                Command::New {
                    count: parse_arg(args[0], "count")?,
                    fill: args
                        .get(1)
                        .map(|s| parse_arg(s, "fill-byte"))
                        .transpose()?
                        .unwrap_or(0),
                }
            }
            "pin" => {
                expect_args(name, &args, 1, 1)?;
                Command::Pin(parse_arg(args[0], "pid")?)
            }
            "unpin" => {
                expect_args(name, &args, 1, 2)?;
                let dirty = match args.get(1) {
                    None => false,
                    Some(flag) if flag.eq_ignore_ascii_case("dirty") => true,
                    Some(flag) if flag.eq_ignore_ascii_case("clean") => false,
                    Some(flag) => {
                        return Err(ShellError::InvalidArgument {
                            arg: flag.to_string(),
                            reason: "expected 'dirty' or 'clean'".to_string(),
                        });
                    }
                };
                Command::Unpin {
                    page_id: parse_arg(args[0], "pid")?,
                    dirty,
                }
            }
            "write" => {
                // The text keeps its inner whitespace
                let mut parts = rest.splitn(3, char::is_whitespace);
                let (Some(page_id), Some(offset), Some(text)) =
                    (parts.next(), parts.next(), parts.next())
                else {
                    return Err(ShellError::Usage(name.to_string()));
                };
                Command::Write {
                    page_id: parse_arg(page_id, "pid")?,
                    offset: parse_arg(offset, "offset")?,
                    text: text.to_string(),
                }
            }
            "read" => {
                expect_args(name, &args, 1, 2)?;
                Command::Read {
                    page_id: parse_arg(args[0], "pid")?,
                    len: args
                        .get(1)
                        .map(|s| parse_arg(s, "len"))
                        .transpose()?
                        .unwrap_or(DEFAULT_READ_LEN),
                }
            }
            "free" => {
                expect_args(name, &args, 1, 1)?;
                Command::Free(parse_arg(args[0], "pid")?)
            }
            "flush" => {
                expect_args(name, &args, 1, 1)?;
                Command::Flush(parse_arg(args[0], "pid")?)
            }
            "flushall" => {
                expect_args(name, &args, 0, 0)?;
                Command::FlushAll
            }
            "frames" => {
                expect_args(name, &args, 0, 0)?;
                Command::Frames
            }
            "stats" => {
                expect_args(name, &args, 0, 0)?;
                Command::Stats
            }
            "help" => {
                expect_args(name, &args, 0, 0)?;
                Command::Help
            }
            "quit" | "exit" => {
                expect_args(name, &args, 0, 0)?;
                Command::Quit
            }
            _ => return Err(ShellError::UnknownCommand(name.to_string())),
        };

        Ok(command)
    }
}

fn expect_args(name: &str, args: &[&str], min: usize, max: usize) -> Result<(), ShellError> {
    if args.len() < min || args.len() > max {
        return Err(ShellError::Usage(name.to_string()));
    }
    Ok(())
}

fn parse_arg<T: FromStr>(arg: &str, what: &str) -> Result<T, ShellError> {
    arg.parse().map_err(|_| ShellError::InvalidArgument {
        arg: arg.to_string(),
        reason: format!("invalid {}", what),
    })
}
